// Zenoh wiring around the servo controller
//
// - commands on TOPIC_COMMAND are dispatched one at a time as they arrive
// - a separate task samples every motor at rate_hz and publishes one batch
// - range queries on TOPIC_MOTOR_RANGE are answered from the registry
// Serial I/O runs on the blocking pool; the controller's mutex keeps
// dispatch and sampling off the wire at the same time.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};
use zenoh::pubsub::Publisher;
use zenoh::query::Query;

use crate::config::{Args, TOPIC_COMMAND, TOPIC_MOTOR_RANGE, TOPIC_MOTOR_STATES};
use crate::controller::Controller;
use crate::messages::{MotorCommand, MotorRangeRequest, MotorStateList};
use crate::motor::{HardwareChannel, MaestroBus, MaestroError, MotorRegistry, RegistryError};

/// Errors that stop the runtime
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Failed to open controller on {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: MaestroError,
    },

    #[error("Invalid target range: min {min} is above max {max}")]
    TickLimits { min: u16, max: u16 },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl From<zenoh::Error> for RuntimeError {
    fn from(e: zenoh::Error) -> Self {
        RuntimeError::Transport(e.to_string())
    }
}

pub async fn run(args: Args) -> Result<(), RuntimeError> {
    // Startup: any failure here is fatal
    let registry = Arc::new(MotorRegistry::load(&args.motors)?);
    if registry.is_empty() {
        warn!("Motor config defines no motors, nothing will be published");
    }

    let limits = args.tick_limits().ok_or(RuntimeError::TickLimits {
        min: args.min_target_ticks,
        max: args.max_target_ticks,
    })?;

    info!(
        "Opening Maestro on {} at {} baud ({:?} protocol)",
        args.port, args.baud_rate, args.protocol
    );
    let open_error = |source| RuntimeError::Open {
        port: args.port.clone(),
        source,
    };
    let mut bus = MaestroBus::open_with_baudrate(&args.port, args.baud_rate, args.protocol)
        .map_err(open_error)?;

    // Make sure something answers before serving commands
    let device = registry.iter().next().map_or(0, |m| m.protocol_id);
    match bus.get_errors(device).map_err(open_error)? {
        0 => info!("Controller responding"),
        errors => warn!("Controller reported errors 0x{:04X} at startup", errors),
    }

    let controller = Arc::new(Controller::new(Arc::clone(&registry), bus, limits));

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers, subscribers and queryables...");
    let subscriber = session.declare_subscriber(TOPIC_COMMAND).await?;
    let pub_states = session.declare_publisher(TOPIC_MOTOR_STATES).await?;
    let queryable = session.declare_queryable(TOPIC_MOTOR_RANGE).await?;

    info!(
        "Runtime started: {} motors, {}Hz state rate, targets clamped to {}..={}",
        registry.len(),
        args.rate_hz,
        limits.min,
        limits.max
    );
    info!("Subscribed to: {}", TOPIC_COMMAND);
    info!("Publishing to: {}", TOPIC_MOTOR_STATES);
    info!("Answering queries on: {}", TOPIC_MOTOR_RANGE);

    let mut sampler = spawn_sampler(Arc::clone(&controller), pub_states, args.rate_hz);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let result = loop {
        tokio::select! {
            sample = subscriber.recv_async() => {
                let sample = match sample {
                    Ok(sample) => sample,
                    Err(e) => break Err(RuntimeError::Transport(e.to_string())),
                };
                let payload = sample.payload().to_bytes();
                match serde_json::from_slice::<MotorCommand>(&payload) {
                    Ok(cmd) => dispatch(&controller, cmd).await,
                    Err(e) => warn!("Failed to parse command: {}", e),
                }
            }

            query = queryable.recv_async() => {
                let query = match query {
                    Ok(query) => query,
                    Err(e) => break Err(RuntimeError::Transport(e.to_string())),
                };
                if let Err(e) = answer_range_query(&controller, &query).await {
                    warn!("Failed to answer motor_range query: {}", e);
                }
            }

            finished = &mut sampler => {
                let reason = match finished {
                    Ok(()) => "sampler task ended".to_string(),
                    Err(e) => format!("sampler task ended: {}", e),
                };
                break Err(RuntimeError::Transport(reason));
            }

            _ = &mut shutdown => {
                info!("Shutting down...");
                break Ok(());
            }
        }
    };

    sampler.abort();
    result
}

/// Run one command on the blocking pool and wait for its writes
async fn dispatch<C: HardwareChannel + 'static>(controller: &Arc<Controller<C>>, cmd: MotorCommand) {
    let controller = Arc::clone(controller);
    if let Err(e) = tokio::task::spawn_blocking(move || controller.process_command(&cmd)).await {
        error!("Command task failed: {}", e);
    }
}

fn spawn_sampler<C: HardwareChannel + 'static>(
    controller: Arc<Controller<C>>,
    publisher: Publisher<'static>,
    rate_hz: u32,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval(Duration::from_secs_f64(1.0 / rate_hz as f64));
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tick.tick().await;
            sample_tick(&controller, |states| publish_states(&publisher, states)).await;
        }
    })
}

/// Sample once and hand the batch to `publish`. Failures are logged and
/// leave the next tick unaffected.
async fn sample_tick<C, F, Fut>(controller: &Arc<Controller<C>>, publish: F)
where
    C: HardwareChannel + 'static,
    F: FnOnce(MotorStateList) -> Fut,
    Fut: Future<Output = Result<(), RuntimeError>>,
{
    let sampler = Arc::clone(controller);
    match tokio::task::spawn_blocking(move || sampler.sample()).await {
        Ok(Ok(states)) => {
            if let Err(e) = publish(states).await {
                error!("Failed to publish motor states: {}", e);
            }
        }
        // A failed tick publishes nothing
        Ok(Err(e)) => error!("Sampling failed: {}", e),
        Err(e) => error!("Sampling task failed: {}", e),
    }
}

async fn publish_states(
    publisher: &Publisher<'static>,
    states: MotorStateList,
) -> Result<(), RuntimeError> {
    let states_json = serde_json::to_string(&states)?;
    publisher.put(states_json).await?;
    Ok(())
}

async fn answer_range_query<C: HardwareChannel>(
    controller: &Controller<C>,
    query: &Query,
) -> Result<(), RuntimeError> {
    let Some(payload) = query.payload() else {
        query.reply_err("missing motor_range request").await?;
        return Ok(());
    };

    let request: MotorRangeRequest = match serde_json::from_slice(&payload.to_bytes()) {
        Ok(request) => request,
        Err(e) => {
            warn!("Failed to parse motor_range request: {}", e);
            query.reply_err(format!("invalid motor_range request: {}", e)).await?;
            return Ok(());
        }
    };

    match controller.motor_range(&request.motor_name) {
        Ok(range) => {
            let range_json = serde_json::to_string(&range)?;
            query.reply(query.key_expr().clone(), range_json).await?;
        }
        Err(e) => {
            warn!("{}", e);
            query.reply_err(e.to_string()).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::TickLimits;
    use crate::motor::channel::mock::RecordingChannel;
    use crate::motor::registry::{Calibration, Direction, MotorDescriptor};
    use std::sync::Mutex;

    fn controller(fail_channel: Option<u8>) -> Arc<Controller<RecordingChannel>> {
        let registry = MotorRegistry::from_descriptors([MotorDescriptor {
            name: "wrist".to_string(),
            hardware_id: 1,
            protocol_id: 12,
            direction: Direction::Forward,
            pulse_min: 1000.0,
            pulse_max: 2000.0,
            range_radians: std::f64::consts::PI,
            calibration: Calibration {
                min_pulse: 1000.0,
                max_pulse: 2000.0,
            },
        }])
        .unwrap();
        let mut channel = RecordingChannel::default().with_position(1, 6000);
        channel.fail_channel = fail_channel;
        Arc::new(Controller::new(Arc::new(registry), channel, TickLimits::default()))
    }

    #[tokio::test]
    async fn test_failed_publish_does_not_stop_sampling() {
        let controller = controller(None);
        let published = Mutex::new(Vec::new());

        sample_tick(&controller, |_| async {
            Err(RuntimeError::Transport("publisher closed".to_string()))
        })
        .await;

        sample_tick(&controller, |states| {
            published.lock().unwrap().push(states);
            async { Ok(()) }
        })
        .await;

        let published = published.into_inner().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].motor_states[0].pulse, 1500.0);
    }

    #[tokio::test]
    async fn test_failed_sample_publishes_nothing() {
        let controller = controller(Some(1));
        let mut called = false;

        sample_tick(&controller, |_| {
            called = true;
            async { Ok(()) }
        })
        .await;

        assert!(!called);
    }
}
