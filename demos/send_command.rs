// Send one motor command and print the motor's range
//
// Usage: cargo run --example send_command -- <motor> <degrees> [--speed 0.2] [--acceleration 0.1]
// Watch states with: z_sub -k pololu/motor_states
use clap::Parser;
use pololu_servo_bridge::config::{TOPIC_COMMAND, TOPIC_MOTOR_RANGE};
use pololu_servo_bridge::messages::{MotorCommand, MotorRange, MotorRangeRequest};
use tracing::{info, warn};

#[derive(Debug, Parser)]
struct Cli {
    motor: String,
    degrees: f64,
    #[arg(long, default_value_t = 0.2)]
    speed: f64,
    #[arg(long, default_value_t = 0.1)]
    acceleration: f64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let cli = Cli::parse();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    // Ask for the range first so the user sees what is allowed
    let request = serde_json::to_string(&MotorRangeRequest {
        motor_name: cli.motor.clone(),
    })?;
    let replies = session.get(TOPIC_MOTOR_RANGE).payload(request).await?;
    while let Ok(reply) = replies.recv_async().await {
        match reply.result() {
            Ok(sample) => {
                let range: MotorRange = serde_json::from_slice(&sample.payload().to_bytes())?;
                info!(
                    "{}: {:.1}..{:.1} deg, direction {}",
                    cli.motor,
                    range.min.to_degrees(),
                    range.max.to_degrees(),
                    range.direction
                );
            }
            Err(err) => warn!(
                "Range query failed: {}",
                String::from_utf8_lossy(&err.payload().to_bytes())
            ),
        }
    }

    let cmd = MotorCommand {
        joint_name: cli.motor,
        position: cli.degrees.to_radians(),
        speed: cli.speed,
        acceleration: cli.acceleration,
    };
    info!("Sending {:?}", cmd);
    session
        .put(TOPIC_COMMAND, serde_json::to_string(&cmd)?)
        .await?;

    session.close().await?;
    Ok(())
}
