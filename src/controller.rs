// Servo controller: command dispatch, state sampling and range queries
//
// Commands and sampling ticks arrive from independent tasks but share one
// serial link. The channel lives behind a mutex; a dispatch holds it across
// its three writes, a sampling tick across the whole read loop.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{error, info, warn};

use crate::messages::{CalibrationState, MotorCommand, MotorRange, MotorState, MotorStateList};
use crate::motor::convert::{
    pulse_to_ticks, radians_to_degrees, ratio_to_protocol, ticks_to_pulse, to_pulse, to_radians,
};
use crate::motor::validate::{validate, Rejection};
use crate::motor::{HardwareChannel, MaestroError, MotorDescriptor, MotorRegistry, ServoAddress};

/// Default safe target range of the controller, in ticks
pub const DEFAULT_MIN_TARGET_TICKS: u16 = 4000;
pub const DEFAULT_MAX_TARGET_TICKS: u16 = 8000;

/// Clamp bounds applied to every target before it is written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickLimits {
    pub min: u16,
    pub max: u16,
}

impl Default for TickLimits {
    fn default() -> Self {
        Self {
            min: DEFAULT_MIN_TARGET_TICKS,
            max: DEFAULT_MAX_TARGET_TICKS,
        }
    }
}

/// Protocol values written for one accepted command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatch {
    pub speed: u16,
    pub acceleration: u16,
    pub target: u16,
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("motor {0} hasn't been loaded into the motor config")]
    UnknownMotor(String),

    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error("channel error on motor {motor}: {source}")]
    Channel {
        motor: String,
        #[source]
        source: MaestroError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("motor {0} hasn't been loaded into the motor config")]
    UnknownMotor(String),
}

/// A sampling tick failed; nothing from it is published
#[derive(Debug, thiserror::Error)]
#[error("failed to read position of motor {motor}: {source}")]
pub struct SampleError {
    pub motor: String,
    #[source]
    pub source: MaestroError,
}

pub struct Controller<C> {
    registry: Arc<MotorRegistry>,
    channel: Mutex<C>,
    limits: TickLimits,
}

impl<C: HardwareChannel> Controller<C> {
    pub fn new(registry: Arc<MotorRegistry>, channel: C, limits: TickLimits) -> Self {
        Self {
            registry,
            channel: Mutex::new(channel),
            limits,
        }
    }

    // Poisoning is ignored; queries discard stale input before sending
    fn lock_channel(&self) -> MutexGuard<'_, C> {
        self.channel.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Validate a command and, if accepted, write speed, acceleration and
    /// target to the servo in that order
    pub fn handle_command(&self, cmd: &MotorCommand) -> Result<Dispatch, CommandError> {
        info!(
            "Received cmd name: {}, position: {:.2} deg, speed: {}, accel: {}",
            cmd.joint_name,
            radians_to_degrees(cmd.position),
            cmd.speed,
            cmd.acceleration
        );

        let motor = self
            .registry
            .get(&cmd.joint_name)
            .ok_or_else(|| CommandError::UnknownMotor(cmd.joint_name.clone()))?;

        validate(motor, cmd.position, cmd.speed, cmd.acceleration)?;

        let dispatch = Dispatch {
            speed: ratio_to_protocol(cmd.speed),
            acceleration: ratio_to_protocol(cmd.acceleration),
            target: pulse_to_ticks(
                to_pulse(cmd.position, motor),
                self.limits.min,
                self.limits.max,
            ),
        };

        info!(
            "id: {}/{}, target: {}, pos: {:.4}, speed: {}, accel: {}",
            motor.protocol_id,
            motor.hardware_id,
            dispatch.target,
            cmd.position,
            dispatch.speed,
            dispatch.acceleration
        );

        let servo = ServoAddress::from(motor);
        let channel_error = |source| CommandError::Channel {
            motor: motor.name.clone(),
            source,
        };

        let mut channel = self.lock_channel();
        channel
            .write_speed(servo, dispatch.speed)
            .map_err(channel_error)?;
        channel
            .write_acceleration(servo, dispatch.acceleration)
            .map_err(channel_error)?;
        channel
            .write_target(servo, dispatch.target)
            .map_err(channel_error)?;

        Ok(dispatch)
    }

    /// Read every servo's position and build one batch, in registry order
    pub fn sample(&self) -> Result<MotorStateList, SampleError> {
        let mut motor_states = Vec::with_capacity(self.registry.len());

        let mut channel = self.lock_channel();
        for motor in self.registry.iter() {
            let ticks = channel
                .read_position(ServoAddress::from(motor))
                .map_err(|source| SampleError {
                    motor: motor.name.clone(),
                    source,
                })?;
            motor_states.push(motor_state(motor, ticks));
        }
        drop(channel);

        Ok(MotorStateList { motor_states })
    }

    /// Operational range of a motor in radians
    pub fn motor_range(&self, name: &str) -> Result<MotorRange, QueryError> {
        info!("Received motor_range query for motor: {}", name);
        let motor = self
            .registry
            .get(name)
            .ok_or_else(|| QueryError::UnknownMotor(name.to_string()))?;

        Ok(MotorRange {
            min: to_radians(motor.pulse_min, motor),
            max: to_radians(motor.pulse_max, motor),
            direction: motor.direction.as_i8(),
        })
    }

    /// Run one command and log the outcome; never fails
    pub fn process_command(&self, cmd: &MotorCommand) {
        match self.handle_command(cmd) {
            Ok(_) => {}
            Err(CommandError::Channel { motor, source }) => {
                error!("Dispatch to motor {} failed: {}", motor, source);
            }
            Err(e) => warn!("{}", e),
        }
    }
}

/// Build a snapshot from a raw tick reading
pub fn motor_state(motor: &MotorDescriptor, ticks: u16) -> MotorState {
    let pulse = ticks_to_pulse(ticks);
    let radians = to_radians(pulse, motor) * motor.direction.sign();

    let min_radians = to_radians(motor.calibration.min_pulse, motor);
    let max_radians = to_radians(motor.calibration.max_pulse, motor);

    MotorState {
        name: motor.name.clone(),
        motor_id: motor.hardware_id,
        pololu_id: motor.protocol_id,
        pulse,
        radians,
        degrees: radians_to_degrees(radians),
        calibration: CalibrationState {
            min_pulse: motor.calibration.min_pulse,
            min_radians,
            min_degrees: radians_to_degrees(min_radians),
            max_pulse: motor.calibration.max_pulse,
            max_radians,
            max_degrees: radians_to_degrees(max_radians),
        },
    }
}
