// Command safety gate
//
// Every check runs; a rejection lists all violated constraints so the
// sender sees the complete picture in one reply.

use std::fmt;

use super::convert::to_radians;
use super::registry::MotorDescriptor;

/// Tolerance applied to the position bounds for floating point round-off
pub const POSITION_TOLERANCE: f64 = 0.001;

/// A single failed check
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Violation {
    #[error("speed {0} should be between 0.0 - 1.0")]
    SpeedOutOfRange(f64),

    #[error("acceleration {0} should be between 0.0 - 1.0")]
    AccelerationOutOfRange(f64),

    #[error("position {position} rad should be between {min} and {max} rad")]
    PositionOutOfRange { position: f64, min: f64, max: f64 },
}

/// All violations found for one command
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub motor: String,
    pub violations: Vec<Violation>,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "command for motor {} rejected: ", self.motor)?;
        for (i, violation) in self.violations.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", violation)?;
        }
        Ok(())
    }
}

impl std::error::Error for Rejection {}

/// Position bounds in radians, ordered regardless of direction
pub fn position_bounds(motor: &MotorDescriptor) -> (f64, f64) {
    let a = to_radians(motor.pulse_min, motor);
    let b = to_radians(motor.pulse_max, motor);
    (a.min(b), a.max(b))
}

fn ratio_in_range(ratio: f64) -> bool {
    (0.0..=1.0).contains(&ratio)
}

/// Check a command against the motor's limits.
///
/// NaN inputs fail their check.
pub fn validate(
    motor: &MotorDescriptor,
    position: f64,
    speed: f64,
    acceleration: f64,
) -> Result<(), Rejection> {
    let mut violations = Vec::new();

    if !ratio_in_range(speed) {
        violations.push(Violation::SpeedOutOfRange(speed));
    }

    if !ratio_in_range(acceleration) {
        violations.push(Violation::AccelerationOutOfRange(acceleration));
    }

    let (min, max) = position_bounds(motor);
    let in_range =
        min - POSITION_TOLERANCE <= position && position <= max + POSITION_TOLERANCE;
    if !in_range {
        violations.push(Violation::PositionOutOfRange { position, min, max });
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(Rejection {
            motor: motor.name.clone(),
            violations,
        })
    }
}
