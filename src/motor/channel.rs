// Hardware channel abstraction
//
// One physical serial link serves every servo. Implementations are not
// required to be reentrant; callers serialize access (see Controller).

use super::maestro::MaestroError;
use super::registry::MotorDescriptor;

/// Where a servo lives on the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServoAddress {
    pub channel: u8,
    pub device: u8,
}

impl From<&MotorDescriptor> for ServoAddress {
    fn from(motor: &MotorDescriptor) -> Self {
        Self {
            channel: motor.hardware_id,
            device: motor.protocol_id,
        }
    }
}

/// Position / speed / acceleration / target access per servo
pub trait HardwareChannel: Send {
    /// Current position in ticks (quarter microseconds)
    fn read_position(&mut self, servo: ServoAddress) -> Result<u16, MaestroError>;

    fn write_speed(&mut self, servo: ServoAddress, value: u16) -> Result<(), MaestroError>;

    fn write_acceleration(&mut self, servo: ServoAddress, value: u16) -> Result<(), MaestroError>;

    /// Target position in ticks
    fn write_target(&mut self, servo: ServoAddress, ticks: u16) -> Result<(), MaestroError>;
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::HashMap;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Op {
        ReadPosition(u8),
        Speed(u8, u16),
        Acceleration(u8, u16),
        Target(u8, u16),
    }

    /// In-memory channel that records every call
    #[derive(Debug, Default)]
    pub struct RecordingChannel {
        pub ops: Vec<Op>,
        pub positions: HashMap<u8, u16>,
        /// Fail every call touching this channel
        pub fail_channel: Option<u8>,
    }

    impl RecordingChannel {
        pub fn with_position(mut self, channel: u8, ticks: u16) -> Self {
            self.positions.insert(channel, ticks);
            self
        }

        fn check(&self, servo: ServoAddress) -> Result<(), MaestroError> {
            match self.fail_channel {
                Some(channel) if channel == servo.channel => {
                    Err(MaestroError::Timeout { channel })
                }
                _ => Ok(()),
            }
        }
    }

    impl HardwareChannel for RecordingChannel {
        fn read_position(&mut self, servo: ServoAddress) -> Result<u16, MaestroError> {
            self.ops.push(Op::ReadPosition(servo.channel));
            self.check(servo)?;
            Ok(self.positions.get(&servo.channel).copied().unwrap_or(0))
        }

        fn write_speed(&mut self, servo: ServoAddress, value: u16) -> Result<(), MaestroError> {
            self.check(servo)?;
            self.ops.push(Op::Speed(servo.channel, value));
            Ok(())
        }

        fn write_acceleration(
            &mut self,
            servo: ServoAddress,
            value: u16,
        ) -> Result<(), MaestroError> {
            self.check(servo)?;
            self.ops.push(Op::Acceleration(servo.channel, value));
            Ok(())
        }

        fn write_target(&mut self, servo: ServoAddress, ticks: u16) -> Result<(), MaestroError> {
            self.check(servo)?;
            self.ops.push(Op::Target(servo.channel, ticks));
            Ok(())
        }
    }
}
