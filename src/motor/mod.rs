// Servo control module for the Pololu Maestro bridge
//
// Provides:
// - Motor registry loaded from the motor config
// - Pulse / tick / radian unit conversion
// - Command validation against calibrated travel
// - Maestro serial protocol implementation behind a hardware channel trait

pub mod channel;
pub mod convert;
pub mod maestro;
pub mod registry;
pub mod validate;

pub use channel::{HardwareChannel, ServoAddress};
pub use maestro::{MaestroBus, MaestroError, Protocol};
pub use registry::{Calibration, Direction, MotorDescriptor, MotorRegistry, RegistryError};
pub use validate::{Rejection, Violation};
