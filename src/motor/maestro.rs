// Pololu Maestro serial protocol implementation
//
// Two framings are supported:
// - Compact: [Command, Params...]
// - Pololu:  [0xAA, Device, Command & 0x7F, Params...]
// 14-bit values are sent as two 7-bit bytes, low first. Replies to
// position / error queries are two bytes, little-endian.

use serialport::{self, ClearBuffer, SerialPort};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::debug;

use super::channel::{HardwareChannel, ServoAddress};

/// Default serial configuration for the Maestro command port
pub const DEFAULT_BAUDRATE: u32 = 115_200;
pub const DEFAULT_TIMEOUT_MS: u64 = 100;

/// Start byte of a Pololu protocol frame
const POLOLU_START: u8 = 0xAA;

/// Largest value that fits in two 7-bit data bytes
pub const MAX_DATA_VALUE: u16 = 0x3FFF;

/// Command bytes (compact protocol form)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    SetTarget = 0x84,
    SetSpeed = 0x87,
    SetAcceleration = 0x89,
    GetPosition = 0x90,
    GetErrors = 0xA1,
}

/// Serial framing
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Protocol {
    Compact,
    Pololu,
}

/// Error types for Maestro communication
#[derive(Debug, thiserror::Error)]
pub enum MaestroError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timeout waiting for response from channel {channel}")]
    Timeout { channel: u8 },

    #[error("Timeout waiting for error register of device {device}")]
    ErrorsTimeout { device: u8 },

    #[error("Value {value} for channel {channel} does not fit in 14 bits")]
    ValueOutOfRange { channel: u8, value: u16 },
}

pub type Result<T> = std::result::Result<T, MaestroError>;

/// Byte link to the controller
pub trait SerialLink: Read + Write + Send {
    /// Drop whatever is waiting in the receive buffer
    fn discard_input(&mut self) -> Result<()>;
}

impl SerialLink for Box<dyn SerialPort> {
    fn discard_input(&mut self) -> Result<()> {
        self.clear(ClearBuffer::Input)?;
        Ok(())
    }
}

/// Maestro controller on a serial link
pub struct MaestroBus<P = Box<dyn SerialPort>> {
    port: P,
    protocol: Protocol,
}

impl MaestroBus<Box<dyn SerialPort>> {
    /// Open a connection to the controller's command port
    pub fn open_with_baudrate(port_name: &str, baudrate: u32, protocol: Protocol) -> Result<Self> {
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;
        port.clear(ClearBuffer::All)?;

        Ok(Self::new(port, protocol))
    }
}

impl<P: SerialLink> MaestroBus<P> {
    pub fn new(port: P, protocol: Protocol) -> Self {
        Self { port, protocol }
    }

    /// Split a 14-bit value into [low 7 bits, high 7 bits]
    fn encode_value(channel: u8, value: u16) -> Result<[u8; 2]> {
        if value > MAX_DATA_VALUE {
            return Err(MaestroError::ValueOutOfRange { channel, value });
        }
        Ok([(value & 0x7F) as u8, ((value >> 7) & 0x7F) as u8])
    }

    /// Build a frame for the given framing; `device` is only sent by the
    /// Pololu protocol
    fn build_frame(protocol: Protocol, device: u8, command: Command, params: &[u8]) -> Vec<u8> {
        let mut frame = Vec::with_capacity(3 + params.len());

        match protocol {
            Protocol::Compact => frame.push(command as u8),
            Protocol::Pololu => {
                frame.push(POLOLU_START);
                frame.push(device & 0x7F);
                frame.push(command as u8 & 0x7F);
            }
        }
        frame.extend_from_slice(params);

        frame
    }

    fn send_frame(&mut self, frame: &[u8]) -> Result<()> {
        debug!("Maestro tx: {:02X?}", frame);
        self.port.write_all(frame)?;
        self.port.flush()?;
        Ok(())
    }

    /// Send a query and read its two byte little-endian reply.
    ///
    /// Stale bytes from an earlier timed-out reply are discarded first so
    /// they cannot pair up with this one.
    fn query(&mut self, frame: &[u8], timeout: MaestroError) -> Result<u16> {
        self.port.discard_input()?;
        self.send_frame(frame)?;

        let mut reply = [0u8; 2];
        if let Err(e) = self.port.read_exact(&mut reply) {
            return Err(if e.kind() == std::io::ErrorKind::TimedOut {
                timeout
            } else {
                MaestroError::Io(e)
            });
        }
        debug!("Maestro rx: {:02X?}", reply);
        Ok(u16::from_le_bytes(reply))
    }

    fn write_value(&mut self, servo: ServoAddress, command: Command, value: u16) -> Result<()> {
        let [low, high] = Self::encode_value(servo.channel, value)?;
        let params = [servo.channel, low, high];
        let frame = Self::build_frame(self.protocol, servo.device, command, &params);
        debug!(
            "Write {:?} to channel {}: value={}",
            command, servo.channel, value
        );
        self.send_frame(&frame)
    }

    /// Read the controller's error register (clears it on the device)
    pub fn get_errors(&mut self, device: u8) -> Result<u16> {
        let frame = Self::build_frame(self.protocol, device, Command::GetErrors, &[]);
        self.query(&frame, MaestroError::ErrorsTimeout { device })
    }
}

impl<P: SerialLink> HardwareChannel for MaestroBus<P> {
    fn read_position(&mut self, servo: ServoAddress) -> Result<u16> {
        let frame = Self::build_frame(
            self.protocol,
            servo.device,
            Command::GetPosition,
            &[servo.channel],
        );
        self.query(
            &frame,
            MaestroError::Timeout {
                channel: servo.channel,
            },
        )
    }

    fn write_speed(&mut self, servo: ServoAddress, value: u16) -> Result<()> {
        self.write_value(servo, Command::SetSpeed, value)
    }

    fn write_acceleration(&mut self, servo: ServoAddress, value: u16) -> Result<()> {
        self.write_value(servo, Command::SetAcceleration, value)
    }

    fn write_target(&mut self, servo: ServoAddress, ticks: u16) -> Result<()> {
        self.write_value(servo, Command::SetTarget, ticks)
    }
}
