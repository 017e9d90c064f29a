// Topics, serial defaults and command-line configuration
use clap::Parser;
use std::path::PathBuf;

use crate::controller::{DEFAULT_MAX_TARGET_TICKS, DEFAULT_MIN_TARGET_TICKS, TickLimits};
use crate::motor::Protocol;
use crate::motor::maestro::DEFAULT_BAUDRATE;

// Zenoh topics
pub const TOPIC_COMMAND: &str = "pololu/command"; // commands in
pub const TOPIC_MOTOR_STATES: &str = "pololu/motor_states"; // state batches out
pub const TOPIC_MOTOR_RANGE: &str = "pololu/motor_range"; // range queries

// Serial defaults
pub const DEFAULT_PORT: &str = "/dev/ttyACM0";

// State publishing frequency
pub const DEFAULT_RATE_HZ: u32 = 10;

/// Bridge between angular servo commands and a Pololu Maestro controller
#[derive(Debug, Clone, Parser)]
#[command(version, about)]
pub struct Args {
    /// Motor config file (TOML, one motor table per servo)
    #[arg(long, env = "POLOLU_MOTORS")]
    pub motors: PathBuf,

    /// Serial port of the Maestro command interface
    #[arg(long, env = "POLOLU_PORT", default_value = DEFAULT_PORT)]
    pub port: String,

    #[arg(long, env = "POLOLU_BAUD_RATE", default_value_t = DEFAULT_BAUDRATE)]
    pub baud_rate: u32,

    /// Motor state publishing rate
    #[arg(
        long,
        env = "POLOLU_RATE_HZ",
        default_value_t = DEFAULT_RATE_HZ,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub rate_hz: u32,

    /// Serial framing
    #[arg(long, value_enum, default_value_t = Protocol::Compact)]
    pub protocol: Protocol,

    /// Lowest target the controller may be sent, in quarter microseconds
    #[arg(long, default_value_t = DEFAULT_MIN_TARGET_TICKS)]
    pub min_target_ticks: u16,

    /// Highest target the controller may be sent, in quarter microseconds
    #[arg(long, default_value_t = DEFAULT_MAX_TARGET_TICKS)]
    pub max_target_ticks: u16,
}

impl Args {
    /// Target clamp bounds, if they are ordered
    pub fn tick_limits(&self) -> Option<TickLimits> {
        (self.min_target_ticks <= self.max_target_ticks).then_some(TickLimits {
            min: self.min_target_ticks,
            max: self.max_target_ticks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["pololu-servo-bridge", "--motors", "motors.toml"]).unwrap();
        assert_eq!(args.port, DEFAULT_PORT);
        assert_eq!(args.baud_rate, 115_200);
        assert_eq!(args.rate_hz, 10);
        assert_eq!(args.protocol, Protocol::Compact);
        assert_eq!(args.tick_limits(), Some(TickLimits::default()));
    }

    #[test]
    fn test_overrides() {
        let args = Args::try_parse_from([
            "pololu-servo-bridge",
            "--motors",
            "m.toml",
            "--protocol",
            "pololu",
            "--rate-hz",
            "50",
            "--min-target-ticks",
            "3000",
            "--max-target-ticks",
            "9000",
        ])
        .unwrap();
        assert_eq!(args.protocol, Protocol::Pololu);
        assert_eq!(args.rate_hz, 50);
        assert_eq!(args.tick_limits(), Some(TickLimits { min: 3000, max: 9000 }));
    }

    #[test]
    fn test_zero_rate_rejected() {
        let result =
            Args::try_parse_from(["pololu-servo-bridge", "--motors", "m.toml", "--rate-hz", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_inverted_tick_limits() {
        let args = Args::try_parse_from([
            "pololu-servo-bridge",
            "--motors",
            "m.toml",
            "--min-target-ticks",
            "8000",
            "--max-target-ticks",
            "4000",
        ])
        .unwrap();
        assert_eq!(args.tick_limits(), None);
    }
}
