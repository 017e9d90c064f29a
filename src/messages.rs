// Message types exchanged over zenoh (JSON payloads)

use serde::{Deserialize, Serialize};

// Command from planners/teleop -> bridge
// position in radians, speed and acceleration normalized to [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorCommand {
    pub joint_name: String,
    pub position: f64,
    pub speed: f64,
    pub acceleration: f64,
}

/// Configured calibration bounds, in the motor's raw frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationState {
    pub min_pulse: f64,
    pub min_radians: f64,
    pub min_degrees: f64,
    pub max_pulse: f64,
    pub max_radians: f64,
    pub max_degrees: f64,
}

/// Snapshot of one servo, rebuilt every sampling tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorState {
    pub name: String,
    pub motor_id: u8,
    pub pololu_id: u8,
    pub pulse: f64,
    pub radians: f64,
    pub degrees: f64,
    pub calibration: CalibrationState,
}

// One batch per tick, bridge -> consumers
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MotorStateList {
    pub motor_states: Vec<MotorState>,
}

/// Range query request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorRangeRequest {
    pub motor_name: String,
}

/// Range query reply, computed from the operational pulse bounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotorRange {
    pub min: f64,
    pub max: f64,
    pub direction: i8,
}
