// Unit conversion between the angular command frame and Maestro units
//
// Pulse units are the controller's native position unit. The wire protocol
// works in ticks (quarter microseconds), so one pulse unit = 4 ticks.
// Speed and acceleration ratios in [0, 1] map onto the protocol's 1..=255
// range, where 0 would mean "unlimited" and is never sent.

use super::registry::MotorDescriptor;

/// Ticks per pulse unit
pub const TICKS_PER_PULSE: f64 = 4.0;

/// Protocol range for speed / acceleration
pub const PROTOCOL_RATIO_MIN: f64 = 1.0;
pub const PROTOCOL_RATIO_MAX: f64 = 255.0;

/// Linear rescale of `value` from [in_min, in_max] onto [out_min, out_max].
///
/// Values outside the input range extrapolate; callers validate first.
/// A degenerate input range maps everything onto `out_min`.
pub fn interpolate(value: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> f64 {
    let span = in_max - in_min;
    if span == 0.0 {
        return out_min;
    }
    out_min + (value - in_min) * (out_max - out_min) / span
}

/// Saturating clamp that tolerates `low > high` by returning `low`
pub fn clamp(value: f64, low: f64, high: f64) -> f64 {
    value.min(high).max(low)
}

/// Pulse units -> radians in the motor's logical frame
///
/// The travel [pulse_min, pulse_max] spans `range_radians`, centred on zero
/// at the mid pulse. A negative direction mirrors the mapping.
pub fn to_radians(pulse: f64, motor: &MotorDescriptor) -> f64 {
    let half = motor.range_radians / 2.0;
    let radians = interpolate(
        pulse,
        motor.pulse_min,
        motor.pulse_max,
        -half,
        half,
    );
    radians * motor.direction.sign()
}

/// Radians -> pulse units; exact inverse of [`to_radians`]
pub fn to_pulse(radians: f64, motor: &MotorDescriptor) -> f64 {
    let half = motor.range_radians / 2.0;
    interpolate(
        radians * motor.direction.sign(),
        -half,
        half,
        motor.pulse_min,
        motor.pulse_max,
    )
}

pub fn radians_to_degrees(radians: f64) -> f64 {
    radians.to_degrees()
}

/// Normalized ratio in [0, 1] -> protocol byte in 1..=255
pub fn ratio_to_protocol(ratio: f64) -> u16 {
    let scaled = interpolate(ratio, 0.0, 1.0, PROTOCOL_RATIO_MIN, PROTOCOL_RATIO_MAX);
    clamp(scaled.round(), PROTOCOL_RATIO_MIN, PROTOCOL_RATIO_MAX) as u16
}

/// Pulse units -> target ticks, clamped to the controller's safe range
pub fn pulse_to_ticks(pulse: f64, min_ticks: u16, max_ticks: u16) -> u16 {
    clamp(
        (pulse * TICKS_PER_PULSE).round(),
        min_ticks as f64,
        max_ticks as f64,
    ) as u16
}

/// Raw ticks read from the controller -> pulse units
pub fn ticks_to_pulse(ticks: u16) -> f64 {
    ticks as f64 / TICKS_PER_PULSE
}
