// Arcade mixing for a two-sided drivetrain
// Converts (forward, turn) stick values into left/right side outputs and
// tracks a motor-safety watchdog that expires when outputs stop being fed.

use std::time::{Duration, Instant};

use crate::config::DriveConfig;

/// Side outputs in [-1.0, 1.0]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WheelOutputs {
    pub left: f64,
    pub right: f64,
}

impl WheelOutputs {
    pub fn new(left: f64, right: f64) -> Self {
        Self { left, right }
    }

    pub fn zero() -> Self {
        Self::default()
    }
}

/// The drivetrain helper the subsystem delegates mixing and safety to
pub trait DifferentialDrive: Send {
    /// Mix arcade inputs into side outputs and feed the watchdog
    fn arcade(&mut self, forward: f64, turn: f64) -> WheelOutputs;

    fn set_safety_enabled(&mut self, enabled: bool);

    fn is_safety_enabled(&self) -> bool;

    /// False once safety is enabled and the watchdog has not been fed in time
    fn is_alive(&self) -> bool;
}

fn limit(value: f64) -> f64 {
    value.clamp(-1.0, 1.0)
}

/// Square while keeping the sign, for finer control near zero
fn square_keep_sign(value: f64) -> f64 {
    value * value.abs()
}

/// Mix arcade inputs: left = forward + turn, right = forward - turn
///
/// Inputs are clamped to [-1, 1] first. If either side would exceed full
/// output, both sides are scaled down by the same factor.
pub fn arcade_mix(forward: f64, turn: f64, squared_inputs: bool) -> WheelOutputs {
    let mut forward = limit(forward);
    let mut turn = limit(turn);

    if squared_inputs {
        forward = square_keep_sign(forward);
        turn = square_keep_sign(turn);
    }

    let left = forward + turn;
    let right = forward - turn;

    let max_magnitude = left.abs().max(right.abs());
    if max_magnitude > 1.0 {
        WheelOutputs::new(left / max_magnitude, right / max_magnitude)
    } else {
        WheelOutputs::new(left, right)
    }
}

/// Arcade drive helper with a motor-safety watchdog
#[derive(Debug)]
pub struct RobotDrive {
    squared_inputs: bool,
    safety_enabled: bool,
    expiration: Duration,
    last_feed: Instant,
}

impl RobotDrive {
    pub fn new(config: &DriveConfig) -> Self {
        Self {
            squared_inputs: config.squared_inputs,
            safety_enabled: true,
            expiration: config.safety_expiration(),
            last_feed: Instant::now(),
        }
    }

    pub fn expiration(&self) -> Duration {
        self.expiration
    }

    fn alive_at(&self, now: Instant) -> bool {
        !self.safety_enabled || now.saturating_duration_since(self.last_feed) <= self.expiration
    }
}

impl Default for RobotDrive {
    fn default() -> Self {
        Self::new(&DriveConfig::default())
    }
}

impl DifferentialDrive for RobotDrive {
    fn arcade(&mut self, forward: f64, turn: f64) -> WheelOutputs {
        self.last_feed = Instant::now();
        arcade_mix(forward, turn, self.squared_inputs)
    }

    fn set_safety_enabled(&mut self, enabled: bool) {
        self.safety_enabled = enabled;
        // Toggling restarts the expiration window
        self.last_feed = Instant::now();
    }

    fn is_safety_enabled(&self) -> bool {
        self.safety_enabled
    }

    fn is_alive(&self) -> bool {
        self.alive_at(Instant::now())
    }
}
