// Drive module for the competition robot base
//
// Provides:
// - Arcade mixing with a motor-safety watchdog
// - The drive subsystem wrapping six controllers and the gear shifter

pub mod mixer;
mod subsystem;

pub use mixer::{DifferentialDrive, RobotDrive, WheelOutputs, arcade_mix};
pub use subsystem::{DriveSubsystem, MotorSlot, keys};
