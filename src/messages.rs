// Define message types for the runtime

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Requested gear for the shifter
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Gear {
    High,
    Low,
}

// Operator input from teleop -> runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct DriveCommand {
    pub forward: f64,
    pub turn: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gear: Option<Gear>,
}

/// One-off requests from teleop/scripts -> runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ControlRequest {
    Stop,
    Restart,
    ResetEncoder,
    SetSafety { enabled: bool },
    SetPid { kp: f64, ki: f64, kd: f64 },
    ShiftHigh,
    ShiftLow,
    DriveDistance { distance: f64, speed: f64 },
}

/// Dashboard values published once per loop tick
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DashboardFrame {
    pub values: BTreeMap<String, f64>,
}

impl From<BTreeMap<String, f64>> for DashboardFrame {
    fn from(values: BTreeMap<String, f64>) -> Self {
        Self { values }
    }
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
}
