// Timeouts, topics, scale constants and the hardware address map
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// Runtime loop frequency
pub const LOOP_HZ: u64 = 50;

// Highest loop rate with a non-zero millisecond tick
pub const MAX_LOOP_HZ: u64 = 1000;

// Operator input older than this is treated as stale (drive at zero)
pub const CMD_TIMEOUT: Duration = Duration::from_millis(250);

// Motor-safety expiration for the drive helper
pub const SAFETY_EXPIRATION: Duration = Duration::from_millis(100);

// Zenoh topics
pub const TOPIC_CMD_DRIVE: &str = "frc/cmd/drive"; // operator drive input
pub const TOPIC_CMD_CONTROL: &str = "frc/cmd/drive/control"; // mode toggles, autonomous requests
pub const TOPIC_DASHBOARD: &str = "frc/state/dashboard"; // telemetry values
pub const TOPIC_HEALTH: &str = "frc/state/health"; // health status

/// Raw encoder ticks per normalized position unit
pub const ENCODER_SCALE: f64 = 645.0;

/// Offset subtracted from the front-left current reading before publishing
pub const FL_CURRENT_OFFSET: f64 = 1.5;

/// Live-monitor group the primary drive motors are registered under
pub const LIVE_WINDOW_GROUP: &str = "Robot Drive";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read robot map {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid robot map {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

/// Hardware addresses for the drive subsystem
///
/// CAN ids for the six Talons and the PCM channel of the shifter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RobotMap {
    pub can_front_left: u8,
    pub can_rear_left: u8,
    pub can_front_right: u8,
    pub can_rear_right: u8,
    pub can_tension_left: u8,
    pub can_tension_right: u8,
    pub shifter_channel: u8,
    pub drive: DriveConfig,
}

impl Default for RobotMap {
    fn default() -> Self {
        Self {
            can_front_left: 1,
            can_rear_left: 2,
            can_front_right: 3,
            can_rear_right: 4,
            can_tension_left: 5,
            can_tension_right: 6,
            shifter_channel: 0,
            drive: DriveConfig::default(),
        }
    }
}

impl RobotMap {
    /// Load a robot map from a JSON file; missing fields keep their defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Tuning for the differential-drive helper
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DriveConfig {
    pub squared_inputs: bool,
    pub safety_expiration_ms: u64,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            squared_inputs: true,
            safety_expiration_ms: SAFETY_EXPIRATION.as_millis() as u64,
        }
    }
}

impl DriveConfig {
    pub fn safety_expiration(&self) -> Duration {
        Duration::from_millis(self.safety_expiration_ms)
    }
}
