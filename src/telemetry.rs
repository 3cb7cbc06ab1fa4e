// Dashboard values and live-monitor registration
//
// The runtime owns a single NetworkTable for the whole process and hands
// subsystems an `Arc<dyn Dashboard>` at construction. Values are flushed to
// zenoh once per loop tick.

use std::collections::BTreeMap;
use std::sync::Mutex;

use tracing::debug;

/// Fire-and-forget numeric telemetry sink
pub trait Dashboard: Send + Sync {
    fn put_number(&self, key: &str, value: f64);
}

/// Registry of actuators exposed for live monitoring
pub trait LiveMonitor {
    fn add_actuator(&self, group: &str, label: &str, device_id: u8);
}

/// In-memory key/value table of the latest published numbers
#[derive(Debug, Default)]
pub struct NetworkTable {
    values: Mutex<BTreeMap<String, f64>>,
}

impl NetworkTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_number(&self, key: &str) -> Option<f64> {
        self.lock().get(key).copied()
    }

    /// Copy of every value currently in the table
    pub fn snapshot(&self) -> BTreeMap<String, f64> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, f64>> {
        // A panicked writer leaves plain numbers behind; keep serving them
        self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Dashboard for NetworkTable {
    fn put_number(&self, key: &str, value: f64) {
        self.lock().insert(key.to_string(), value);
    }
}

/// One registered actuator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActuatorEntry {
    pub group: String,
    pub label: String,
    pub device_id: u8,
}

/// In-memory live-monitor registry
#[derive(Debug, Default)]
pub struct LiveWindow {
    entries: Mutex<Vec<ActuatorEntry>>,
}

impl LiveWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<ActuatorEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl LiveMonitor for LiveWindow {
    fn add_actuator(&self, group: &str, label: &str, device_id: u8) {
        debug!("Live monitor: {}/{} -> device {}", group, label, device_id);
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(ActuatorEntry {
                group: group.to_string(),
                label: label.to_string(),
                device_id,
            });
    }
}
