//! Values reported by a robot

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Result of one connection attempt
///
/// Produced fresh on every [`crate::DeviceClient::connect`] call and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RobotConnection {
    /// Host the connection was attempted against
    pub host: String,
    /// The robot answered and reported its identity
    pub initialized: bool,
    /// The local HTTP interface accepts commands without further unlocking
    pub unlocked: bool,
    /// Stable unique identifier (serial) of the robot
    pub unique_id: String,
    /// Display name assigned to the robot by its owner
    pub user_name: String,
    /// Port of the local HTTP interface
    pub port: u16,
    pub model: String,
    pub firmware: String,
}

impl RobotConnection {
    /// A connection attempt that reached nothing
    pub fn unreachable(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            initialized: false,
            unlocked: false,
            unique_id: String::new(),
            user_name: String::new(),
            port: 0,
            model: String::new(),
            firmware: String::new(),
        }
    }

    /// URL of the robot's local web interface
    pub fn configuration_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Snapshot of a robot's live status
///
/// Sensor values are addressed by string keys. The set of keys present in
/// each map is the set of sensors the robot supports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RobotStatus {
    /// Boolean sensors, e.g. `dock`, `dustbin`, `water_tank`, `water_tank_empty`
    #[serde(default)]
    pub binary_sensors: HashMap<String, bool>,
    /// Numeric sensors, e.g. `battery_level`, `rssi`
    #[serde(default)]
    pub sensors: HashMap<String, i64>,
    /// Raw analog readings, e.g. `dustbin_sensor`
    #[serde(default)]
    pub adc_sensors: HashMap<String, i64>,
    /// Operating mode as reported by the robot (e.g. "cleaning", "docked")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// Index of the active cleaning parameter set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleaning_parameter_set: Option<u8>,
}

impl RobotStatus {
    pub fn with_binary_sensor(mut self, key: impl Into<String>, value: bool) -> Self {
        self.binary_sensors.insert(key.into(), value);
        self
    }

    pub fn with_sensor(mut self, key: impl Into<String>, value: i64) -> Self {
        self.sensors.insert(key.into(), value);
        self
    }

    pub fn with_adc_sensor(mut self, key: impl Into<String>, value: i64) -> Self {
        self.adc_sensors.insert(key.into(), value);
        self
    }

    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    pub fn with_cleaning_parameter_set(mut self, index: u8) -> Self {
        self.cleaning_parameter_set = Some(index);
        self
    }
}

/// Anything that exposes named status values
///
/// Entities look their values up through this trait only, so they can be
/// projected from a live status or from any other keyed source.
pub trait StatusMap {
    fn binary_sensor(&self, key: &str) -> Option<bool>;
    fn sensor(&self, key: &str) -> Option<i64>;
    fn adc_sensor(&self, key: &str) -> Option<i64>;
    fn mode(&self) -> Option<&str>;
    fn cleaning_parameter_set(&self) -> Option<u8>;
}

impl StatusMap for RobotStatus {
    fn binary_sensor(&self, key: &str) -> Option<bool> {
        self.binary_sensors.get(key).copied()
    }

    fn sensor(&self, key: &str) -> Option<i64> {
        self.sensors.get(key).copied()
    }

    fn adc_sensor(&self, key: &str) -> Option<i64> {
        self.adc_sensors.get(key).copied()
    }

    fn mode(&self) -> Option<&str> {
        self.mode.as_deref()
    }

    fn cleaning_parameter_set(&self) -> Option<u8> {
        self.cleaning_parameter_set
    }
}
