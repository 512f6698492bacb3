//! Sensor platform
//!
//! Numeric diagnostic readings: battery level and WiFi signal strength from
//! the robot's sensor map, plus raw ADC readings.

use std::collections::HashMap;

use romy_client::{RobotConnection, StatusMap};
use romy_core::states::STATE_UNKNOWN;
use romy_core::{Context, EntityIdError, Platform, State};
use serde_json::json;

use crate::entity::{EntityCategory, RomyEntity};

/// Which status map a sensor reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorSource {
    Sensor,
    Adc,
}

/// Static description of a sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorDescription {
    pub key: &'static str,
    pub label: &'static str,
    pub device_class: Option<&'static str>,
    pub unit_of_measurement: Option<&'static str>,
    pub source: SensorSource,
}

pub const SENSORS: [SensorDescription; 3] = [
    SensorDescription {
        key: "battery_level",
        label: "Battery Level",
        device_class: Some("battery"),
        unit_of_measurement: Some("%"),
        source: SensorSource::Sensor,
    },
    SensorDescription {
        key: "rssi",
        label: "RSSI Level",
        device_class: Some("signal_strength"),
        unit_of_measurement: Some("dBm"),
        source: SensorSource::Sensor,
    },
    SensorDescription {
        key: "dustbin_sensor",
        label: "Dustbin Full Level",
        device_class: None,
        unit_of_measurement: None,
        source: SensorSource::Adc,
    },
];

impl SensorDescription {
    fn read(&self, status: &dyn StatusMap) -> Option<i64> {
        match self.source {
            SensorSource::Sensor => status.sensor(self.key),
            SensorSource::Adc => status.adc_sensor(self.key),
        }
    }
}

/// A numeric sensor of one robot
#[derive(Debug, Clone, PartialEq)]
pub struct RomySensor {
    entity: RomyEntity,
    description: SensorDescription,
}

impl RomySensor {
    pub fn new(
        description: SensorDescription,
        connection: &RobotConnection,
    ) -> Result<Self, EntityIdError> {
        Ok(Self {
            entity: RomyEntity::for_key(
                Platform::Sensor,
                description.key,
                description.label,
                connection,
            )?,
            description,
        })
    }

    pub fn base(&self) -> &RomyEntity {
        &self.entity
    }

    pub fn description(&self) -> &SensorDescription {
        &self.description
    }

    pub fn entity_category(&self) -> EntityCategory {
        EntityCategory::Diagnostic
    }

    pub fn native_value(&self, status: &dyn StatusMap) -> Option<i64> {
        self.description.read(status)
    }

    pub fn project(
        &self,
        status: Option<&dyn StatusMap>,
        available: bool,
        context: &Context,
    ) -> State {
        let mut attributes = HashMap::new();
        if let Some(device_class) = self.description.device_class {
            attributes.insert("device_class".to_string(), json!(device_class));
        }
        if let Some(unit) = self.description.unit_of_measurement {
            attributes.insert("unit_of_measurement".to_string(), json!(unit));
        }

        if !available {
            return self.entity.unavailable(attributes, context);
        }

        let value = status
            .and_then(|s| self.native_value(s))
            .map(|v| v.to_string())
            .unwrap_or_else(|| STATE_UNKNOWN.to_string());
        self.entity.state(&value, attributes, context)
    }
}

/// Sensors for every key present in `status`
pub fn sensors_for(
    status: &dyn StatusMap,
    connection: &RobotConnection,
) -> Result<Vec<RomySensor>, EntityIdError> {
    SENSORS
        .iter()
        .filter(|description| description.read(status).is_some())
        .map(|description| RomySensor::new(*description, connection))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::tests::connection;
    use romy_client::RobotStatus;

    #[test]
    fn test_only_present_sensors_created() {
        let status = RobotStatus::default()
            .with_sensor("battery_level", 80)
            .with_adc_sensor("dustbin_sensor", 412);

        let sensors = sensors_for(&status, &connection()).unwrap();
        let keys: Vec<&str> = sensors.iter().map(|s| s.description().key).collect();

        assert_eq!(keys, vec!["battery_level", "dustbin_sensor"]);
    }

    #[test]
    fn test_project_battery() {
        let sensor = RomySensor::new(SENSORS[0], &connection()).unwrap();
        let status = RobotStatus::default().with_sensor("battery_level", 80);

        let state = sensor.project(Some(&status), true, &Context::new());

        assert_eq!(state.state, "80");
        assert_eq!(state.entity_id.to_string(), "sensor.living_room_battery_level");
        assert_eq!(state.attribute::<String>("device_class").as_deref(), Some("battery"));
        assert_eq!(
            state.attribute::<String>("unit_of_measurement").as_deref(),
            Some("%")
        );
        assert_eq!(sensor.entity_category().as_str(), "diagnostic");
    }

    #[test]
    fn test_project_adc_sensor() {
        let sensor = RomySensor::new(SENSORS[2], &connection()).unwrap();
        let status = RobotStatus::default().with_adc_sensor("dustbin_sensor", 412);

        let state = sensor.project(Some(&status), true, &Context::new());

        assert_eq!(state.state, "412");
        assert_eq!(sensor.base().unique_id(), "dustbin_sensor_aicu-a1b2c3");
        assert!(state.attributes.get("device_class").is_none());
    }

    #[test]
    fn test_project_missing_and_unavailable() {
        let sensor = RomySensor::new(SENSORS[1], &connection()).unwrap();

        assert!(sensor.project(Some(&RobotStatus::default()), true, &Context::new()).is_unknown());
        assert!(sensor.project(None, true, &Context::new()).is_unknown());

        let status = RobotStatus::default().with_sensor("rssi", -58);
        let state = sensor.project(Some(&status), false, &Context::new());
        assert!(state.is_unavailable());
        assert_eq!(
            state.attribute::<String>("unit_of_measurement").as_deref(),
            Some("dBm")
        );
    }
}
