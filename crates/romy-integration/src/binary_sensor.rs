//! Binary sensor platform

use std::collections::HashMap;

use romy_client::{RobotConnection, StatusMap};
use romy_core::states::{STATE_OFF, STATE_ON, STATE_UNKNOWN};
use romy_core::{Context, EntityIdError, Platform, State};
use serde_json::json;

use crate::entity::RomyEntity;

/// Static description of a binary sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinarySensorDescription {
    pub key: &'static str,
    pub label: &'static str,
    pub device_class: Option<&'static str>,
}

pub const BINARY_SENSORS: [BinarySensorDescription; 4] = [
    BinarySensorDescription {
        key: "dustbin",
        label: "Dustbin present",
        device_class: None,
    },
    BinarySensorDescription {
        key: "dock",
        label: "Robot docked",
        device_class: Some("presence"),
    },
    BinarySensorDescription {
        key: "water_tank",
        label: "Watertank present",
        device_class: Some("moisture"),
    },
    BinarySensorDescription {
        key: "water_tank_empty",
        label: "Watertank empty",
        device_class: Some("problem"),
    },
];

#[derive(Debug, Clone, PartialEq)]
pub struct RomyBinarySensor {
    entity: RomyEntity,
    description: BinarySensorDescription,
}

impl RomyBinarySensor {
    pub fn new(
        description: BinarySensorDescription,
        connection: &RobotConnection,
    ) -> Result<Self, EntityIdError> {
        Ok(Self {
            entity: RomyEntity::for_key(
                Platform::BinarySensor,
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

    pub fn description(&self) -> &BinarySensorDescription {
        &self.description
    }

    pub fn is_on(&self, status: &dyn StatusMap) -> Option<bool> {
        status.binary_sensor(self.description.key)
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

        if !available {
            return self.entity.unavailable(attributes, context);
        }

        let state = match status.and_then(|s| self.is_on(s)) {
            Some(true) => STATE_ON,
            Some(false) => STATE_OFF,
            None => STATE_UNKNOWN,
        };
        self.entity.state(state, attributes, context)
    }
}

/// Binary sensors for every key present in `status`
pub fn binary_sensors_for(
    status: &dyn StatusMap,
    connection: &RobotConnection,
) -> Result<Vec<RomyBinarySensor>, EntityIdError> {
    BINARY_SENSORS
        .iter()
        .filter(|description| status.binary_sensor(description.key).is_some())
        .map(|description| RomyBinarySensor::new(*description, connection))
        .collect()
}
