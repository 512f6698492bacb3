//! Entities exposed for a robot
//!
//! Every entity is a projection of the coordinator's latest status into a
//! [`State`]. Entities never hold status themselves; they read it through
//! [`StatusMap`] at projection time.

use std::collections::HashMap;

use romy_client::{RobotConnection, StatusMap};
use romy_core::states::STATE_UNAVAILABLE;
use romy_core::{Context, DeviceInfo, EntityId, EntityIdError, Platform, State, DOMAIN};
use serde_json::{json, Value};

use crate::binary_sensor::RomyBinarySensor;
use crate::sensor::RomySensor;
use crate::vacuum::RomyVacuum;

/// Category of a non-primary entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityCategory {
    Diagnostic,
}

impl EntityCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityCategory::Diagnostic => "diagnostic",
        }
    }
}

/// Identity shared by every entity of one robot
#[derive(Debug, Clone, PartialEq)]
pub struct RomyEntity {
    unique_id: String,
    name: String,
    entity_id: EntityId,
    device_info: DeviceInfo,
}

impl RomyEntity {
    /// Entity for one status key, e.g. `battery_level`
    ///
    /// Unique id `"<key>_<robot unique id>"`, name `"<robot name> <label>"`.
    pub fn for_key(
        platform: Platform,
        key: &str,
        label: &str,
        connection: &RobotConnection,
    ) -> Result<Self, EntityIdError> {
        Self::build(
            platform,
            format!("{}_{}", key, connection.unique_id),
            format!("{} {}", connection.user_name, label),
            connection,
        )
    }

    /// Entity representing the robot itself
    pub fn for_robot(platform: Platform, connection: &RobotConnection) -> Result<Self, EntityIdError> {
        Self::build(
            platform,
            connection.unique_id.clone(),
            connection.user_name.clone(),
            connection,
        )
    }

    fn build(
        platform: Platform,
        unique_id: String,
        name: String,
        connection: &RobotConnection,
    ) -> Result<Self, EntityIdError> {
        // Names without a single ASCII alphanumeric fall back to the unique id
        let entity_id = EntityId::from_name(platform, &name)
            .or_else(|_| EntityId::from_name(platform, &format!("{} {}", DOMAIN, unique_id)))?;

        Ok(Self {
            unique_id,
            name,
            entity_id,
            device_info: device_info(connection),
        })
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    pub fn device_info(&self) -> &DeviceInfo {
        &self.device_info
    }

    /// Build a state carrying the entity's friendly name
    pub(crate) fn state(
        &self,
        state: &str,
        mut attributes: HashMap<String, Value>,
        context: &Context,
    ) -> State {
        attributes.insert("friendly_name".to_string(), json!(self.name));
        State::new(self.entity_id.clone(), state, attributes, context.clone())
    }

    /// State reported while the coordinator's last refresh failed
    pub(crate) fn unavailable(&self, attributes: HashMap<String, Value>, context: &Context) -> State {
        self.state(STATE_UNAVAILABLE, attributes, context)
    }
}

/// Device registry info for a connected robot
pub fn device_info(connection: &RobotConnection) -> DeviceInfo {
    DeviceInfo::romy(
        connection.unique_id.clone(),
        connection.user_name.clone(),
        connection.model.clone(),
        connection.firmware.clone(),
    )
    .with_configuration_url(connection.configuration_url())
}

/// Any entity of the integration
pub enum Entity {
    Sensor(RomySensor),
    BinarySensor(RomyBinarySensor),
    Vacuum(RomyVacuum),
}

impl Entity {
    pub fn platform(&self) -> Platform {
        match self {
            Entity::Sensor(_) => Platform::Sensor,
            Entity::BinarySensor(_) => Platform::BinarySensor,
            Entity::Vacuum(_) => Platform::Vacuum,
        }
    }

    pub fn base(&self) -> &RomyEntity {
        match self {
            Entity::Sensor(e) => e.base(),
            Entity::BinarySensor(e) => e.base(),
            Entity::Vacuum(e) => e.base(),
        }
    }

    pub fn unique_id(&self) -> &str {
        self.base().unique_id()
    }

    pub fn entity_id(&self) -> &EntityId {
        self.base().entity_id()
    }

    /// Project the entity from `status`
    ///
    /// `available` is the coordinator's last update success and `context`
    /// the context of the refresh that produced `status`.
    pub fn project(
        &self,
        status: Option<&dyn StatusMap>,
        available: bool,
        context: &Context,
    ) -> State {
        match self {
            Entity::Sensor(e) => e.project(status, available, context),
            Entity::BinarySensor(e) => e.project(status, available, context),
            Entity::Vacuum(e) => e.project(status, available, context),
        }
    }
}
