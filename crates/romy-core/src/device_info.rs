//! Device description shared by all entities of one robot

use serde::{Deserialize, Serialize};

use crate::{DOMAIN, MANUFACTURER};

/// Describes the physical robot an entity belongs to
///
/// Used to register the robot in the device registry and to group its
/// entities under one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Identifiers as (domain, id) pairs
    pub identifiers: Vec<(String, String)>,
    /// Display name assigned to the robot by its owner
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    /// Firmware version
    pub sw_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration_url: Option<String>,
}

impl DeviceInfo {
    /// Build the device info for a robot identified by its serial/unique id
    pub fn romy(
        unique_id: impl Into<String>,
        name: impl Into<String>,
        model: impl Into<String>,
        firmware: impl Into<String>,
    ) -> Self {
        Self {
            identifiers: vec![(DOMAIN.to_string(), unique_id.into())],
            name: name.into(),
            manufacturer: MANUFACTURER.to_string(),
            model: model.into(),
            sw_version: firmware.into(),
            configuration_url: None,
        }
    }

    /// Set the URL of the robot's local web interface
    pub fn with_configuration_url(mut self, url: impl Into<String>) -> Self {
        self.configuration_url = Some(url.into());
        self
    }
}
