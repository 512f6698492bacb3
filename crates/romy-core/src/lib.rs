//! Core types for the ROMY integration
//!
//! This crate provides the fundamental types shared by every other crate in
//! the workspace: EntityId, State, Context and DeviceInfo, plus the constants
//! that identify the integration and its configuration keys.

mod context;
mod device_info;
mod entity_id;
mod platform;
mod state;

use std::time::Duration;

pub use context::Context;
pub use device_info::DeviceInfo;
pub use entity_id::{slugify, EntityId, EntityIdError};
pub use platform::Platform;
pub use state::State;

/// Integration domain, also used as the config entry domain
pub const DOMAIN: &str = "romy";

/// Manufacturer reported for every registered device
pub const MANUFACTURER: &str = "ROMY";

/// Icon shown for the vacuum entity
pub const ICON: &str = "mdi:robot-vacuum";

/// Zeroconf service type announced by ROMY robots
pub const ZEROCONF_TYPE: &str = "_aicu-http._tcp.local.";

/// Config entry data key holding the robot's host or IP address
pub const CONF_HOST: &str = "host";

/// Config entry data key holding the robot's local interface password
pub const CONF_PASSWORD: &str = "password";

/// Minimum length of a local interface password
pub const PASSWORD_MIN_LENGTH: usize = 8;

/// Default polling interval of the coordinator
pub const UPDATE_INTERVAL: Duration = Duration::from_secs(5);

/// Well-known state values
pub mod states {
    pub const STATE_ON: &str = "on";
    pub const STATE_OFF: &str = "off";
    pub const STATE_UNKNOWN: &str = "unknown";
    pub const STATE_UNAVAILABLE: &str = "unavailable";
}
