//! ROMY integration
//!
//! Turns configured robots into entities. The [`RomyHub`] owns everything a
//! running integration needs:
//!
//! - [`RomyIntegration`] - sets up and unloads config entries
//! - [`RomyCoordinator`] - polls one robot's status
//! - [`Entity`] - sensor, binary sensor and vacuum projections
//!
//! # Example
//!
//! ```ignore
//! use romy_integration::RomyHub;
//!
//! let hub = RomyHub::start("/config", client).await?;
//! hub.run_discovery(announcements).await;
//! ```

pub mod binary_sensor;
pub mod coordinator;
pub mod entity;
pub mod error;
pub mod hub;
pub mod integration;
pub mod sensor;
pub mod vacuum;

pub use binary_sensor::{RomyBinarySensor, BINARY_SENSORS};
pub use coordinator::{RomyCoordinator, UpdateFailed};
pub use entity::{device_info, Entity, EntityCategory, RomyEntity};
pub use error::{HubError, HubResult};
pub use hub::RomyHub;
pub use integration::{RomyIntegration, RomyRuntime};
pub use sensor::{RomySensor, SensorDescription, SensorSource, SENSORS};
pub use vacuum::{FanSpeed, RomyVacuum, VacuumError, VacuumFeatures, SUPPORTED_FEATURES};
