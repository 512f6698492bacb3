//! ROMY integration registries
//!
//! - [`Storage`] persists versioned JSON documents under `.storage/`
//! - [`DeviceRegistry`] tracks the robots that config entries were set up for

pub mod device_registry;
pub mod storage;

pub use device_registry::{DeviceEntry, DeviceRegistry, DeviceRegistryData};
pub use storage::{Storable, Storage, StorageError, StorageFile, StorageResult};
