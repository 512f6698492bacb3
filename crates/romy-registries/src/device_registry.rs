//! Device Registry
//!
//! Tracks the robots that have been set up, indexed by identifier and by
//! the config entries that reference them.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use romy_core::DeviceInfo;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::storage::{Storable, Storage, StorageResult};

/// Storage key for device registry
pub const STORAGE_KEY: &str = "core.device_registry";
pub const STORAGE_VERSION: u32 = 1;
pub const STORAGE_MINOR_VERSION: u32 = 1;

/// A registered device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceEntry {
    /// Internal id
    pub id: String,

    /// (domain, id) pairs, e.g. `("romy", "<serial>")`
    #[serde(default)]
    pub identifiers: Vec<(String, String)>,

    /// Config entries referencing this device
    #[serde(default)]
    pub config_entries: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Firmware version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sw_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration_url: Option<String>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub modified_at: DateTime<Utc>,
}

impl DeviceEntry {
    fn new() -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            identifiers: Vec::new(),
            config_entries: Vec::new(),
            name: None,
            manufacturer: None,
            model: None,
            sw_version: None,
            configuration_url: None,
            created_at: now,
            modified_at: now,
        }
    }

    /// Overwrite descriptive fields from a device info
    fn apply(&mut self, info: &DeviceInfo) {
        for identifier in &info.identifiers {
            if !self.identifiers.contains(identifier) {
                self.identifiers.push(identifier.clone());
            }
        }
        self.name = Some(info.name.clone());
        self.manufacturer = Some(info.manufacturer.clone());
        self.model = Some(info.model.clone());
        self.sw_version = Some(info.sw_version.clone());
        if info.configuration_url.is_some() {
            self.configuration_url = info.configuration_url.clone();
        }
        self.modified_at = Utc::now();
    }
}

fn identifier_key((domain, id): &(String, String)) -> String {
    format!("{}:{}", domain, id)
}

/// Device registry data for storage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceRegistryData {
    pub devices: Vec<DeviceEntry>,
}

impl Storable for DeviceRegistryData {
    const KEY: &'static str = STORAGE_KEY;
    const VERSION: u32 = STORAGE_VERSION;
    const MINOR_VERSION: u32 = STORAGE_MINOR_VERSION;
}

/// Device Registry
pub struct DeviceRegistry {
    storage: Arc<Storage>,

    /// Primary index: device_id -> DeviceEntry
    by_id: DashMap<String, Arc<DeviceEntry>>,

    /// Index: identifier key -> device_id
    by_identifier: DashMap<String, String>,

    /// Index: config_entry_id -> set of device_ids
    by_config_entry_id: DashMap<String, HashSet<String>>,
}

impl DeviceRegistry {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            by_id: DashMap::new(),
            by_identifier: DashMap::new(),
            by_config_entry_id: DashMap::new(),
        }
    }

    /// Load from storage
    pub async fn load(&self) -> StorageResult<()> {
        if let Some(file) = self.storage.load::<DeviceRegistryData>().await? {
            info!("Loading {} devices from storage", file.data.devices.len());
            for entry in file.data.devices {
                self.index_entry(Arc::new(entry));
            }
        }
        Ok(())
    }

    /// Save to storage
    pub async fn save(&self) -> StorageResult<()> {
        let data = DeviceRegistryData {
            devices: self.by_id.iter().map(|r| (**r.value()).clone()).collect(),
        };
        self.storage.save(&data).await?;
        debug!("Saved {} devices to storage", self.by_id.len());
        Ok(())
    }

    fn index_entry(&self, entry: Arc<DeviceEntry>) {
        let device_id = entry.id.clone();

        for identifier in &entry.identifiers {
            self.by_identifier
                .insert(identifier_key(identifier), device_id.clone());
        }
        for config_entry_id in &entry.config_entries {
            self.by_config_entry_id
                .entry(config_entry_id.clone())
                .or_default()
                .insert(device_id.clone());
        }

        self.by_id.insert(device_id, entry);
    }

    fn unindex_entry(&self, entry: &DeviceEntry) {
        for identifier in &entry.identifiers {
            self.by_identifier.remove(&identifier_key(identifier));
        }
        for config_entry_id in &entry.config_entries {
            if let Some(mut ids) = self.by_config_entry_id.get_mut(config_entry_id) {
                ids.remove(&entry.id);
            }
        }
        self.by_id.remove(&entry.id);
    }

    pub fn get(&self, device_id: &str) -> Option<Arc<DeviceEntry>> {
        self.by_id.get(device_id).map(|r| r.value().clone())
    }

    /// Look a device up by one of its identifiers
    pub fn get_by_identifier(&self, domain: &str, id: &str) -> Option<Arc<DeviceEntry>> {
        self.by_identifier
            .get(&format!("{}:{}", domain, id))
            .and_then(|device_id| self.get(&device_id))
    }

    /// Devices referenced by a config entry
    pub fn get_by_config_entry_id(&self, config_entry_id: &str) -> Vec<Arc<DeviceEntry>> {
        self.by_config_entry_id
            .get(config_entry_id)
            .map(|ids| ids.iter().filter_map(|id| self.get(id)).collect())
            .unwrap_or_default()
    }

    /// Register a device for a config entry, or refresh an existing one
    ///
    /// An existing device is matched by any of the info's identifiers; its
    /// descriptive fields are replaced (a robot's firmware and name change
    /// over time) and the config entry is linked to it.
    pub fn get_or_create(&self, config_entry_id: &str, info: &DeviceInfo) -> Arc<DeviceEntry> {
        let existing = info
            .identifiers
            .iter()
            .find_map(|identifier| self.by_identifier.get(&identifier_key(identifier)))
            .and_then(|device_id| self.get(&device_id));

        let mut entry = match existing {
            Some(entry) => {
                self.unindex_entry(&entry);
                (*entry).clone()
            }
            None => {
                let entry = DeviceEntry::new();
                info!("Registering device {} ({})", info.name, entry.id);
                entry
            }
        };

        entry.apply(info);
        if !entry.config_entries.iter().any(|id| id == config_entry_id) {
            entry.config_entries.push(config_entry_id.to_string());
        }

        let entry = Arc::new(entry);
        self.index_entry(entry.clone());
        entry
    }

    /// Unlink a config entry; devices left without entries are removed
    pub fn remove_config_entry(&self, config_entry_id: &str) -> Vec<Arc<DeviceEntry>> {
        let mut removed = Vec::new();

        for device in self.get_by_config_entry_id(config_entry_id) {
            self.unindex_entry(&device);

            let mut updated = (*device).clone();
            updated.config_entries.retain(|id| id != config_entry_id);

            if updated.config_entries.is_empty() {
                debug!("Removing device {} with no config entries", updated.id);
                removed.push(Arc::new(updated));
            } else {
                updated.modified_at = Utc::now();
                self.index_entry(Arc::new(updated));
            }
        }
        self.by_config_entry_id.remove(config_entry_id);

        removed
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
