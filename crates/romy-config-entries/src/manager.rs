//! Config Entries Manager
//!
//! Manages the persisted config entries and their setup lifecycle.

use std::collections::HashSet;
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use romy_core::CONF_HOST;
use romy_registries::{Storable, Storage, StorageResult};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::entry::{ConfigEntry, ConfigEntryState, ConfigEntryUpdate};
use crate::state_machine::{calculate_retry_delay, InvalidTransition};

/// Storage key for config entries
pub const STORAGE_KEY: &str = "core.config_entries";
/// Current storage version
pub const STORAGE_VERSION: u32 = 1;
/// Current minor version
pub const STORAGE_MINOR_VERSION: u32 = 1;

/// Config entries errors
#[derive(Debug, Error)]
pub enum ConfigEntriesError {
    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("Entry already exists for domain {domain} with unique_id {unique_id}")]
    AlreadyExists { domain: String, unique_id: String },

    #[error("Cannot unload entry in state {0:?}")]
    CannotUnload(ConfigEntryState),

    #[error(transparent)]
    InvalidState(#[from] InvalidTransition),

    #[error("Setup of {entry_id} not ready, retrying in {retry_in:?}: {reason}")]
    NotReady {
        entry_id: String,
        reason: String,
        retry_in: Duration,
    },

    #[error("Setup failed: {0}")]
    SetupFailed(String),

    #[error("Unload failed: {0}")]
    UnloadFailed(String),

    #[error("Storage error: {0}")]
    Storage(#[from] romy_registries::StorageError),
}

pub type ConfigEntriesResult<T> = Result<T, ConfigEntriesError>;

/// Why an integration could not set up or unload an entry
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SetupError {
    /// The robot is temporarily unavailable; setup is retried with backoff
    #[error("not ready: {0}")]
    NotReady(String),

    /// Setup cannot succeed without user intervention
    #[error("{0}")]
    Failed(String),
}

/// Integration hook invoked when an entry of its domain is set up or unloaded
#[async_trait]
pub trait EntrySetup: Send + Sync {
    async fn setup_entry(&self, entry: &ConfigEntry) -> Result<(), SetupError>;

    async fn unload_entry(&self, entry: &ConfigEntry) -> Result<(), SetupError>;
}

/// The registry operations the onboarding flow relies on
///
/// `create` must refuse a second entry for the same `(domain, unique_id)`
/// atomically, so concurrent flows for the same robot cannot both succeed.
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Whether an entry with this unique_id already exists
    fn is_configured(&self, domain: &str, unique_id: &str) -> bool;

    /// Point an existing entry at a new host; returns whether anything changed
    async fn update_host(
        &self,
        domain: &str,
        unique_id: &str,
        host: &str,
    ) -> ConfigEntriesResult<bool>;

    /// Persist a new entry
    async fn create(&self, entry: ConfigEntry) -> ConfigEntriesResult<ConfigEntry>;
}

/// Config entries data for storage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigEntriesData {
    pub entries: Vec<ConfigEntry>,
}

impl Storable for ConfigEntriesData {
    const KEY: &'static str = STORAGE_KEY;
    const VERSION: u32 = STORAGE_VERSION;
    const MINOR_VERSION: u32 = STORAGE_MINOR_VERSION;
}

/// Config Entries Manager
pub struct ConfigEntries {
    storage: Arc<Storage>,

    /// Primary index: entry_id -> ConfigEntry
    entries: DashMap<String, ConfigEntry>,

    /// Index: domain -> set of entry_ids
    by_domain: DashMap<String, HashSet<String>>,

    /// Index: (domain, unique_id) -> entry_id
    by_unique_id: DashMap<(String, String), String>,

    /// Serializes setup and unload
    setup_lock: Mutex<()>,

    /// Setup hooks by domain
    setup_handlers: DashMap<String, Arc<dyn EntrySetup>>,

    /// Handle for background setup retries
    this: Weak<ConfigEntries>,
}

impl ConfigEntries {
    pub fn new(storage: Arc<Storage>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            storage,
            entries: DashMap::new(),
            by_domain: DashMap::new(),
            by_unique_id: DashMap::new(),
            setup_lock: Mutex::new(()),
            setup_handlers: DashMap::new(),
            this: this.clone(),
        })
    }

    /// Load entries from storage
    pub async fn load(&self) -> StorageResult<()> {
        if let Some(file) = self.storage.load::<ConfigEntriesData>().await? {
            info!(
                "Loading {} config entries from storage (v{}.{})",
                file.data.entries.len(),
                file.version,
                file.minor_version
            );

            for entry in file.data.entries {
                self.index_entry(&entry);
            }
        }
        Ok(())
    }

    /// Save entries to storage
    pub async fn save(&self) -> StorageResult<()> {
        let data = ConfigEntriesData {
            entries: self.entries.iter().map(|r| r.value().clone()).collect(),
        };

        self.storage.save(&data).await?;
        debug!("Saved {} config entries to storage", self.entries.len());
        Ok(())
    }

    fn index_entry(&self, entry: &ConfigEntry) {
        let entry_id = entry.entry_id.clone();

        self.entries.insert(entry_id.clone(), entry.clone());

        self.by_domain
            .entry(entry.domain.clone())
            .or_default()
            .insert(entry_id.clone());

        if let Some(ref unique_id) = entry.unique_id {
            self.by_unique_id
                .insert((entry.domain.clone(), unique_id.clone()), entry_id);
        }
    }

    fn unindex_entry(&self, entry: &ConfigEntry) {
        if let Some(mut ids) = self.by_domain.get_mut(&entry.domain) {
            ids.remove(&entry.entry_id);
        }

        if let Some(ref unique_id) = entry.unique_id {
            self.by_unique_id
                .remove(&(entry.domain.clone(), unique_id.clone()));
        }

        self.entries.remove(&entry.entry_id);
    }

    /// Get an entry by ID
    pub fn get(&self, entry_id: &str) -> Option<ConfigEntry> {
        self.entries.get(entry_id).map(|r| r.value().clone())
    }

    /// Get all entries for a domain
    pub fn get_by_domain(&self, domain: &str) -> Vec<ConfigEntry> {
        self.by_domain
            .get(domain)
            .map(|ids| ids.iter().filter_map(|id| self.get(id)).collect())
            .unwrap_or_default()
    }

    /// Get entry by unique_id
    pub fn get_by_unique_id(&self, domain: &str, unique_id: &str) -> Option<ConfigEntry> {
        self.by_unique_id
            .get(&(domain.to_string(), unique_id.to_string()))
            .and_then(|entry_id| self.get(&entry_id))
    }

    /// Add a new config entry
    ///
    /// The unique_id slot is claimed before anything else is touched, so of
    /// two concurrent adds for the same robot exactly one wins.
    pub async fn add(&self, entry: ConfigEntry) -> ConfigEntriesResult<ConfigEntry> {
        if let Some(ref unique_id) = entry.unique_id {
            match self
                .by_unique_id
                .entry((entry.domain.clone(), unique_id.clone()))
            {
                Entry::Occupied(_) => {
                    return Err(ConfigEntriesError::AlreadyExists {
                        domain: entry.domain.clone(),
                        unique_id: unique_id.clone(),
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(entry.entry_id.clone());
                }
            }
        }

        self.index_entry(&entry);
        if let Err(e) = self.save().await {
            self.unindex_entry(&entry);
            return Err(e.into());
        }

        info!(
            "Added config entry: {} ({}) [{}]",
            entry.title, entry.domain, entry.entry_id
        );

        Ok(entry)
    }

    /// Update an existing entry
    pub async fn update(
        &self,
        entry_id: &str,
        update: ConfigEntryUpdate,
    ) -> ConfigEntriesResult<ConfigEntry> {
        let updated = {
            let mut entry = self
                .entries
                .get_mut(entry_id)
                .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

            if let Some(title) = update.title {
                entry.title = title;
            }
            if let Some(data) = update.data {
                entry.data = data;
            }
            if let Some(options) = update.options {
                entry.options = options;
            }
            if let Some(pref) = update.pref_disable_polling {
                entry.pref_disable_polling = pref;
            }
            entry.modified_at = Utc::now();
            entry.clone()
        };

        self.save().await?;

        debug!("Updated config entry: {}", entry_id);
        Ok(updated)
    }

    /// Remove an entry, unloading it first
    pub async fn remove(&self, entry_id: &str) -> ConfigEntriesResult<ConfigEntry> {
        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        if entry.state != ConfigEntryState::NotLoaded {
            self.unload(entry_id).await?;
        }

        self.unindex_entry(&entry);
        self.save().await?;

        info!(
            "Removed config entry: {} ({}) [{}]",
            entry.title, entry.domain, entry_id
        );

        Ok(entry)
    }

    /// Move an entry to a new lifecycle state
    fn set_state(
        &self,
        entry_id: &str,
        state: ConfigEntryState,
        reason: Option<String>,
    ) -> ConfigEntriesResult<()> {
        let mut entry = self
            .entries
            .get_mut(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        entry.try_set_state(state, reason).map_err(|e| {
            warn!("Entry {}: {}", entry_id, e);
            ConfigEntriesError::from(e)
        })?;
        debug!("Entry {} state changed to {:?}", entry_id, state);
        Ok(())
    }

    /// Register the setup hook for a domain
    pub fn register_setup_handler(&self, domain: &str, handler: Arc<dyn EntrySetup>) {
        self.setup_handlers.insert(domain.to_string(), handler);
        debug!("Registered setup handler for domain: {}", domain);
    }

    fn handler_for(&self, domain: &str) -> Option<Arc<dyn EntrySetup>> {
        self.setup_handlers.get(domain).map(|h| h.value().clone())
    }

    /// Set up an entry
    ///
    /// A handler reporting [`SetupError::NotReady`] leaves the entry in
    /// `SetupRetry` and returns [`ConfigEntriesError::NotReady`] carrying the
    /// backoff delay for the next attempt.
    pub async fn setup(&self, entry_id: &str) -> ConfigEntriesResult<()> {
        let _lock = self.setup_lock.lock().await;

        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        self.set_state(entry_id, ConfigEntryState::SetupInProgress, None)?;

        let Some(handler) = self.handler_for(&entry.domain) else {
            self.set_state(entry_id, ConfigEntryState::Loaded, None)?;
            debug!(
                "No setup handler for domain {}, marking as loaded",
                entry.domain
            );
            return Ok(());
        };

        match handler.setup_entry(&entry).await {
            Ok(()) => {
                self.set_state(entry_id, ConfigEntryState::Loaded, None)?;
                info!("Setup completed for entry: {} ({})", entry.title, entry_id);
                Ok(())
            }
            Err(SetupError::NotReady(reason)) => {
                self.set_state(
                    entry_id,
                    ConfigEntryState::SetupRetry,
                    Some(reason.clone()),
                )?;
                let tries = self
                    .entries
                    .get_mut(entry_id)
                    .map(|mut e| e.increment_tries())
                    .unwrap_or(1);
                let retry_in = calculate_retry_delay(tries - 1);
                warn!(
                    "Setup of {} not ready ({}), retrying in {:?}",
                    entry.title, reason, retry_in
                );
                Err(ConfigEntriesError::NotReady {
                    entry_id: entry_id.to_string(),
                    reason,
                    retry_in,
                })
            }
            Err(SetupError::Failed(reason)) => {
                warn!("Setup failed for entry {}: {}", entry_id, reason);
                self.set_state(entry_id, ConfigEntryState::SetupError, Some(reason.clone()))?;
                Err(ConfigEntriesError::SetupFailed(reason))
            }
        }
    }

    /// Set up an entry now; while the robot is not ready keep retrying in
    /// the background with backoff
    ///
    /// Returns the result of the first attempt.
    pub async fn setup_with_retry(&self, entry_id: &str) -> ConfigEntriesResult<()> {
        let result = self.setup(entry_id).await;
        if let Err(ConfigEntriesError::NotReady { retry_in, .. }) = &result {
            self.schedule_retry(entry_id, *retry_in);
        }
        result
    }

    /// Retry setup after `delay` until it succeeds or fails permanently
    ///
    /// Retrying stops as well when the entry was unloaded or removed in the
    /// meantime.
    fn schedule_retry(&self, entry_id: &str, delay: Duration) -> Option<JoinHandle<()>> {
        let manager = self.this.upgrade()?;
        let entry_id = entry_id.to_string();

        Some(tokio::spawn(async move {
            let mut delay = delay;
            loop {
                tokio::time::sleep(delay).await;

                let still_waiting = manager
                    .get(&entry_id)
                    .map(|e| e.state == ConfigEntryState::SetupRetry)
                    .unwrap_or(false);
                if !still_waiting {
                    debug!("Entry {} no longer awaiting retry", entry_id);
                    break;
                }

                match manager.setup(&entry_id).await {
                    Err(ConfigEntriesError::NotReady { retry_in, .. }) => delay = retry_in,
                    Err(e) => {
                        warn!("Retrying setup of {} stopped: {}", entry_id, e);
                        break;
                    }
                    Ok(()) => break,
                }
            }
        }))
    }

    /// Unload an entry
    pub async fn unload(&self, entry_id: &str) -> ConfigEntriesResult<()> {
        let _lock = self.setup_lock.lock().await;

        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        if entry.state == ConfigEntryState::NotLoaded {
            return Ok(());
        }
        if !entry.state.is_recoverable() {
            return Err(ConfigEntriesError::CannotUnload(entry.state));
        }

        let was_loaded = entry.is_loaded();
        self.set_state(entry_id, ConfigEntryState::UnloadInProgress, None)?;

        // Only a loaded entry has anything for the integration to tear down
        let result = match self.handler_for(&entry.domain) {
            Some(handler) if was_loaded => handler.unload_entry(&entry).await,
            _ => Ok(()),
        };

        match result {
            Ok(()) => {
                self.set_state(entry_id, ConfigEntryState::NotLoaded, None)?;
                info!("Unloaded entry: {} ({})", entry.title, entry_id);
                Ok(())
            }
            Err(e) => {
                self.set_state(
                    entry_id,
                    ConfigEntryState::FailedUnload,
                    Some(e.to_string()),
                )?;
                Err(ConfigEntriesError::UnloadFailed(e.to_string()))
            }
        }
    }

    /// Reload an entry (unload + setup)
    ///
    /// A robot that is not ready after the reload is retried like any other
    /// setup.
    pub async fn reload(&self, entry_id: &str) -> ConfigEntriesResult<()> {
        self.unload(entry_id).await?;
        self.setup_with_retry(entry_id).await
    }

    pub fn entry_ids(&self) -> Vec<String> {
        self.entries.iter().map(|r| r.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl EntryStore for ConfigEntries {
    fn is_configured(&self, domain: &str, unique_id: &str) -> bool {
        self.by_unique_id
            .contains_key(&(domain.to_string(), unique_id.to_string()))
    }

    async fn update_host(
        &self,
        domain: &str,
        unique_id: &str,
        host: &str,
    ) -> ConfigEntriesResult<bool> {
        let Some(entry) = self.get_by_unique_id(domain, unique_id) else {
            return Ok(false);
        };
        if entry.host() == Some(host) {
            return Ok(false);
        }

        let mut data = entry.data.clone();
        data.insert(
            CONF_HOST.to_string(),
            serde_json::Value::String(host.to_string()),
        );
        let updated = self
            .update(&entry.entry_id, ConfigEntryUpdate::new().data(data))
            .await?;
        info!(
            "Host of {} changed from {:?} to {}",
            updated.title,
            entry.host(),
            host
        );

        if updated.is_loaded() {
            if let Err(e) = self.reload(&updated.entry_id).await {
                warn!("Reload of {} after host change failed: {}", updated.title, e);
            }
        }

        Ok(true)
    }

    async fn create(&self, entry: ConfigEntry) -> ConfigEntriesResult<ConfigEntry> {
        self.add(entry).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::ConfigEntrySource;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tempfile::TempDir;

    fn create_test_manager() -> (TempDir, Arc<ConfigEntries>) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::new(temp_dir.path()));
        let manager = ConfigEntries::new(storage);
        (temp_dir, manager)
    }

    fn robot_entry(unique_id: &str, host: &str) -> ConfigEntry {
        ConfigEntry::new("romy", "myROMY")
            .with_credentials(host, "")
            .with_unique_id(unique_id)
    }

    /// Handler returning scripted setup results
    struct ScriptedSetup {
        results: std::sync::Mutex<Vec<Result<(), SetupError>>>,
        unloads: AtomicUsize,
    }

    impl ScriptedSetup {
        fn new(results: Vec<Result<(), SetupError>>) -> Arc<Self> {
            Arc::new(Self {
                results: std::sync::Mutex::new(results),
                unloads: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl EntrySetup for ScriptedSetup {
        async fn setup_entry(&self, _entry: &ConfigEntry) -> Result<(), SetupError> {
            let mut results = self.results.lock().unwrap();
            if results.is_empty() {
                Ok(())
            } else {
                results.remove(0)
            }
        }

        async fn unload_entry(&self, _entry: &ConfigEntry) -> Result<(), SetupError> {
            self.unloads.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_add_entry() {
        let (_dir, manager) = create_test_manager();

        let added = manager
            .add(robot_entry("romy-abc", "1.2.3.4").with_source(ConfigEntrySource::Zeroconf))
            .await
            .unwrap();
        assert_eq!(added.domain, "romy");
        assert_eq!(manager.len(), 1);
        assert!(manager.is_configured("romy", "romy-abc"));
        assert!(!manager.is_configured("romy", "romy-other"));
    }

    #[tokio::test]
    async fn test_duplicate_unique_id_rejected() {
        let (_dir, manager) = create_test_manager();

        manager.add(robot_entry("same-id", "1.2.3.4")).await.unwrap();
        let result = manager.add(robot_entry("same-id", "1.2.3.5")).await;

        assert!(matches!(
            result,
            Err(ConfigEntriesError::AlreadyExists { .. })
        ));
        assert_eq!(manager.len(), 1);
        assert_eq!(
            manager.get_by_unique_id("romy", "same-id").unwrap().host(),
            Some("1.2.3.4")
        );
    }

    #[tokio::test]
    async fn test_concurrent_create_single_winner() {
        let (_dir, manager) = create_test_manager();

        let a = tokio::spawn({
            let manager = manager.clone();
            async move { manager.create(robot_entry("romy-abc", "1.2.3.4")).await }
        });
        let b = tokio::spawn({
            let manager = manager.clone();
            async move { manager.create(robot_entry("romy-abc", "1.2.3.4")).await }
        });

        let results = [a.await.unwrap(), b.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(manager.len(), 1);
    }

    #[tokio::test]
    async fn test_update_host() {
        let (_dir, manager) = create_test_manager();
        let entry = manager.add(robot_entry("romy-abc", "1.2.3.4")).await.unwrap();

        assert!(manager.update_host("romy", "romy-abc", "1.2.3.9").await.unwrap());
        assert!(!manager.update_host("romy", "romy-abc", "1.2.3.9").await.unwrap());
        assert!(!manager.update_host("romy", "unknown", "1.2.3.9").await.unwrap());

        let updated = manager.get(&entry.entry_id).unwrap();
        assert_eq!(updated.host(), Some("1.2.3.9"));
        assert_eq!(updated.password(), "");
        assert_eq!(updated.title, "myROMY");
    }

    #[tokio::test]
    async fn test_update_host_reloads_loaded_entry() {
        let (_dir, manager) = create_test_manager();
        let handler = ScriptedSetup::new(vec![]);
        manager.register_setup_handler("romy", handler.clone());

        let entry = manager.add(robot_entry("romy-abc", "1.2.3.4")).await.unwrap();
        manager.setup(&entry.entry_id).await.unwrap();

        manager.update_host("romy", "romy-abc", "1.2.3.9").await.unwrap();

        assert_eq!(handler.unloads.load(Ordering::SeqCst), 1);
        assert!(manager.get(&entry.entry_id).unwrap().is_loaded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_host_change_reload_retries_until_loaded() {
        let (_dir, manager) = create_test_manager();
        manager.register_setup_handler(
            "romy",
            ScriptedSetup::new(vec![
                Ok(()),
                Err(SetupError::NotReady("robot still booting".to_string())),
            ]),
        );

        let entry = manager.add(robot_entry("romy-abc", "1.2.3.4")).await.unwrap();
        manager.setup(&entry.entry_id).await.unwrap();

        assert!(manager.update_host("romy", "romy-abc", "1.2.3.9").await.unwrap());
        assert_eq!(
            manager.get(&entry.entry_id).unwrap().state,
            ConfigEntryState::SetupRetry
        );

        tokio::time::sleep(Duration::from_secs(6)).await;
        let stored = manager.get(&entry.entry_id).unwrap();
        assert!(stored.is_loaded());
        assert_eq!(stored.host(), Some("1.2.3.9"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_stops_after_unload() {
        let handler = ScriptedSetup::new(vec![Err(SetupError::NotReady(
            "robot offline".to_string(),
        ))]);
        let (_dir, manager) = create_test_manager();
        manager.register_setup_handler("romy", handler.clone());

        let entry = manager.add(robot_entry("romy-abc", "1.2.3.4")).await.unwrap();
        assert!(matches!(
            manager.setup_with_retry(&entry.entry_id).await,
            Err(ConfigEntriesError::NotReady { .. })
        ));
        manager.unload(&entry.entry_id).await.unwrap();

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(
            manager.get(&entry.entry_id).unwrap().state,
            ConfigEntryState::NotLoaded
        );
    }

    #[tokio::test]
    async fn test_remove_entry() {
        let (_dir, manager) = create_test_manager();

        let entry = manager.add(robot_entry("romy-abc", "1.2.3.4")).await.unwrap();
        manager.setup(&entry.entry_id).await.unwrap();

        manager.remove(&entry.entry_id).await.unwrap();
        assert!(manager.is_empty());
        assert!(!manager.is_configured("romy", "romy-abc"));
    }

    #[tokio::test]
    async fn test_setup_and_unload() {
        let (_dir, manager) = create_test_manager();
        let handler = ScriptedSetup::new(vec![]);
        manager.register_setup_handler("romy", handler.clone());

        let entry = manager.add(robot_entry("romy-abc", "1.2.3.4")).await.unwrap();
        manager.setup(&entry.entry_id).await.unwrap();
        assert!(manager.get(&entry.entry_id).unwrap().is_loaded());

        manager.unload(&entry.entry_id).await.unwrap();
        assert_eq!(
            manager.get(&entry.entry_id).unwrap().state,
            ConfigEntryState::NotLoaded
        );
        assert_eq!(handler.unloads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_setup_not_ready_schedules_retry() {
        let (_dir, manager) = create_test_manager();
        manager.register_setup_handler(
            "romy",
            ScriptedSetup::new(vec![
                Err(SetupError::NotReady("robot offline".to_string())),
                Err(SetupError::NotReady("robot offline".to_string())),
            ]),
        );

        let entry = manager.add(robot_entry("romy-abc", "1.2.3.4")).await.unwrap();

        let first = manager.setup(&entry.entry_id).await;
        match first {
            Err(ConfigEntriesError::NotReady { retry_in, .. }) => {
                assert_eq!(retry_in.as_secs(), 5)
            }
            other => panic!("expected NotReady, got {:?}", other),
        }
        let stored = manager.get(&entry.entry_id).unwrap();
        assert_eq!(stored.state, ConfigEntryState::SetupRetry);
        assert_eq!(stored.reason.as_deref(), Some("robot offline"));
        assert_eq!(stored.tries, 1);

        let second = manager.setup(&entry.entry_id).await;
        assert!(matches!(
            second,
            Err(ConfigEntriesError::NotReady { retry_in, .. }) if retry_in.as_secs() == 10
        ));

        manager.setup(&entry.entry_id).await.unwrap();
        let stored = manager.get(&entry.entry_id).unwrap();
        assert!(stored.is_loaded());
        assert_eq!(stored.tries, 0);
    }

    #[tokio::test]
    async fn test_setup_failure() {
        let (_dir, manager) = create_test_manager();
        manager.register_setup_handler(
            "romy",
            ScriptedSetup::new(vec![Err(SetupError::Failed("bad data".to_string()))]),
        );

        let entry = manager.add(robot_entry("romy-abc", "1.2.3.4")).await.unwrap();
        let result = manager.setup(&entry.entry_id).await;

        assert!(matches!(result, Err(ConfigEntriesError::SetupFailed(_))));
        assert_eq!(
            manager.get(&entry.entry_id).unwrap().state,
            ConfigEntryState::SetupError
        );
    }

    #[tokio::test]
    async fn test_setup_twice_is_invalid() {
        let (_dir, manager) = create_test_manager();
        let entry = manager.add(robot_entry("romy-abc", "1.2.3.4")).await.unwrap();

        manager.setup(&entry.entry_id).await.unwrap();
        assert!(matches!(
            manager.setup(&entry.entry_id).await,
            Err(ConfigEntriesError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::new(temp_dir.path()));

        {
            let manager = ConfigEntries::new(storage.clone());
            manager
                .add(robot_entry("romy-abc", "1.2.3.4").with_source(ConfigEntrySource::Zeroconf))
                .await
                .unwrap();
        }

        {
            let manager = ConfigEntries::new(storage);
            manager.load().await.unwrap();

            assert_eq!(manager.len(), 1);
            let entry = manager.get_by_unique_id("romy", "romy-abc").unwrap();
            assert_eq!(entry.title, "myROMY");
            assert_eq!(entry.source, ConfigEntrySource::Zeroconf);
            assert_eq!(entry.state, ConfigEntryState::NotLoaded);
            assert_eq!(manager.get_by_domain("romy").len(), 1);
        }
    }
}
