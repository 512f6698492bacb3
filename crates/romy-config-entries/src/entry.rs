//! Config Entry types
//!
//! A ConfigEntry is the persisted record of one configured robot.

use chrono::{DateTime, Utc};
use romy_core::{CONF_HOST, CONF_PASSWORD};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::state_machine::InvalidTransition;

/// Config entry lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConfigEntryState {
    /// Initial state, not yet set up
    #[default]
    NotLoaded,
    /// Currently being set up
    SetupInProgress,
    /// Successfully set up
    Loaded,
    /// Setup failed
    SetupError,
    /// Robot was not ready, waiting to retry setup
    SetupRetry,
    /// Currently unloading
    UnloadInProgress,
    /// Unload failed (not recoverable)
    FailedUnload,
}

impl ConfigEntryState {
    /// Check if the entry can be unloaded/reloaded from this state
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ConfigEntryState::Loaded
                | ConfigEntryState::SetupError
                | ConfigEntryState::SetupRetry
                | ConfigEntryState::NotLoaded
        )
    }
}

/// How the entry came to be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConfigEntrySource {
    /// Host entered by the user
    #[default]
    User,
    /// Robot announced itself via mDNS
    Zeroconf,
}

/// A configuration entry for one robot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
    /// Unique identifier (ULID)
    pub entry_id: String,

    /// Integration domain
    pub domain: String,

    /// Human-readable display name (the robot's name at creation time)
    pub title: String,

    /// Configuration data: `host` and `password`
    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,

    /// User-configurable options
    #[serde(default)]
    pub options: HashMap<String, serde_json::Value>,

    #[serde(default = "default_version")]
    pub version: u32,

    /// The robot's serial, used for duplicate prevention
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<String>,

    #[serde(default)]
    pub source: ConfigEntrySource,

    /// Current lifecycle state (not persisted)
    #[serde(skip, default)]
    pub state: ConfigEntryState,

    /// Human-readable explanation for failed states
    #[serde(skip, default)]
    pub reason: Option<String>,

    /// Number of setup retry attempts (not persisted)
    #[serde(skip, default)]
    pub tries: u32,

    /// Disable background polling
    #[serde(default)]
    pub pref_disable_polling: bool,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub modified_at: DateTime<Utc>,
}

fn default_version() -> u32 {
    1
}

impl ConfigEntry {
    /// Create a new config entry
    pub fn new(domain: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            entry_id: ulid::Ulid::new().to_string(),
            domain: domain.into(),
            title: title.into(),
            data: HashMap::new(),
            options: HashMap::new(),
            version: 1,
            unique_id: None,
            source: ConfigEntrySource::User,
            state: ConfigEntryState::NotLoaded,
            reason: None,
            tries: 0,
            pref_disable_polling: false,
            created_at: now,
            modified_at: now,
        }
    }

    pub fn with_data(mut self, data: HashMap<String, serde_json::Value>) -> Self {
        self.data = data;
        self
    }

    /// Set the `host` and `password` data keys
    pub fn with_credentials(mut self, host: impl Into<String>, password: impl Into<String>) -> Self {
        self.data
            .insert(CONF_HOST.to_string(), serde_json::Value::String(host.into()));
        self.data.insert(
            CONF_PASSWORD.to_string(),
            serde_json::Value::String(password.into()),
        );
        self
    }

    pub fn with_unique_id(mut self, unique_id: impl Into<String>) -> Self {
        self.unique_id = Some(unique_id.into());
        self
    }

    pub fn with_source(mut self, source: ConfigEntrySource) -> Self {
        self.source = source;
        self
    }

    /// The robot's host, if present in the entry data
    pub fn host(&self) -> Option<&str> {
        self.data.get(CONF_HOST).and_then(|v| v.as_str())
    }

    /// The local interface password; entries without one use an empty password
    pub fn password(&self) -> &str {
        self.data
            .get(CONF_PASSWORD)
            .and_then(|v| v.as_str())
            .unwrap_or("")
    }

    pub fn is_loaded(&self) -> bool {
        self.state == ConfigEntryState::Loaded
    }

    /// Attempt to transition to a new state with validation.
    pub fn try_set_state(
        &mut self,
        new_state: ConfigEntryState,
        reason: Option<String>,
    ) -> Result<(), InvalidTransition> {
        self.state.try_transition(new_state)?;

        self.state = new_state;
        self.reason = reason;

        if !matches!(
            new_state,
            ConfigEntryState::SetupRetry | ConfigEntryState::SetupInProgress
        ) {
            self.tries = 0;
        }

        Ok(())
    }

    /// Increment the retry counter and return the new count
    pub fn increment_tries(&mut self) -> u32 {
        self.tries += 1;
        self.tries
    }
}

/// Update data for a config entry
#[derive(Debug, Default)]
pub struct ConfigEntryUpdate {
    pub title: Option<String>,
    pub data: Option<HashMap<String, serde_json::Value>>,
    pub options: Option<HashMap<String, serde_json::Value>>,
    pub pref_disable_polling: Option<bool>,
}

impl ConfigEntryUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn data(mut self, data: HashMap<String, serde_json::Value>) -> Self {
        self.data = Some(data);
        self
    }

    pub fn options(mut self, options: HashMap<String, serde_json::Value>) -> Self {
        self.options = Some(options);
        self
    }

    pub fn pref_disable_polling(mut self, disable: bool) -> Self {
        self.pref_disable_polling = Some(disable);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_entry_new() {
        let entry = ConfigEntry::new("romy", "myROMY");
        assert_eq!(entry.domain, "romy");
        assert_eq!(entry.title, "myROMY");
        assert_eq!(entry.state, ConfigEntryState::NotLoaded);
        assert_eq!(entry.version, 1);
        assert!(!entry.entry_id.is_empty());
    }

    #[test]
    fn test_credentials() {
        let entry = ConfigEntry::new("romy", "myROMY")
            .with_credentials("1.2.3.4", "password")
            .with_unique_id("romy-abc")
            .with_source(ConfigEntrySource::Zeroconf);

        assert_eq!(entry.host(), Some("1.2.3.4"));
        assert_eq!(entry.password(), "password");
        assert_eq!(entry.unique_id.as_deref(), Some("romy-abc"));
        assert_eq!(entry.source, ConfigEntrySource::Zeroconf);
    }

    #[test]
    fn test_missing_password_is_empty() {
        let mut data = HashMap::new();
        data.insert("host".to_string(), serde_json::json!("1.2.3.4"));
        let entry = ConfigEntry::new("romy", "myROMY").with_data(data);

        assert_eq!(entry.password(), "");
    }

    #[test]
    fn test_state_recoverable() {
        assert!(ConfigEntryState::NotLoaded.is_recoverable());
        assert!(ConfigEntryState::Loaded.is_recoverable());
        assert!(ConfigEntryState::SetupRetry.is_recoverable());
        assert!(!ConfigEntryState::SetupInProgress.is_recoverable());
        assert!(!ConfigEntryState::FailedUnload.is_recoverable());
    }

    #[test]
    fn test_serde_skips_runtime_state() {
        let mut entry = ConfigEntry::new("romy", "myROMY").with_credentials("1.2.3.4", "");
        entry.state = ConfigEntryState::Loaded;
        entry.tries = 3;

        let json = serde_json::to_string(&entry).unwrap();
        let parsed: ConfigEntry = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.state, ConfigEntryState::NotLoaded);
        assert_eq!(parsed.tries, 0);
        assert_eq!(parsed.host(), Some("1.2.3.4"));
        assert_eq!(parsed.source, ConfigEntrySource::User);
    }
}
