//! Config Entries
//!
//! This crate provides the persisted configuration registry of the ROMY
//! integration. A config entry represents one configured robot; the
//! registry guarantees at most one entry per `(domain, unique_id)` and
//! drives each entry through setup and unload.
//!
//! # Key Types
//!
//! - [`ConfigEntry`] - A single configured robot
//! - [`ConfigEntryState`] - Lifecycle state of an entry
//! - [`ConfigEntries`] - Manager for all config entries
//! - [`EntryStore`] - The narrow view the onboarding flow needs
//! - [`EntrySetup`] - Integration hook called on setup/unload
//!
//! # Storage
//!
//! Config entries are persisted in `.storage/core.config_entries`.

pub mod entry;
pub mod manager;
pub mod state_machine;

pub use entry::{ConfigEntry, ConfigEntrySource, ConfigEntryState, ConfigEntryUpdate};

pub use manager::{
    ConfigEntries, ConfigEntriesData, ConfigEntriesError, ConfigEntriesResult, EntrySetup,
    EntryStore, SetupError, STORAGE_KEY, STORAGE_MINOR_VERSION, STORAGE_VERSION,
};

pub use state_machine::{calculate_retry_delay, InvalidTransition};
