//! Error types for the ROMY integration

use romy_config::ConfigError;
use romy_config_entries::ConfigEntriesError;
use romy_registries::StorageError;
use thiserror::Error;

/// Result type for hub operations
pub type HubResult<T> = Result<T, HubError>;

/// Errors starting or operating the hub
#[derive(Debug, Error)]
pub enum HubError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    ConfigEntries(#[from] ConfigEntriesError),
}
