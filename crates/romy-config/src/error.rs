//! Error types for settings loading

use std::path::PathBuf;
use thiserror::Error;

/// Result type for settings operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while loading settings
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a file
    #[error("cannot read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse YAML
    #[error("{path} is not valid YAML: {source}")]
    ParseYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("bad value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    /// Settings parsed but failed validation
    #[error("invalid settings: {message}")]
    ValidationFailed { message: String },
}
