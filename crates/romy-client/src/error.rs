//! Error types for device client operations

use thiserror::Error;

/// Result type for device client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors reported by a connected robot
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    /// The robot did not answer
    #[error("robot at {host} is unreachable")]
    Unreachable { host: String },

    /// The robot's local interface is locked
    #[error("robot at {host} is locked, password required")]
    Locked { host: String },

    /// The robot answered with an error status
    #[error("robot rejected '{command}': {reason}")]
    Rejected { command: String, reason: String },

    /// The robot answered with a body that could not be understood
    #[error("invalid response from robot: {0}")]
    InvalidResponse(String),
}
