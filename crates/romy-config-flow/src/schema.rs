//! Form schemas and validated form input
//!
//! Input is validated here, before any step runs, so a malformed
//! submission never reaches the robot.

use romy_core::{CONF_HOST, CONF_PASSWORD, PASSWORD_MIN_LENGTH};
use serde_json::Value;

use crate::error::FlowError;
use crate::result::FormField;

/// Schema of the `user` form
pub fn host_schema() -> Vec<FormField> {
    vec![FormField::required_string(CONF_HOST)]
}

/// Schema of the `password` form
pub fn password_schema() -> Vec<FormField> {
    vec![FormField::required_string(CONF_PASSWORD).with_min_length(PASSWORD_MIN_LENGTH)]
}

fn required_str(input: &Value, field: &str) -> Result<String, FlowError> {
    match input.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(FlowError::InvalidData {
            field: field.to_string(),
            reason: "expected a string".to_string(),
        }),
        None => Err(FlowError::InvalidData {
            field: field.to_string(),
            reason: "required key not provided".to_string(),
        }),
    }
}

/// A submitted `user` form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInput {
    host: String,
}

impl HostInput {
    pub fn new(host: impl Into<String>) -> Result<Self, FlowError> {
        let host = host.into().trim().to_string();
        if host.is_empty() {
            return Err(FlowError::InvalidData {
                field: CONF_HOST.to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(Self { host })
    }

    pub fn from_value(input: &Value) -> Result<Self, FlowError> {
        Self::new(required_str(input, CONF_HOST)?)
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

/// A submitted `password` form
///
/// Holding one proves the password meets the minimum length.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordInput {
    password: String,
}

impl PasswordInput {
    pub fn new(password: impl Into<String>) -> Result<Self, FlowError> {
        let password = password.into();
        if password.chars().count() < PASSWORD_MIN_LENGTH {
            return Err(FlowError::InvalidData {
                field: CONF_PASSWORD.to_string(),
                reason: format!("length of value must be at least {}", PASSWORD_MIN_LENGTH),
            });
        }
        Ok(Self { password })
    }

    pub fn from_value(input: &Value) -> Result<Self, FlowError> {
        Self::new(required_str(input, CONF_PASSWORD)?)
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl std::fmt::Debug for PasswordInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordInput").finish_non_exhaustive()
    }
}
