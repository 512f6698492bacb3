//! Rendered flow results
//!
//! What a frontend needs to show the current step of a flow.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowResultType {
    Form,
    CreateEntry,
    Abort,
}

/// Result of a config flow step
#[derive(Debug, Clone, Serialize)]
pub struct FlowResult {
    pub flow_id: String,
    /// Handler (integration domain)
    pub handler: String,
    #[serde(rename = "type")]
    pub result_type: FlowResultType,
    /// Current step ID (for form type)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    /// Always present, empty if the form has no inputs
    pub data_schema: Vec<FormField>,
    /// Errors from the previous submission, keyed by field (null if none)
    pub errors: Option<HashMap<String, String>>,
    pub description_placeholders: Option<HashMap<String, String>>,
    /// Title (for create_entry type)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Abort reason (for abort type)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Version (for create_entry)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    /// Entry data (for create_entry)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<HashMap<String, Value>>,
    /// The created config entry (for create_entry)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl FlowResult {
    fn base(flow_id: &str, handler: &str, result_type: FlowResultType) -> Self {
        Self {
            flow_id: flow_id.to_string(),
            handler: handler.to_string(),
            result_type,
            step_id: None,
            data_schema: Vec::new(),
            errors: None,
            description_placeholders: None,
            title: None,
            reason: None,
            version: None,
            data: None,
            result: None,
        }
    }

    pub fn form(
        flow_id: &str,
        handler: &str,
        step_id: &str,
        data_schema: Vec<FormField>,
        errors: HashMap<String, String>,
        description_placeholders: HashMap<String, String>,
    ) -> Self {
        Self {
            step_id: Some(step_id.to_string()),
            data_schema,
            errors: (!errors.is_empty()).then_some(errors),
            description_placeholders: (!description_placeholders.is_empty())
                .then_some(description_placeholders),
            ..Self::base(flow_id, handler, FlowResultType::Form)
        }
    }

    pub fn create_entry(
        flow_id: &str,
        handler: &str,
        title: &str,
        version: u32,
        data: HashMap<String, Value>,
        result: Option<Value>,
    ) -> Self {
        Self {
            title: Some(title.to_string()),
            version: Some(version),
            data: Some(data),
            result,
            ..Self::base(flow_id, handler, FlowResultType::CreateEntry)
        }
    }

    pub fn abort(flow_id: &str, handler: &str, reason: &str) -> Self {
        Self {
            reason: Some(reason.to_string()),
            ..Self::base(flow_id, handler, FlowResultType::Abort)
        }
    }

    /// Error code reported for `field`, if any
    pub fn error(&self, field: &str) -> Option<&str> {
        self.errors.as_ref()?.get(field).map(String::as_str)
    }

    /// Id of the config entry a create_entry result produced
    pub fn entry_id(&self) -> Option<&str> {
        self.result.as_ref()?.get("entry_id")?.as_str()
    }
}

/// Form field schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
}

impl FormField {
    pub fn required_string(name: &str) -> Self {
        Self {
            name: name.to_string(),
            field_type: "string".to_string(),
            required: Some(true),
            min_length: None,
        }
    }

    pub fn with_min_length(self, min_length: usize) -> Self {
        Self {
            min_length: Some(min_length),
            ..self
        }
    }
}
