//! Flow errors
//!
//! Only caller mistakes end up here. Anything the user can correct by
//! retyping, and anything the robot reports, becomes a form error or an
//! abort inside a [`crate::FlowResult`].

use thiserror::Error;

use crate::session::FlowState;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FlowError {
    #[error("Flow not found: {0}")]
    UnknownFlow(String),

    #[error("No config flow for handler: {0}")]
    UnknownHandler(String),

    /// Input failed schema validation; the flow stays where it was
    #[error("invalid value for '{field}': {reason}")]
    InvalidData { field: String, reason: String },

    /// The flow is in a state that does not take input
    #[error("flow in state {0:?} does not accept input")]
    NotAcceptingInput(FlowState),
}
