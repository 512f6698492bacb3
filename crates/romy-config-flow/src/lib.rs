//! Device onboarding for the ROMY integration
//!
//! Drives a robot from "unknown host, unknown lock state" to one persisted
//! config entry. Two entry points exist: a user typing in a host, and a
//! zeroconf announcement. Both converge on the same password and finalize
//! steps.
//!
//! # Key Types
//!
//! - [`OnboardingSession`] - Per-flow data, replaced (never mutated) by every step
//! - [`RomyConfigFlow`] - The step functions
//! - [`FlowManager`] - Tracks concurrent flows and renders [`FlowResult`]s
//!
//! # Example
//!
//! ```ignore
//! let manager = FlowManager::new(RomyConfigFlow::new(client, entries));
//!
//! let form = manager.start_flow(DOMAIN).await?;
//! let result = manager
//!     .progress_flow(&form.flow_id, Some(json!({"host": "192.168.0.10"})))
//!     .await?;
//! ```

mod error;
mod flow;
mod manager;
mod result;
mod schema;
mod session;

pub use error::FlowError;
pub use flow::{AbortReason, RomyConfigFlow, StepOutcome, Transition};
pub use manager::{ConfigFlowHandler, FlowManager};
pub use result::{FlowResult, FlowResultType, FormField};
pub use schema::{host_schema, password_schema, HostInput, PasswordInput};
pub use session::{FlowState, OnboardingSession, StepId};

/// Form field error: the robot could not be reached or did not initialize
pub const ERROR_CANNOT_CONNECT: &str = "cannot_connect";

/// Form field error: the robot rejected the password
pub const ERROR_INVALID_AUTH: &str = "invalid_auth";
