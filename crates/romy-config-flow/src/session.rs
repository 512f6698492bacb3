//! Onboarding session
//!
//! A session is a plain value. Steps take it by value and hand back a new
//! one, so nothing a step learns leaks into another flow or survives an
//! abort.

use std::collections::HashMap;

use romy_config_entries::ConfigEntrySource;
use serde::Serialize;

/// Where a flow currently stands
///
/// ```text
/// AwaitingHost ──────────────┬──> AwaitingPassword ──> Finalizing ──> Complete
/// DiscoveryPending ─> DiscoveryConfirm ───────────────────┘
///                  └────────────┘
/// any state ──> Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    #[default]
    AwaitingHost,
    AwaitingPassword,
    DiscoveryPending,
    DiscoveryConfirm,
    Finalizing,
    Complete,
    Aborted,
}

impl FlowState {
    /// The form shown to the user while in this state
    pub fn step_id(self) -> Option<StepId> {
        match self {
            FlowState::AwaitingHost => Some(StepId::User),
            FlowState::AwaitingPassword => Some(StepId::Password),
            FlowState::DiscoveryConfirm => Some(StepId::ZeroconfConfirm),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, FlowState::Complete | FlowState::Aborted)
    }
}

/// Form identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepId {
    User,
    Password,
    ZeroconfConfirm,
}

impl StepId {
    pub fn as_str(self) -> &'static str {
        match self {
            StepId::User => "user",
            StepId::Password => "password",
            StepId::ZeroconfConfirm => "zeroconf_confirm",
        }
    }
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything one onboarding attempt has learned so far
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OnboardingSession {
    state: FlowState,
    source: ConfigEntrySource,
    host: String,
    password: String,
    display_name: String,
    unique_id: Option<String>,
    title_placeholders: HashMap<String, String>,
    configuration_url: Option<String>,
}

impl OnboardingSession {
    /// A session started by the user, waiting for a host
    pub fn user() -> Self {
        Self::default()
    }

    /// A session started by a discovery announcement for `host`
    pub fn discovery(host: impl Into<String>) -> Self {
        Self {
            state: FlowState::DiscoveryPending,
            source: ConfigEntrySource::Zeroconf,
            host: host.into(),
            ..Self::default()
        }
    }

    pub fn with_state(self, state: FlowState) -> Self {
        Self { state, ..self }
    }

    pub fn with_host(self, host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..self
        }
    }

    pub fn with_password(self, password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
            ..self
        }
    }

    /// Record the identity the robot itself reported
    ///
    /// An empty unique id leaves the session without one.
    pub fn with_identity(self, unique_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        let unique_id = unique_id.into();
        Self {
            unique_id: (!unique_id.is_empty()).then_some(unique_id),
            display_name: display_name.into(),
            ..self
        }
    }

    /// Record what discovery shows in the list of discovered devices
    pub fn with_discovery_context(
        self,
        title_placeholders: HashMap<String, String>,
        configuration_url: impl Into<String>,
    ) -> Self {
        Self {
            title_placeholders,
            configuration_url: Some(configuration_url.into()),
            ..self
        }
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn source(&self) -> ConfigEntrySource {
        self.source
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Password to store; empty unless the robot was unlocked with one
    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn unique_id(&self) -> Option<&str> {
        self.unique_id.as_deref()
    }

    pub fn title_placeholders(&self) -> &HashMap<String, String> {
        &self.title_placeholders
    }

    pub fn configuration_url(&self) -> Option<&str> {
        self.configuration_url.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_return_new_values() {
        let start = OnboardingSession::user();
        let next = start.clone().with_host("1.2.3.4");

        assert_eq!(start.host(), "");
        assert_eq!(next.host(), "1.2.3.4");
        assert_eq!(next.password(), "");
        assert_eq!(next.unique_id(), None);
    }

    #[test]
    fn test_discovery_session() {
        let session = OnboardingSession::discovery("1.2.3.4").with_identity("romy-abc", "myROMY");

        assert_eq!(session.state(), FlowState::DiscoveryPending);
        assert_eq!(session.source(), ConfigEntrySource::Zeroconf);
        assert_eq!(session.unique_id(), Some("romy-abc"));
        assert_eq!(session.display_name(), "myROMY");
    }

    #[test]
    fn test_empty_identity_has_no_unique_id() {
        let session = OnboardingSession::user().with_identity("", "myROMY");

        assert_eq!(session.unique_id(), None);
        assert_eq!(session.display_name(), "myROMY");
    }

    #[test]
    fn test_step_ids() {
        assert_eq!(FlowState::AwaitingHost.step_id(), Some(StepId::User));
        assert_eq!(
            FlowState::AwaitingPassword.step_id().map(StepId::as_str),
            Some("password")
        );
        assert_eq!(
            FlowState::DiscoveryConfirm.step_id().map(|s| s.to_string()),
            Some("zeroconf_confirm".to_string())
        );
        assert_eq!(FlowState::Finalizing.step_id(), None);
        assert!(FlowState::Aborted.is_terminal());
        assert!(!FlowState::DiscoveryPending.is_terminal());
    }
}
