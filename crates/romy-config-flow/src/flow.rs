//! ROMY config flow steps
//!
//! Every step issues at most one connection attempt and re-queries the
//! robot instead of trusting anything learned in an earlier step. The
//! duplicate check always uses the unique id the robot reported, never the
//! one a discovery announcement advertised.

use std::collections::HashMap;
use std::sync::Arc;

use romy_client::{DeviceClient, ZeroconfServiceInfo};
use romy_config_entries::{ConfigEntriesError, ConfigEntry, EntryStore};
use romy_core::{CONF_HOST, CONF_PASSWORD, DOMAIN};
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use crate::error::FlowError;
use crate::schema::{HostInput, PasswordInput};
use crate::session::{FlowState, OnboardingSession, StepId};
use crate::{ERROR_CANNOT_CONNECT, ERROR_INVALID_AUTH};

/// Why a flow ended without creating an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// An entry for this robot exists (its host may have been updated)
    AlreadyConfigured,
    /// Another discovery flow is handling this robot
    AlreadyInProgress,
    /// A discovered robot did not answer
    CannotConnect,
    /// The entry store failed to persist the entry
    Unknown,
}

impl AbortReason {
    pub fn as_str(self) -> &'static str {
        match self {
            AbortReason::AlreadyConfigured => "already_configured",
            AbortReason::AlreadyInProgress => "already_in_progress",
            AbortReason::CannotConnect => "cannot_connect",
            AbortReason::Unknown => "unknown",
        }
    }
}

/// What the caller should see after a step
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Form {
        step_id: StepId,
        errors: HashMap<String, String>,
        description_placeholders: HashMap<String, String>,
    },
    CreateEntry {
        entry: ConfigEntry,
    },
    Abort {
        reason: AbortReason,
    },
}

/// A step's result: the session to continue with and what to show
#[derive(Debug, Clone)]
pub struct Transition {
    pub session: OnboardingSession,
    pub outcome: StepOutcome,
}

impl Transition {
    fn form(
        session: OnboardingSession,
        state: FlowState,
        errors: HashMap<String, String>,
        description_placeholders: HashMap<String, String>,
    ) -> Self {
        let step_id = match state.step_id() {
            Some(step_id) => step_id,
            None => return Self::abort(session, AbortReason::Unknown),
        };
        debug!("Flow for {} -> {:?}", session.host(), state);
        Self {
            session: session.with_state(state),
            outcome: StepOutcome::Form {
                step_id,
                errors,
                description_placeholders,
            },
        }
    }

    fn abort(session: OnboardingSession, reason: AbortReason) -> Self {
        info!("Flow for {} aborted: {}", session.host(), reason.as_str());
        Self {
            session: session.with_state(FlowState::Aborted),
            outcome: StepOutcome::Abort { reason },
        }
    }
}

fn field_error(field: &str, code: &str) -> HashMap<String, String> {
    HashMap::from([(field.to_string(), code.to_string())])
}

/// The onboarding steps for ROMY robots
pub struct RomyConfigFlow {
    client: Arc<dyn DeviceClient>,
    store: Arc<dyn EntryStore>,
}

impl RomyConfigFlow {
    /// Version of the entries this flow creates
    pub const VERSION: u32 = 1;

    pub fn new(client: Arc<dyn DeviceClient>, store: Arc<dyn EntryStore>) -> Self {
        Self { client, store }
    }

    /// Show the empty host form
    pub fn begin(&self) -> Transition {
        self.show_user_form(OnboardingSession::user(), HashMap::new())
    }

    /// Feed form input to whatever step the session is waiting in
    ///
    /// `None` re-displays the current form. Input failing schema validation
    /// is returned as [`FlowError::InvalidData`] without contacting the robot.
    pub async fn progress(
        &self,
        session: OnboardingSession,
        user_input: Option<Value>,
    ) -> Result<Transition, FlowError> {
        match (session.state(), user_input) {
            (FlowState::AwaitingHost, None) => Ok(self.show_user_form(session, HashMap::new())),
            (FlowState::AwaitingHost, Some(input)) => {
                let input = HostInput::from_value(&input)?;
                Ok(self.step_user(session, input).await)
            }
            (FlowState::AwaitingPassword, None) => {
                Ok(self.show_password_form(session, HashMap::new()))
            }
            (FlowState::AwaitingPassword, Some(input)) => {
                let input = PasswordInput::from_value(&input)?;
                Ok(self.step_password(session, input).await)
            }
            (FlowState::DiscoveryConfirm, input) => {
                Ok(self.step_zeroconf_confirm(session, input.is_some()).await)
            }
            (state, _) => Err(FlowError::NotAcceptingInput(state)),
        }
    }

    /// Host entered by the user
    #[instrument(skip(self, session), fields(host = %input.host()))]
    pub async fn step_user(&self, session: OnboardingSession, input: HostInput) -> Transition {
        let session = session.with_host(input.host());

        let robot = self.client.connect(session.host(), "").await;
        let connection = robot.connection();

        if !connection.initialized {
            warn!("Cannot connect to robot at {}", session.host());
            return self.show_user_form(session, field_error(CONF_HOST, ERROR_CANNOT_CONNECT));
        }

        let session = session.with_identity(&connection.unique_id, &connection.user_name);
        if let Some(unique_id) = session.unique_id() {
            if self.store.is_configured(DOMAIN, unique_id) {
                return Transition::abort(session, AbortReason::AlreadyConfigured);
            }
        }

        if !connection.unlocked {
            return self.show_password_form(session, HashMap::new());
        }
        self.finalize(session).await
    }

    /// Password submitted for a locked robot
    #[instrument(skip(self, session, input), fields(host = %session.host()))]
    pub async fn step_password(
        &self,
        session: OnboardingSession,
        input: PasswordInput,
    ) -> Transition {
        let robot = self.client.connect(session.host(), input.password()).await;
        let connection = robot.connection();

        if !connection.initialized {
            warn!("Robot at {} became unreachable", session.host());
            return self.show_user_form(session, field_error(CONF_HOST, ERROR_CANNOT_CONNECT));
        }
        if !connection.unlocked {
            return self.show_password_form(session, field_error(CONF_PASSWORD, ERROR_INVALID_AUTH));
        }

        self.finalize(session.with_password(input.password())).await
    }

    /// A robot announced itself on the local network
    #[instrument(skip(self, discovery_info), fields(host = %discovery_info.host))]
    pub async fn step_zeroconf(&self, discovery_info: &ZeroconfServiceInfo) -> Transition {
        debug!(
            "Zeroconf announcement {} (advertised id {:?})",
            discovery_info.name,
            discovery_info.advertised_id()
        );
        let session = OnboardingSession::discovery(&discovery_info.host);

        let robot = self.client.connect(session.host(), "").await;
        let connection = robot.connection();

        let session = session.with_identity(&connection.unique_id, &connection.user_name);
        if let Some(unique_id) = session.unique_id() {
            if self.store.is_configured(DOMAIN, unique_id) {
                match self.store.update_host(DOMAIN, unique_id, session.host()).await {
                    Ok(true) => info!("Updated host of {} to {}", unique_id, session.host()),
                    Ok(false) => {}
                    Err(e) => error!("Failed to update host of {}: {}", unique_id, e),
                }
                return Transition::abort(session, AbortReason::AlreadyConfigured);
            }
        }

        let title_placeholders = HashMap::from([(
            "name".to_string(),
            format!(
                "{} ({} / {})",
                connection.user_name,
                session.host(),
                connection.unique_id
            ),
        )]);
        let session =
            session.with_discovery_context(title_placeholders, connection.configuration_url());

        if !connection.initialized {
            return Transition::abort(session, AbortReason::CannotConnect);
        }
        if connection.unlocked {
            return self.show_confirm_form(session);
        }
        self.show_password_form(session, HashMap::new())
    }

    /// User looked at (or accepted) a discovered robot
    pub async fn step_zeroconf_confirm(
        &self,
        session: OnboardingSession,
        accepted: bool,
    ) -> Transition {
        if !accepted {
            return self.show_confirm_form(session);
        }
        self.finalize(session).await
    }

    /// Persist the entry
    async fn finalize(&self, session: OnboardingSession) -> Transition {
        let session = session.with_state(FlowState::Finalizing);
        let Some(unique_id) = session.unique_id().map(str::to_string) else {
            error!("Finalizing flow for {} without a unique id", session.host());
            return Transition::abort(session, AbortReason::Unknown);
        };

        let entry = ConfigEntry::new(DOMAIN, session.display_name())
            .with_credentials(session.host(), session.password())
            .with_unique_id(&unique_id)
            .with_source(session.source());

        match self.store.create(entry).await {
            Ok(entry) => {
                info!("Created entry {} for {}", entry.title, unique_id);
                Transition {
                    session: session.with_state(FlowState::Complete),
                    outcome: StepOutcome::CreateEntry { entry },
                }
            }
            Err(ConfigEntriesError::AlreadyExists { .. }) => {
                Transition::abort(session, AbortReason::AlreadyConfigured)
            }
            Err(e) => {
                error!("Failed to store entry for {}: {}", unique_id, e);
                Transition::abort(session, AbortReason::Unknown)
            }
        }
    }

    fn show_user_form(
        &self,
        session: OnboardingSession,
        errors: HashMap<String, String>,
    ) -> Transition {
        Transition::form(session, FlowState::AwaitingHost, errors, HashMap::new())
    }

    fn show_password_form(
        &self,
        session: OnboardingSession,
        errors: HashMap<String, String>,
    ) -> Transition {
        Transition::form(session, FlowState::AwaitingPassword, errors, HashMap::new())
    }

    fn show_confirm_form(&self, session: OnboardingSession) -> Transition {
        let placeholders = HashMap::from([
            ("name".to_string(), session.display_name().to_string()),
            ("host".to_string(), session.host().to_string()),
        ]);
        Transition::form(session, FlowState::DiscoveryConfirm, HashMap::new(), placeholders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use romy_client::mock::{MockDeviceClient, MockRobot};
    use romy_config_entries::ConfigEntriesResult;
    use std::sync::Mutex;

    /// In-memory store recording every call
    #[derive(Default)]
    struct MemoryStore {
        entries: Mutex<Vec<ConfigEntry>>,
        fail_writes: bool,
    }

    #[async_trait::async_trait]
    impl EntryStore for MemoryStore {
        fn is_configured(&self, domain: &str, unique_id: &str) -> bool {
            self.entries
                .lock()
                .unwrap()
                .iter()
                .any(|e| e.domain == domain && e.unique_id.as_deref() == Some(unique_id))
        }

        async fn update_host(
            &self,
            _domain: &str,
            unique_id: &str,
            host: &str,
        ) -> ConfigEntriesResult<bool> {
            let mut entries = self.entries.lock().unwrap();
            let entry = entries
                .iter_mut()
                .find(|e| e.unique_id.as_deref() == Some(unique_id));
            Ok(match entry {
                Some(entry) => {
                    entry.data.insert(CONF_HOST.to_string(), Value::String(host.to_string()));
                    true
                }
                None => false,
            })
        }

        async fn create(&self, entry: ConfigEntry) -> ConfigEntriesResult<ConfigEntry> {
            if self.fail_writes {
                return Err(ConfigEntriesError::SetupFailed("disk full".to_string()));
            }
            self.entries.lock().unwrap().push(entry.clone());
            Ok(entry)
        }
    }

    fn flow(client: &Arc<MockDeviceClient>, store: &Arc<MemoryStore>) -> RomyConfigFlow {
        RomyConfigFlow::new(client.clone(), store.clone())
    }

    #[tokio::test]
    async fn test_finalizing_without_unique_id_aborts() {
        let client = Arc::new(MockDeviceClient::new());
        let store = Arc::new(MemoryStore::default());

        let transition = flow(&client, &store)
            .step_zeroconf_confirm(OnboardingSession::user().with_host("1.2.3.4"), true)
            .await;

        assert_eq!(
            transition.outcome,
            StepOutcome::Abort {
                reason: AbortReason::Unknown
            }
        );
        assert!(store.entries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_robot_without_id_never_stored() {
        let client = Arc::new(MockDeviceClient::new());
        client.add_robot("1.2.3.4", MockRobot::new("", "myROMY"));
        let store = Arc::new(MemoryStore::default());
        let flow = flow(&client, &store);
        let unknown = StepOutcome::Abort {
            reason: AbortReason::Unknown,
        };

        let manual = flow
            .step_user(OnboardingSession::user(), HostInput::new("1.2.3.4").unwrap())
            .await;
        assert_eq!(manual.session.unique_id(), None);
        assert_eq!(manual.outcome, unknown);

        let discovered = flow
            .step_zeroconf(&ZeroconfServiceInfo {
                host: "1.2.3.4".to_string(),
                hostname: "myROMY.local.".to_string(),
                port: 8080,
                service_type: "_aicu-http._tcp.local.".to_string(),
                name: "myROMY._aicu-http._tcp.local.".to_string(),
                properties: HashMap::new(),
            })
            .await;
        assert_eq!(discovered.session.state(), FlowState::DiscoveryConfirm);
        let confirmed = flow.step_zeroconf_confirm(discovered.session, true).await;
        assert_eq!(confirmed.outcome, unknown);

        assert!(store.entries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_aborts_unknown() {
        let client = Arc::new(MockDeviceClient::new());
        client.add_robot("1.2.3.4", MockRobot::new("romy-abc", "myROMY"));
        let store = Arc::new(MemoryStore {
            fail_writes: true,
            ..Default::default()
        });

        let transition = flow(&client, &store)
            .step_user(OnboardingSession::user(), HostInput::new("1.2.3.4").unwrap())
            .await;

        assert_eq!(transition.session.state(), FlowState::Aborted);
        assert_eq!(
            transition.outcome,
            StepOutcome::Abort {
                reason: AbortReason::Unknown
            }
        );
    }

    #[tokio::test]
    async fn test_password_failure_does_not_keep_password() {
        let client = Arc::new(MockDeviceClient::new());
        client.add_robot(
            "1.2.3.4",
            MockRobot::new("romy-abc", "myROMY").with_password("password"),
        );
        let store = Arc::new(MemoryStore::default());
        let flow = flow(&client, &store);

        let locked = flow
            .step_user(OnboardingSession::user(), HostInput::new("1.2.3.4").unwrap())
            .await;
        assert_eq!(locked.session.state(), FlowState::AwaitingPassword);

        let rejected = flow
            .step_password(locked.session, PasswordInput::new("wrongpass").unwrap())
            .await;
        assert_eq!(rejected.session.state(), FlowState::AwaitingPassword);
        assert_eq!(rejected.session.password(), "");
        assert_eq!(
            rejected.outcome,
            StepOutcome::Form {
                step_id: StepId::Password,
                errors: field_error("password", "invalid_auth"),
                description_placeholders: HashMap::new(),
            }
        );
    }

    #[tokio::test]
    async fn test_progress_rejects_input_in_terminal_state() {
        let client = Arc::new(MockDeviceClient::new());
        let store = Arc::new(MemoryStore::default());

        let result = flow(&client, &store)
            .progress(
                OnboardingSession::user().with_state(FlowState::Complete),
                None,
            )
            .await;

        assert!(matches!(
            result,
            Err(FlowError::NotAcceptingInput(FlowState::Complete))
        ));
    }
}
