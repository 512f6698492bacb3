//! Flow manager
//!
//! Tracks the flows in progress. Each flow owns its session exclusively;
//! input for one flow is processed one submission at a time, while
//! different flows run concurrently.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use romy_client::ZeroconfServiceInfo;
use romy_config_entries::ConfigEntrySource;
use romy_core::DOMAIN;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info};
use ulid::Ulid;

use crate::error::FlowError;
use crate::flow::{AbortReason, RomyConfigFlow, StepOutcome, Transition};
use crate::result::FlowResult;
use crate::schema::{host_schema, password_schema};
use crate::session::{FlowState, OnboardingSession, StepId};

/// Trait for handling configuration flows
#[async_trait]
pub trait ConfigFlowHandler: Send + Sync {
    /// Start a new user-initiated flow for an integration
    async fn start_flow(&self, handler: &str) -> Result<FlowResult, FlowError>;

    /// Continue a flow with user input
    async fn progress_flow(
        &self,
        flow_id: &str,
        user_input: Option<Value>,
    ) -> Result<FlowResult, FlowError>;

    /// Get list of active flows
    async fn list_flows(&self) -> Vec<Value>;
}

type ActiveFlow = Arc<Mutex<OnboardingSession>>;

/// Manages active ROMY onboarding flows
pub struct FlowManager {
    flow: RomyConfigFlow,
    /// Active flows: flow_id -> session
    flows: DashMap<String, ActiveFlow>,
    /// Discovery flows by robot: unique_id -> flow_id
    discovering: DashMap<String, String>,
}

impl FlowManager {
    pub fn new(flow: RomyConfigFlow) -> Self {
        Self {
            flow,
            flows: DashMap::new(),
            discovering: DashMap::new(),
        }
    }

    fn new_flow_id() -> String {
        Ulid::new().to_string().to_lowercase()
    }

    /// Start a flow for a discovery announcement
    ///
    /// The robot is queried right away. If another discovery flow already
    /// handles the same robot the new one aborts with `already_in_progress`.
    pub async fn start_discovery_flow(
        &self,
        discovery_info: &ZeroconfServiceInfo,
    ) -> Result<FlowResult, FlowError> {
        let flow_id = Self::new_flow_id();
        info!(
            "Starting discovery flow {} for {}",
            flow_id, discovery_info.host
        );

        let transition = self.flow.step_zeroconf(discovery_info).await;
        if transition.session.state().is_terminal() {
            return Ok(self.render(&flow_id, &transition));
        }

        if let Some(unique_id) = transition.session.unique_id() {
            match self.discovering.entry(unique_id.to_string()) {
                Entry::Occupied(existing) => {
                    debug!(
                        "Robot {} already being discovered by flow {}",
                        unique_id,
                        existing.get()
                    );
                    return Ok(FlowResult::abort(
                        &flow_id,
                        DOMAIN,
                        AbortReason::AlreadyInProgress.as_str(),
                    ));
                }
                Entry::Vacant(slot) => {
                    slot.insert(flow_id.clone());
                }
            }
        }

        let result = self.render(&flow_id, &transition);
        self.flows
            .insert(flow_id, Arc::new(Mutex::new(transition.session)));
        Ok(result)
    }

    /// Drop a flow without finishing it
    pub fn abort_flow(&self, flow_id: &str) -> Result<(), FlowError> {
        self.flows
            .remove(flow_id)
            .ok_or_else(|| FlowError::UnknownFlow(flow_id.to_string()))?;
        self.discovering.retain(|_, id| id != flow_id);
        info!("Flow {} aborted", flow_id);
        Ok(())
    }

    /// Current state of a flow in progress
    pub async fn flow_state(&self, flow_id: &str) -> Option<FlowState> {
        let flow = self.flows.get(flow_id).map(|f| f.value().clone())?;
        let session = flow.lock().await;
        Some(session.state())
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    fn finish_flow(&self, flow_id: &str, transition: &Transition) {
        self.flows.remove(flow_id);
        self.discovering.retain(|_, id| id != flow_id);

        // A robot that just got its entry needs no further discovery flow
        if let (StepOutcome::CreateEntry { .. }, Some(unique_id)) =
            (&transition.outcome, transition.session.unique_id())
        {
            if let Some((_, other)) = self.discovering.remove(unique_id) {
                self.flows.remove(&other);
                debug!(
                    "Dropped discovery flow {} for configured robot {}",
                    other, unique_id
                );
            }
        }
    }

    fn render(&self, flow_id: &str, transition: &Transition) -> FlowResult {
        match &transition.outcome {
            StepOutcome::Form {
                step_id,
                errors,
                description_placeholders,
            } => {
                let schema = match step_id {
                    StepId::User => host_schema(),
                    StepId::Password => password_schema(),
                    StepId::ZeroconfConfirm => Vec::new(),
                };
                FlowResult::form(
                    flow_id,
                    DOMAIN,
                    step_id.as_str(),
                    schema,
                    errors.clone(),
                    description_placeholders.clone(),
                )
            }
            StepOutcome::CreateEntry { entry } => FlowResult::create_entry(
                flow_id,
                DOMAIN,
                &entry.title,
                entry.version,
                entry.data.clone(),
                serde_json::to_value(entry).ok(),
            ),
            StepOutcome::Abort { reason } => FlowResult::abort(flow_id, DOMAIN, reason.as_str()),
        }
    }
}

fn source_str(source: ConfigEntrySource) -> &'static str {
    match source {
        ConfigEntrySource::User => "user",
        ConfigEntrySource::Zeroconf => "zeroconf",
    }
}

#[async_trait]
impl ConfigFlowHandler for FlowManager {
    async fn start_flow(&self, handler: &str) -> Result<FlowResult, FlowError> {
        if handler != DOMAIN {
            return Err(FlowError::UnknownHandler(handler.to_string()));
        }

        let flow_id = Self::new_flow_id();
        info!("Starting config flow for {} with flow_id {}", handler, flow_id);

        let transition = self.flow.begin();
        let result = self.render(&flow_id, &transition);
        self.flows
            .insert(flow_id, Arc::new(Mutex::new(transition.session)));
        Ok(result)
    }

    async fn progress_flow(
        &self,
        flow_id: &str,
        user_input: Option<Value>,
    ) -> Result<FlowResult, FlowError> {
        let flow = self
            .flows
            .get(flow_id)
            .map(|f| f.value().clone())
            .ok_or_else(|| FlowError::UnknownFlow(flow_id.to_string()))?;

        let mut session = flow.lock().await;
        // Aborted while waiting for a previous submission
        if !self.flows.contains_key(flow_id) {
            return Err(FlowError::UnknownFlow(flow_id.to_string()));
        }

        debug!("Progressing flow {} in state {:?}", flow_id, session.state());
        let transition = self.flow.progress(session.clone(), user_input).await?;
        let result = self.render(flow_id, &transition);

        if transition.session.state().is_terminal() {
            self.finish_flow(flow_id, &transition);
            info!(
                "Flow {} completed with result type: {:?}",
                flow_id, result.result_type
            );
        } else {
            *session = transition.session;
        }

        Ok(result)
    }

    async fn list_flows(&self) -> Vec<Value> {
        let flows: Vec<(String, ActiveFlow)> = self
            .flows
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();

        let mut listed = Vec::with_capacity(flows.len());
        for (flow_id, flow) in flows {
            let session = flow.lock().await;
            listed.push(json!({
                "flow_id": flow_id,
                "handler": DOMAIN,
                "step_id": session.state().step_id().map(StepId::as_str),
                "context": {
                    "source": source_str(session.source()),
                    "unique_id": session.unique_id(),
                    "title_placeholders": session.title_placeholders(),
                    "configuration_url": session.configuration_url(),
                }
            }));
        }
        listed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use romy_client::mock::{MockDeviceClient, MockRobot};
    use romy_config_entries::ConfigEntries;
    use romy_registries::Storage;
    use tempfile::TempDir;

    fn manager(client: Arc<MockDeviceClient>) -> (TempDir, FlowManager) {
        let dir = TempDir::new().unwrap();
        let entries = ConfigEntries::new(Arc::new(Storage::new(dir.path())));
        (dir, FlowManager::new(RomyConfigFlow::new(client, entries)))
    }

    fn announcement(host: &str) -> ZeroconfServiceInfo {
        ZeroconfServiceInfo {
            host: host.to_string(),
            hostname: "myROMY.local.".to_string(),
            port: 8080,
            service_type: "_aicu-http._tcp.local.".to_string(),
            name: "myROMY._aicu-http._tcp.local.".to_string(),
            properties: HashMap::from([("id".to_string(), "aicu-xyz".to_string())]),
        }
    }

    #[tokio::test]
    async fn test_unknown_handler() {
        let (_dir, manager) = manager(Arc::new(MockDeviceClient::new()));
        assert_eq!(
            manager.start_flow("hue").await.unwrap_err(),
            FlowError::UnknownHandler("hue".to_string())
        );
    }

    #[tokio::test]
    async fn test_unknown_flow() {
        let (_dir, manager) = manager(Arc::new(MockDeviceClient::new()));
        assert!(matches!(
            manager.progress_flow("nope", None).await,
            Err(FlowError::UnknownFlow(_))
        ));
        assert!(manager.abort_flow("nope").is_err());
    }

    #[tokio::test]
    async fn test_abort_flow_drops_session() {
        let (_dir, manager) = manager(Arc::new(MockDeviceClient::new()));
        let form = manager.start_flow(DOMAIN).await.unwrap();
        assert_eq!(manager.len(), 1);

        manager.abort_flow(&form.flow_id).unwrap();
        assert!(manager.is_empty());
        assert!(matches!(
            manager.progress_flow(&form.flow_id, None).await,
            Err(FlowError::UnknownFlow(_))
        ));
    }

    #[tokio::test]
    async fn test_list_flows_shows_discovery_context() {
        let client = Arc::new(MockDeviceClient::new());
        client.add_robot("1.2.3.4", MockRobot::new("romy-real-id", "myROMY"));
        let (_dir, manager) = manager(client);

        let form = manager
            .start_discovery_flow(&announcement("1.2.3.4"))
            .await
            .unwrap();

        let flows = manager.list_flows().await;
        assert_eq!(flows.len(), 1);
        let flow = &flows[0];
        assert_eq!(flow["flow_id"], form.flow_id.as_str());
        assert_eq!(flow["step_id"], "zeroconf_confirm");
        assert_eq!(flow["context"]["source"], "zeroconf");
        assert_eq!(flow["context"]["unique_id"], "romy-real-id");
        assert_eq!(
            flow["context"]["title_placeholders"]["name"],
            "myROMY (1.2.3.4 / romy-real-id)"
        );
        assert_eq!(flow["context"]["configuration_url"], "http://1.2.3.4:8080");
    }

    #[tokio::test]
    async fn test_second_discovery_of_same_robot_in_progress() {
        let client = Arc::new(MockDeviceClient::new());
        client.add_robot("1.2.3.4", MockRobot::new("romy-abc", "myROMY"));
        let (_dir, manager) = manager(client);

        let first = manager
            .start_discovery_flow(&announcement("1.2.3.4"))
            .await
            .unwrap();
        let second = manager
            .start_discovery_flow(&announcement("1.2.3.4"))
            .await
            .unwrap();

        assert_eq!(first.step_id.as_deref(), Some("zeroconf_confirm"));
        assert_eq!(second.reason.as_deref(), Some("already_in_progress"));
        assert_eq!(manager.len(), 1);

        manager.abort_flow(&first.flow_id).unwrap();
        let third = manager
            .start_discovery_flow(&announcement("1.2.3.4"))
            .await
            .unwrap();
        assert_eq!(third.step_id.as_deref(), Some("zeroconf_confirm"));
    }

    #[tokio::test]
    async fn test_user_entry_drops_pending_discovery() {
        let client = Arc::new(MockDeviceClient::new());
        client.add_robot("1.2.3.4", MockRobot::new("romy-abc", "myROMY"));
        let (_dir, manager) = manager(client);

        let discovered = manager
            .start_discovery_flow(&announcement("1.2.3.4"))
            .await
            .unwrap();
        let form = manager.start_flow(DOMAIN).await.unwrap();
        let created = manager
            .progress_flow(&form.flow_id, Some(json!({"host": "1.2.3.4"})))
            .await
            .unwrap();

        assert!(created.entry_id().is_some());
        assert!(manager.is_empty());
        assert!(manager.flow_state(&discovered.flow_id).await.is_none());
    }

    #[tokio::test]
    async fn test_invalid_input_keeps_flow() {
        let client = Arc::new(MockDeviceClient::new());
        let (_dir, manager) = manager(client.clone());
        let form = manager.start_flow(DOMAIN).await.unwrap();

        let err = manager
            .progress_flow(&form.flow_id, Some(json!({"hostname": "1.2.3.4"})))
            .await
            .unwrap_err();

        assert!(matches!(err, FlowError::InvalidData { .. }));
        assert_eq!(
            manager.flow_state(&form.flow_id).await,
            Some(FlowState::AwaitingHost)
        );
        assert_eq!(client.call_count(), 0);
    }
}
