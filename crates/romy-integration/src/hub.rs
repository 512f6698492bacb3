//! The ROMY hub
//!
//! Wires the persisted registries, the onboarding flows and entry setup
//! together: entries created by a flow are set up right away, discovery
//! announcements start flows, and removing an entry also removes its
//! devices.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use romy_client::{DeviceClient, DiscoverySource, ZeroconfServiceInfo};
use romy_config::RomyConfig;
use romy_config_entries::{ConfigEntries, ConfigEntriesError, ConfigEntry, ConfigEntryState};
use romy_config_flow::{
    ConfigFlowHandler, FlowError, FlowManager, FlowResult, FlowResultType, RomyConfigFlow,
};
use romy_core::{DOMAIN, ZEROCONF_TYPE};
use romy_registries::{DeviceRegistry, Storage};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::HubResult;
use crate::integration::RomyIntegration;

pub struct RomyHub {
    config: RomyConfig,
    entries: Arc<ConfigEntries>,
    devices: Arc<DeviceRegistry>,
    integration: Arc<RomyIntegration>,
    flows: FlowManager,
}

impl RomyHub {
    /// Load settings and registries from `config_dir` and set up every
    /// stored entry
    ///
    /// Entries whose robot is not reachable yet keep retrying in the
    /// background.
    pub async fn start(
        config_dir: impl AsRef<Path>,
        client: Arc<dyn DeviceClient>,
    ) -> HubResult<Arc<Self>> {
        let config = RomyConfig::load(config_dir)?;
        let storage = Arc::new(Storage::new(config.storage_dir()));

        let entries = ConfigEntries::new(storage.clone());
        entries.load().await?;
        let devices = Arc::new(DeviceRegistry::new(storage));
        devices.load().await?;

        let integration = Arc::new(RomyIntegration::new(
            client.clone(),
            devices.clone(),
            config.update_interval(),
        ));
        entries.register_setup_handler(DOMAIN, integration.clone());

        let flows = FlowManager::new(RomyConfigFlow::new(client, entries.clone()));

        let hub = Arc::new(Self {
            config,
            entries,
            devices,
            integration,
            flows,
        });

        for entry in hub.entries.get_by_domain(DOMAIN) {
            hub.setup_entry(&entry.entry_id).await;
        }
        info!("ROMY hub started with {} entries", hub.entries.len());

        Ok(hub)
    }

    pub fn config(&self) -> &RomyConfig {
        &self.config
    }

    pub fn entries(&self) -> &Arc<ConfigEntries> {
        &self.entries
    }

    pub fn devices(&self) -> &Arc<DeviceRegistry> {
        &self.devices
    }

    pub fn integration(&self) -> &Arc<RomyIntegration> {
        &self.integration
    }

    pub fn flows(&self) -> &FlowManager {
        &self.flows
    }

    async fn setup_entry(&self, entry_id: &str) {
        match self.entries.setup_with_retry(entry_id).await {
            // Not ready is retried in the background
            Ok(()) | Err(ConfigEntriesError::NotReady { .. }) => {}
            Err(e) => warn!("Setup of entry {} failed: {}", entry_id, e),
        }
    }

    /// Set up the entry a finished flow created
    async fn after_flow(&self, result: &FlowResult) {
        if result.result_type != FlowResultType::CreateEntry {
            return;
        }
        if let Some(entry_id) = result.entry_id() {
            self.setup_entry(entry_id).await;
        }
    }

    /// Start an onboarding flow for a discovery announcement
    pub async fn discovered(&self, info: &ZeroconfServiceInfo) -> Result<FlowResult, FlowError> {
        self.flows.start_discovery_flow(info).await
    }

    /// Start flows for announcements until `source` is exhausted
    pub async fn run_discovery<S: DiscoverySource>(&self, mut source: S) {
        while let Some(info) = source.next_announcement().await {
            if info.service_type != ZEROCONF_TYPE {
                debug!("Ignoring {} announcement from {}", info.service_type, info.host);
                continue;
            }

            match self.discovered(&info).await {
                Ok(result) => debug!(
                    "Discovery of {} gave {:?} {}",
                    info.host,
                    result.result_type,
                    result.reason.as_deref().or(result.step_id.as_deref()).unwrap_or_default()
                ),
                Err(e) => warn!("Discovery flow for {} failed: {}", info.host, e),
            }
        }
        debug!("Discovery source exhausted");
    }

    /// Remove an entry and the devices only it referenced
    pub async fn remove_entry(&self, entry_id: &str) -> HubResult<ConfigEntry> {
        let entry = self.entries.remove(entry_id).await?;

        let removed = self.devices.remove_config_entry(entry_id);
        if !removed.is_empty() {
            debug!("Removed {} devices of entry {}", removed.len(), entry_id);
        }
        self.devices.save().await?;

        Ok(entry)
    }

    /// Unload every entry, stopping polling and pending setup retries
    pub async fn shutdown(&self) {
        info!("Shutting down ROMY hub");
        for entry in self.entries.get_by_domain(DOMAIN) {
            if entry.state == ConfigEntryState::NotLoaded {
                continue;
            }
            if let Err(e) = self.entries.unload(&entry.entry_id).await {
                warn!("Failed to unload entry {}: {}", entry.entry_id, e);
            }
        }
    }
}

#[async_trait]
impl ConfigFlowHandler for RomyHub {
    async fn start_flow(&self, handler: &str) -> Result<FlowResult, FlowError> {
        self.flows.start_flow(handler).await
    }

    async fn progress_flow(
        &self,
        flow_id: &str,
        user_input: Option<Value>,
    ) -> Result<FlowResult, FlowError> {
        let result = self.flows.progress_flow(flow_id, user_input).await?;
        self.after_flow(&result).await;
        Ok(result)
    }

    async fn list_flows(&self) -> Vec<Value> {
        self.flows.list_flows().await
    }
}
