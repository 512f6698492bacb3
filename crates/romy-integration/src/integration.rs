//! Config entry setup for ROMY robots
//!
//! Setting up an entry connects to the robot, registers it as a device,
//! performs a first status refresh and builds the robot's entities. The
//! resulting runtime data lives until the entry is unloaded.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use romy_client::{DeviceClient, RobotStatus, StatusMap};
use romy_config_entries::{ConfigEntry, EntrySetup, SetupError};
use romy_core::{EntityIdError, State};
use romy_registries::{DeviceEntry, DeviceRegistry};
use tracing::{debug, info, warn};

use crate::binary_sensor::binary_sensors_for;
use crate::coordinator::RomyCoordinator;
use crate::entity::{device_info, Entity};
use crate::sensor::sensors_for;
use crate::vacuum::RomyVacuum;

/// Everything kept alive for one loaded entry
pub struct RomyRuntime {
    entry_id: String,
    coordinator: Arc<RomyCoordinator>,
    device: Arc<DeviceEntry>,
    entities: Vec<Entity>,
    /// Last state handed out per entity id
    last_states: DashMap<String, State>,
}

impl RomyRuntime {
    pub fn entry_id(&self) -> &str {
        &self.entry_id
    }

    pub fn coordinator(&self) -> &Arc<RomyCoordinator> {
        &self.coordinator
    }

    pub fn device(&self) -> &Arc<DeviceEntry> {
        &self.device
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn vacuum(&self) -> Option<&RomyVacuum> {
        self.entities.iter().find_map(|e| match e {
            Entity::Vacuum(v) => Some(v),
            _ => None,
        })
    }

    /// Current state of every entity
    ///
    /// `last_changed` only moves when an entity's value changed since the
    /// state previously handed out.
    pub fn states(&self) -> Vec<State> {
        let data = self.coordinator.data();
        let available = self.coordinator.last_update_success();
        let context = self.coordinator.context();
        let status = data.as_ref().map(|s| s as &dyn StatusMap);

        self.entities
            .iter()
            .map(|entity| self.track(entity.project(status, available, &context)))
            .collect()
    }

    fn track(&self, projected: State) -> State {
        let key = projected.entity_id.to_string();
        let previous = self.last_states.get(&key).map(|s| s.value().clone());

        let state = match previous {
            Some(prev) if prev == projected && prev.context == projected.context => prev,
            Some(prev) => prev.with_update(projected.state, projected.attributes, projected.context),
            None => projected,
        };
        self.last_states.insert(key, state.clone());
        state
    }

    /// Current state of one entity
    pub fn state(&self, entity_id: &str) -> Option<State> {
        self.states()
            .into_iter()
            .find(|state| state.entity_id.to_string() == entity_id)
    }
}

/// Entities for a robot, restricted to the keys present in `status`
fn build_entities(
    coordinator: &RomyCoordinator,
    status: &RobotStatus,
) -> Result<Vec<Entity>, SetupError> {
    let connection = coordinator.connection();
    let invalid = |e: EntityIdError| SetupError::Failed(format!("invalid entity id: {}", e));

    let mut entities: Vec<Entity> = Vec::new();
    entities.extend(
        binary_sensors_for(status, connection)
            .map_err(invalid)?
            .into_iter()
            .map(Entity::BinarySensor),
    );
    entities.extend(
        sensors_for(status, connection)
            .map_err(invalid)?
            .into_iter()
            .map(Entity::Sensor),
    );
    entities.push(Entity::Vacuum(
        RomyVacuum::new(coordinator.robot().clone(), status).map_err(invalid)?,
    ));
    Ok(entities)
}

/// Sets up and unloads ROMY config entries
pub struct RomyIntegration {
    client: Arc<dyn DeviceClient>,
    devices: Arc<DeviceRegistry>,
    update_interval: Duration,
    runtimes: DashMap<String, Arc<RomyRuntime>>,
}

impl RomyIntegration {
    pub fn new(
        client: Arc<dyn DeviceClient>,
        devices: Arc<DeviceRegistry>,
        update_interval: Duration,
    ) -> Self {
        Self {
            client,
            devices,
            update_interval,
            runtimes: DashMap::new(),
        }
    }

    /// Runtime data of a loaded entry
    pub fn runtime(&self, entry_id: &str) -> Option<Arc<RomyRuntime>> {
        self.runtimes.get(entry_id).map(|r| r.value().clone())
    }

    pub fn loaded_entries(&self) -> Vec<String> {
        self.runtimes.iter().map(|r| r.key().clone()).collect()
    }
}

#[async_trait]
impl EntrySetup for RomyIntegration {
    async fn setup_entry(&self, entry: &ConfigEntry) -> Result<(), SetupError> {
        let host = entry
            .host()
            .ok_or_else(|| SetupError::Failed(format!("entry {} has no host", entry.entry_id)))?;

        let robot = self.client.connect(host, entry.password()).await;
        let connection = robot.connection();
        if !connection.initialized {
            return Err(SetupError::NotReady(format!("robot at {} not reachable", host)));
        }

        if !connection.unlocked {
            return Err(SetupError::Failed(format!(
                "robot at {} rejected the stored password",
                host
            )));
        }

        if let Some(expected) = entry.unique_id.as_deref() {
            if connection.unique_id != expected {
                // Another device took over the address; wait for discovery to
                // report the robot's new host
                return Err(SetupError::NotReady(format!(
                    "found robot {} at {} instead of {}",
                    connection.unique_id, host, expected
                )));
            }
        }

        let device = self
            .devices
            .get_or_create(&entry.entry_id, &device_info(&connection));
        if let Err(e) = self.devices.save().await {
            warn!("Failed to save device registry: {}", e);
        }

        let coordinator = Arc::new(RomyCoordinator::new(robot, self.update_interval));
        let status = coordinator
            .first_refresh()
            .await
            .map_err(|e| SetupError::NotReady(e.to_string()))?;

        let entities = build_entities(&coordinator, &status)?;
        debug!(
            "Created {} entities for {}",
            entities.len(),
            connection.user_name
        );

        coordinator.start();
        let runtime = RomyRuntime {
            entry_id: entry.entry_id.clone(),
            coordinator,
            device,
            entities,
            last_states: DashMap::new(),
        };
        if let Some(previous) = self
            .runtimes
            .insert(entry.entry_id.clone(), Arc::new(runtime))
        {
            previous.coordinator.stop();
        }

        info!("Set up {} at {}", connection.user_name, host);
        Ok(())
    }

    async fn unload_entry(&self, entry: &ConfigEntry) -> Result<(), SetupError> {
        if let Some((_, runtime)) = self.runtimes.remove(&entry.entry_id) {
            runtime.coordinator.stop();
            info!("Unloaded {}", entry.title);
        }
        Ok(())
    }
}
