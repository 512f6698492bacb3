//! State type representing an entity's projected value

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::states::{STATE_UNAVAILABLE, STATE_UNKNOWN};
use crate::{Context, EntityId};

/// The state of an entity at a point in time
///
/// Entities of this integration never hold state of their own: a `State` is
/// projected from the coordinator's latest robot status on demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    /// The entity this state belongs to
    pub entity_id: EntityId,

    /// The state value (e.g., "on", "87", "cleaning", "unavailable")
    pub state: String,

    /// Additional attributes associated with the state
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,

    /// When the state was last changed (different from previous state)
    pub last_changed: DateTime<Utc>,

    /// When the state was last updated (even if value didn't change)
    pub last_updated: DateTime<Utc>,

    /// Context of the refresh that produced this state
    pub context: Context,
}

impl State {
    /// Create a new state with current timestamp
    pub fn new(
        entity_id: EntityId,
        state: impl Into<String>,
        attributes: HashMap<String, serde_json::Value>,
        context: Context,
    ) -> Self {
        let now = Utc::now();
        Self {
            entity_id,
            state: state.into(),
            attributes,
            last_changed: now,
            last_updated: now,
            context,
        }
    }

    /// Create the next state of the same entity, keeping `last_changed` when
    /// the value did not change
    pub fn with_update(
        &self,
        new_state: impl Into<String>,
        new_attributes: HashMap<String, serde_json::Value>,
        context: Context,
    ) -> Self {
        let now = Utc::now();
        let new_state = new_state.into();
        let state_changed = self.state != new_state;

        Self {
            entity_id: self.entity_id.clone(),
            state: new_state,
            attributes: new_attributes,
            last_changed: if state_changed {
                now
            } else {
                self.last_changed
            },
            last_updated: now,
            context,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        self.state == STATE_UNAVAILABLE
    }

    pub fn is_unknown(&self) -> bool {
        self.state == STATE_UNKNOWN
    }

    /// Get an attribute value by key
    pub fn attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        // Timestamps and context are not compared
        self.entity_id == other.entity_id
            && self.state == other.state
            && self.attributes == other.attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn battery() -> EntityId {
        EntityId::new("sensor", "romy_battery_level").unwrap()
    }

    #[test]
    fn test_update_keeps_last_changed_for_same_value() {
        let first = State::new(battery(), "80", HashMap::new(), Context::new());
        let second = first.with_update("80", HashMap::new(), Context::new());

        assert_eq!(second.last_changed, first.last_changed);
        assert!(second.last_updated >= first.last_updated);
    }

    #[test]
    fn test_update_moves_last_changed_for_new_value() {
        let first = State::new(battery(), "80", HashMap::new(), Context::new());
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = first.with_update("79", HashMap::new(), Context::new());

        assert!(second.last_changed > first.last_changed);
        assert_eq!(second.state, "79");
    }

    #[test]
    fn test_attribute_lookup() {
        let attrs = HashMap::from([("unit_of_measurement".to_string(), json!("%"))]);
        let state = State::new(battery(), "80", attrs, Context::new());

        assert_eq!(
            state.attribute::<String>("unit_of_measurement").as_deref(),
            Some("%")
        );
        assert_eq!(state.attribute::<String>("device_class"), None);
        assert!(!state.is_unavailable());
        assert!(!state.is_unknown());
    }
}
