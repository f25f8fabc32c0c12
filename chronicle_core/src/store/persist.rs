//! Persisted record format and upgrades from older layouts.
//!
//! Version 1 kept every event in a single `events` array tagged by
//! `category`. Version 2 splits the logs and adds the baseline, snapshots
//! and invalidation boundary. Upgrading is pure and keeps every event,
//! tombstones included.

use serde::{Deserialize, Serialize};
use tracing::info;
use world_model::ProjectedState;

use super::{EventStore, STORE_VERSION};
use crate::error::StoreError;
use crate::events::{LoggedEvent, NarrativeEvent, StateEvent};

/// An entry of the version 1 single-array log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum LegacyEvent {
    State(StateEvent),
    Narrative(NarrativeEvent),
}

/// Version 1 store layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LegacyEventStore {
    #[serde(default = "legacy_version")]
    pub version: u32,
    pub events: Vec<LegacyEvent>,
    #[serde(default)]
    pub initial_projection: Option<ProjectedState>,
}

fn legacy_version() -> u32 {
    1
}

impl LegacyEventStore {
    /// Split the single log into the two sorted logs of the current layout.
    pub fn upgrade(self) -> EventStore {
        let mut store = EventStore::new();
        for event in self.events {
            match event {
                LegacyEvent::State(event) => store.state_events.push(event),
                LegacyEvent::Narrative(event) => store.narrative_events.push(event),
            }
        }
        store.initial_projection = self.initial_projection;
        store.restore_order();
        store
    }
}

impl EventStore {
    /// Load a persisted store, upgrading older layouts.
    ///
    /// Records without a `version` field are treated as version 1.
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let version = value
            .get("version")
            .and_then(serde_json::Value::as_u64)
            .map_or(1, |v| u32::try_from(v).unwrap_or(u32::MAX));

        match version {
            1 => {
                let legacy: LegacyEventStore = serde_json::from_value(value)?;
                let count = legacy.events.len();
                let store = legacy.upgrade();
                info!(events = count, "upgraded version 1 event store");
                Ok(store)
            }
            STORE_VERSION => {
                let mut store: EventStore = serde_json::from_value(value)?;
                store.restore_order();
                Ok(store)
            }
            found => Err(StoreError::UnsupportedVersion {
                found,
                latest: STORE_VERSION,
            }),
        }
    }

    /// Serialize the persisted record.
    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Re-establish log and snapshot order on data loaded from outside.
    fn restore_order(&mut self) {
        self.state_events.sort_by_key(|e| e.sort_key());
        self.narrative_events.sort_by_key(|e| e.sort_key());
        self.snapshots.sort_by_key(|s| s.chapter_index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{AffectedPair, CharacterChange, StateChange};
    use world_model::{MilestoneType, NarrativeEventType};

    fn legacy_fixture() -> LegacyEventStore {
        let mut deleted = StateEvent::new(1, 0, StateChange::character("Bob", CharacterChange::Appeared))
            .with_timestamp(5);
        deleted.deleted = true;

        LegacyEventStore {
            version: 1,
            events: vec![
                LegacyEvent::Narrative(
                    NarrativeEvent::new(3, 0, "first kiss")
                        .with_timestamp(9)
                        .with_type(NarrativeEventType::Kiss)
                        .with_pair(AffectedPair::new("Alice", "Bob").with_first_for(MilestoneType::FirstKiss)),
                ),
                LegacyEvent::State(
                    StateEvent::new(2, 0, StateChange::character("Alice", CharacterChange::Appeared))
                        .with_timestamp(7),
                ),
                LegacyEvent::State(deleted),
            ],
            initial_projection: None,
        }
    }

    #[test]
    fn test_upgrade_is_lossless_and_sorted() {
        let legacy = legacy_fixture();
        let store = legacy.clone().upgrade();

        assert_eq!(store.version, STORE_VERSION);
        assert_eq!(store.all_state_events().len(), 2);
        assert_eq!(store.all_narrative_events().len(), 1);
        assert_eq!(store.all_state_events()[0].message_id, 1);
        assert!(store.all_state_events()[0].deleted);

        for event in &legacy.events {
            match event {
                LegacyEvent::State(e) => assert!(store.all_state_events().contains(e)),
                LegacyEvent::Narrative(e) => assert!(store.all_narrative_events().contains(e)),
            }
        }
    }

    #[test]
    fn test_from_json_detects_legacy() {
        let json = serde_json::to_string(&legacy_fixture()).unwrap();
        let store = EventStore::from_json(&json).unwrap();
        assert_eq!(store.version, STORE_VERSION);
        assert!(store.project_at(2, 0).is_present("Alice"));
    }

    #[test]
    fn test_missing_version_means_legacy() {
        let json = r#"{"events": []}"#;
        let store = EventStore::from_json(json).unwrap();
        assert_eq!(store.version, STORE_VERSION);
        assert_eq!(store.all_state_events().len(), 0);
    }

    #[test]
    fn test_current_round_trip() {
        let mut store = legacy_fixture().upgrade();
        store.finalize_chapter(0, 2, 0);
        store.invalidate_from(5);

        let json = store.to_json().unwrap();
        let loaded = EventStore::from_json(&json).unwrap();

        assert_eq!(loaded.all_state_events(), store.all_state_events());
        assert_eq!(loaded.all_narrative_events(), store.all_narrative_events());
        assert_eq!(loaded.snapshots(), store.snapshots());
        assert_eq!(loaded.snapshots().len(), 1);
        assert_eq!(loaded.invalid_from(), Some(5));
    }

    #[test]
    fn test_unsupported_version() {
        let result = EventStore::from_json(r#"{"version": 7, "state_events": [], "narrative_events": []}"#);
        assert!(matches!(
            result,
            Err(StoreError::UnsupportedVersion { found: 7, latest: 2 })
        ));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(EventStore::from_json("{not json"), Err(StoreError::Json(_))));
    }
}
