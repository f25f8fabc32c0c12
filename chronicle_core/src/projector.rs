//! State Projector - replays state events into a [`ProjectedState`].
//!
//! Replay is a left fold of [`apply_change`] over the active events visible at
//! a target `(message_id, swipe_id)`: every earlier message, plus the target
//! message's own swipe. Each event touches one map entry, so the cost of an
//! event does not grow with the length of the log.

use tracing::{debug, warn};
use world_model::ProjectedState;

use crate::events::{
    CharacterChange, LocationChange, LoggedEvent, MessageId, RelationshipChange, StateChange,
    StateEvent, SwipeId, TimeChange,
};
use crate::store::EventStore;

/// Apply one change to a projection in place.
pub fn apply_change(state: &mut ProjectedState, change: &StateChange) {
    match change {
        StateChange::Time { change } => match change {
            TimeChange::Initial { datetime } => {
                state.time = Some(world_model::StoryTime::new(*datetime));
            }
            TimeChange::Delta {
                days,
                hours,
                minutes,
            } => match state.time.as_mut() {
                Some(time) => {
                    if !time.advance(*days, *hours, *minutes) {
                        warn!(days, hours, minutes, "time delta out of range; clock unchanged");
                    }
                }
                None => warn!(days, hours, minutes, "time delta before any clock was set"),
            },
        },

        StateChange::Location { change } => match change {
            LocationChange::Moved {
                area,
                place,
                position,
            } => {
                let location = state.location_entry();
                location.area = area.clone();
                location.place = place.clone();
                location.position = position.clone();
            }
            LocationChange::PropAdded { prop } => {
                let location = state.location_entry();
                if !location.has_prop(prop) {
                    location.props.push(prop.clone());
                }
            }
            LocationChange::PropRemoved { prop } => {
                if let Some(location) = state.location.as_mut() {
                    location.props.retain(|p| p != prop);
                }
            }
        },

        StateChange::Character { name, change } => {
            if let CharacterChange::Departed = change {
                state.remove_character(name);
                return;
            }
            let character = state.character_entry(name);
            match change {
                CharacterChange::Appeared | CharacterChange::Departed => {}
                CharacterChange::MoodAdded { mood } => push_unique(&mut character.mood, mood),
                CharacterChange::MoodRemoved { mood } => character.mood.retain(|m| m != mood),
                CharacterChange::PhysicalAdded { state: condition } => {
                    push_unique(&mut character.physical_state, condition)
                }
                CharacterChange::PhysicalRemoved { state: condition } => {
                    character.physical_state.retain(|s| s != condition)
                }
                CharacterChange::OutfitChanged {
                    slot, new_value, ..
                } => character.set_outfit(*slot, new_value.clone()),
                CharacterChange::PositionChanged { new_value, .. } => {
                    character.position = new_value.clone();
                }
                CharacterChange::ActivityChanged { new_value, .. } => {
                    character.activity = new_value.clone();
                }
            }
        }

        StateChange::Relationship {
            from,
            towards,
            change,
        } => {
            let pair = world_model::PairKey::new(from, towards);
            let relationship = state.relationship_entry(&pair);
            match change {
                RelationshipChange::StatusChanged { new_status, .. } => {
                    relationship.status = *new_status;
                }
                RelationshipChange::FeelingAdded { value } => {
                    push_unique(&mut relationship.attitude_mut(from).feelings, value)
                }
                RelationshipChange::FeelingRemoved { value } => {
                    relationship.attitude_mut(from).feelings.retain(|v| v != value)
                }
                RelationshipChange::SecretAdded { value } => {
                    push_unique(&mut relationship.attitude_mut(from).secrets, value)
                }
                RelationshipChange::SecretRemoved { value } => {
                    relationship.attitude_mut(from).secrets.retain(|v| v != value)
                }
                RelationshipChange::WantAdded { value } => {
                    push_unique(&mut relationship.attitude_mut(from).wants, value)
                }
                RelationshipChange::WantRemoved { value } => {
                    relationship.attitude_mut(from).wants.retain(|v| v != value)
                }
            }
        }

        StateChange::ForecastGenerated { forecast } => {
            state
                .forecasts
                .insert(forecast.area.clone(), forecast.clone());
        }
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

/// Fold `events` into `state`, stopping after the target message.
///
/// `until` optionally bounds the replay to events whose sort key is at or
/// before it. Returns the number of events applied.
pub(crate) fn replay_into(
    state: &mut ProjectedState,
    events: &[StateEvent],
    message_id: MessageId,
    swipe_id: SwipeId,
    until: Option<(MessageId, i64)>,
) -> usize {
    let mut applied = 0;
    for event in events {
        if event.message_id > message_id {
            break;
        }
        if !event.is_active() || !event.visible_at(message_id, swipe_id) {
            continue;
        }
        if until.is_some_and(|key| event.sort_key() > key) {
            continue;
        }
        apply_change(state, &event.change);
        applied += 1;
    }
    applied
}

impl EventStore {
    /// Baseline replay starts from: the seeded projection, or an empty state.
    pub(crate) fn baseline(&self) -> ProjectedState {
        self.initial_projection.clone().unwrap_or_default()
    }

    /// Full replay of the log up to `(message_id, swipe_id)`.
    pub fn project_at(&self, message_id: MessageId, swipe_id: SwipeId) -> ProjectedState {
        let mut state = self.baseline();
        let applied = replay_into(&mut state, &self.state_events, message_id, swipe_id, None);
        debug!(message_id, swipe_id, applied, "full replay");
        state
    }

    /// State as it stood before a message was generated.
    ///
    /// Message 0 has nothing before it but the seeded baseline; otherwise this
    /// is the projection at the previous message's first swipe.
    pub fn project_before_message(&self, message_id: MessageId, _swipe_id: SwipeId) -> ProjectedState {
        match message_id.checked_sub(1) {
            Some(previous) => self.project_at(previous, 0),
            None => self.baseline(),
        }
    }

    /// Projection at the latest active `(message_id, swipe_id)` in the log.
    pub fn project_current(&self) -> ProjectedState {
        match self.latest_position() {
            Some((message_id, swipe_id)) => self.project_at(message_id, swipe_id),
            None => self.baseline(),
        }
    }

    /// Lexicographically greatest `(message_id, swipe_id)` of any active state event.
    pub fn latest_position(&self) -> Option<(MessageId, SwipeId)> {
        self.state_events()
            .map(|e| (e.message_id, e.swipe_id))
            .max()
    }

    /// Projection immediately preceding an event that would sit at
    /// `(message_id, swipe_id, timestamp)`, starting from the cheapest valid
    /// checkpoint.
    pub(crate) fn project_preceding(
        &self,
        message_id: MessageId,
        swipe_id: SwipeId,
        timestamp: i64,
    ) -> ProjectedState {
        let (mut state, start) = self.checkpoint_for(message_id);
        replay_into(
            &mut state,
            &self.state_events[start..],
            message_id,
            swipe_id,
            Some((message_id, timestamp)),
        );
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use world_model::{OutfitSlot, PairKey, RelationshipStatus};

    fn new_years_eve() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 12, 31)
            .unwrap()
            .and_hms_opt(22, 0, 0)
            .unwrap()
    }

    fn at(message_id: MessageId, swipe_id: SwipeId, ts: i64, change: StateChange) -> StateEvent {
        StateEvent::new(message_id, swipe_id, change).with_timestamp(ts)
    }

    #[test]
    fn test_empty_store_projects_empty_state() {
        let store = EventStore::new();
        assert_eq!(store.project_at(5, 0), ProjectedState::new());
        assert_eq!(store.project_current(), ProjectedState::new());
    }

    #[test]
    fn test_time_delta_uses_calendar() {
        let mut store = EventStore::new();
        store.append_state(at(0, 0, 1, StateChange::time_initial(new_years_eve())));
        store.append_state(at(1, 0, 1, StateChange::time_delta(0, 3, 0)));

        let time = store.project_at(1, 0).time.unwrap();
        assert_eq!(
            time.datetime,
            NaiveDate::from_ymd_opt(2025, 1, 1)
                .unwrap()
                .and_hms_opt(1, 0, 0)
                .unwrap()
        );
        assert_eq!(time.day_of_week, "Wednesday");
    }

    #[test]
    fn test_delta_without_clock_is_skipped() {
        let mut state = ProjectedState::new();
        apply_change(&mut state, &StateChange::time_delta(1, 0, 0));
        assert!(state.time.is_none());
    }

    #[test]
    fn test_move_preserves_props() {
        let mut state = ProjectedState::new();
        apply_change(
            &mut state,
            &StateChange::location(LocationChange::PropAdded {
                prop: "fireplace".to_string(),
            }),
        );
        apply_change(
            &mut state,
            &StateChange::location(LocationChange::Moved {
                area: "Old Town".to_string(),
                place: "Tavern".to_string(),
                position: "bar".to_string(),
            }),
        );

        let location = state.location.unwrap();
        assert_eq!(location.place, "Tavern");
        assert_eq!(location.props, vec!["fireplace"]);
    }

    #[test]
    fn test_character_lifecycle() {
        let mut state = ProjectedState::new();
        let alice = |change| StateChange::character("Alice", change);

        apply_change(&mut state, &alice(CharacterChange::Appeared));
        apply_change(
            &mut state,
            &alice(CharacterChange::MoodAdded {
                mood: "nervous".to_string(),
            }),
        );
        apply_change(
            &mut state,
            &alice(CharacterChange::MoodAdded {
                mood: "nervous".to_string(),
            }),
        );
        apply_change(
            &mut state,
            &alice(CharacterChange::OutfitChanged {
                slot: OutfitSlot::Jacket,
                new_value: Some("raincoat".to_string()),
                previous_value: None,
            }),
        );

        let character = state.character("alice").unwrap();
        assert_eq!(character.mood, vec!["nervous"]);
        assert_eq!(character.worn(OutfitSlot::Jacket), Some("raincoat"));

        apply_change(&mut state, &alice(CharacterChange::Departed));
        assert!(state.character("Alice").is_none());
    }

    #[test]
    fn test_relationship_replay() {
        let mut state = ProjectedState::new();
        apply_change(
            &mut state,
            &StateChange::relationship(
                "Bob",
                "Alice",
                RelationshipChange::WantAdded {
                    value: "her approval".to_string(),
                },
            ),
        );
        apply_change(
            &mut state,
            &StateChange::relationship(
                "Alice",
                "Bob",
                RelationshipChange::StatusChanged {
                    new_status: RelationshipStatus::Friendly,
                    previous_status: None,
                },
            ),
        );

        let relationship = state.relationship(&PairKey::new("alice", "bob")).unwrap();
        assert_eq!(relationship.status, RelationshipStatus::Friendly);
        assert_eq!(relationship.attitude("bob").unwrap().wants, vec!["her approval"]);
    }

    #[test]
    fn test_swipe_visibility() {
        let config = crate::EngineConfig {
            deduplicate: false,
            ..Default::default()
        };
        let mut store = EventStore::new().with_config(config);
        let prop = |p: &str| {
            StateChange::location(LocationChange::PropAdded {
                prop: p.to_string(),
            })
        };
        store.append_state(at(1, 0, 1, prop("swipe zero")));
        store.append_state(at(1, 1, 2, prop("swipe one")));

        assert_eq!(
            store.project_at(1, 1).location.unwrap().props,
            vec!["swipe one"]
        );
        // Later messages see every swipe of earlier messages.
        assert_eq!(
            store.project_at(2, 0).location.unwrap().props,
            vec!["swipe zero", "swipe one"]
        );
    }

    #[test]
    fn test_project_before_message() {
        let mut baseline = ProjectedState::new();
        baseline.character_entry("Narrator");
        let mut store = EventStore::new().with_initial_projection(baseline.clone());
        store.append_state(at(0, 0, 1, StateChange::character("Alice", CharacterChange::Appeared)));
        store.append_state(at(1, 0, 1, StateChange::character("Bob", CharacterChange::Appeared)));

        assert_eq!(store.project_before_message(0, 0), baseline);
        let before_one = store.project_before_message(1, 3);
        assert!(before_one.is_present("Alice"));
        assert!(!before_one.is_present("Bob"));
    }

    #[test]
    fn test_project_current_uses_latest_swipe() {
        let mut store = EventStore::new();
        store.append_state(at(2, 0, 1, StateChange::character("Alice", CharacterChange::Appeared)));
        store.append_state(at(2, 1, 2, StateChange::character("Bob", CharacterChange::Appeared)));

        assert_eq!(store.latest_position(), Some((2, 1)));
        let current = store.project_current();
        assert!(current.is_present("Bob"));
        assert!(!current.is_present("Alice"));
    }

    #[test]
    fn test_tombstoned_events_are_not_replayed() {
        let mut store = EventStore::new();
        let id = store
            .append_state(at(1, 0, 1, StateChange::character("Alice", CharacterChange::Appeared)))
            .unwrap();
        store.soft_delete_state(id);

        assert!(!store.project_at(3, 0).is_present("Alice"));
    }
}
