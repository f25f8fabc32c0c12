//! Deduplication Filter - drops state events that would not change anything.
//!
//! Events come from noisy automated extraction, which routinely restates facts
//! that are already true. Given the projection immediately preceding a
//! candidate, [`deduplicate`] returns `None` for a no-op, or the change to
//! record. Scalar changes are rewritten to carry the previous value actually
//! observed in the projection instead of whatever the producer claimed.

use world_model::{ProjectedState, RelationshipStatus};

use crate::events::{CharacterChange, LocationChange, RelationshipChange, StateChange, TimeChange};

/// Filter a candidate change against the state it would apply to.
pub fn deduplicate(state: &ProjectedState, change: &StateChange) -> Option<StateChange> {
    match change {
        StateChange::Time { change: time } => match time {
            TimeChange::Initial { datetime } => {
                let unchanged = state.time.as_ref().is_some_and(|t| &t.datetime == datetime);
                keep_unless(unchanged, change)
            }
            TimeChange::Delta {
                days,
                hours,
                minutes,
            } => keep_unless(*days == 0 && *hours == 0 && *minutes == 0, change),
        },

        StateChange::Location { change: location } => {
            let current = state.location.as_ref();
            let unchanged = match location {
                LocationChange::Moved {
                    area,
                    place,
                    position,
                } => current.is_some_and(|l| l.same_place(area, place, position)),
                LocationChange::PropAdded { prop } => current.is_some_and(|l| l.has_prop(prop)),
                LocationChange::PropRemoved { prop } => !current.is_some_and(|l| l.has_prop(prop)),
            };
            keep_unless(unchanged, change)
        }

        StateChange::Character {
            name,
            change: character_change,
        } => {
            let current = state.character(name);
            let rewritten = match character_change {
                CharacterChange::Appeared => {
                    return keep_unless(current.is_some(), change);
                }
                CharacterChange::Departed => {
                    return keep_unless(current.is_none(), change);
                }
                CharacterChange::MoodAdded { mood } => {
                    return keep_unless(current.is_some_and(|c| c.has_mood(mood)), change);
                }
                CharacterChange::MoodRemoved { mood } => {
                    return keep_unless(!current.is_some_and(|c| c.has_mood(mood)), change);
                }
                CharacterChange::PhysicalAdded { state: condition } => {
                    return keep_unless(
                        current.is_some_and(|c| c.has_physical_state(condition)),
                        change,
                    );
                }
                CharacterChange::PhysicalRemoved { state: condition } => {
                    return keep_unless(
                        !current.is_some_and(|c| c.has_physical_state(condition)),
                        change,
                    );
                }
                CharacterChange::OutfitChanged {
                    slot, new_value, ..
                } => {
                    let observed = current.and_then(|c| c.worn(*slot)).map(str::to_string);
                    if &observed == new_value {
                        return None;
                    }
                    CharacterChange::OutfitChanged {
                        slot: *slot,
                        new_value: new_value.clone(),
                        previous_value: observed,
                    }
                }
                CharacterChange::PositionChanged { new_value, .. } => {
                    let observed = current.and_then(|c| c.position.clone());
                    if &observed == new_value {
                        return None;
                    }
                    CharacterChange::PositionChanged {
                        new_value: new_value.clone(),
                        previous_value: observed,
                    }
                }
                CharacterChange::ActivityChanged { new_value, .. } => {
                    let observed = current.and_then(|c| c.activity.clone());
                    if &observed == new_value {
                        return None;
                    }
                    CharacterChange::ActivityChanged {
                        new_value: new_value.clone(),
                        previous_value: observed,
                    }
                }
            };
            Some(StateChange::Character {
                name: name.clone(),
                change: rewritten,
            })
        }

        StateChange::Relationship {
            from,
            towards,
            change: relationship_change,
        } => {
            let relationship = change.pair().and_then(|pair| state.relationship(&pair));
            let attitude = relationship.and_then(|r| r.attitude(from));
            let (list, value, adding) = match relationship_change {
                RelationshipChange::FeelingAdded { value } => {
                    (attitude.map(|a| &a.feelings), value, true)
                }
                RelationshipChange::FeelingRemoved { value } => {
                    (attitude.map(|a| &a.feelings), value, false)
                }
                RelationshipChange::SecretAdded { value } => {
                    (attitude.map(|a| &a.secrets), value, true)
                }
                RelationshipChange::SecretRemoved { value } => {
                    (attitude.map(|a| &a.secrets), value, false)
                }
                RelationshipChange::WantAdded { value } => (attitude.map(|a| &a.wants), value, true),
                RelationshipChange::WantRemoved { value } => {
                    (attitude.map(|a| &a.wants), value, false)
                }
                RelationshipChange::StatusChanged { new_status, .. } => {
                    let observed = relationship
                        .map(|r| r.status)
                        .unwrap_or(RelationshipStatus::Strangers);
                    if observed == *new_status {
                        return None;
                    }
                    return Some(StateChange::Relationship {
                        from: from.clone(),
                        towards: towards.clone(),
                        change: RelationshipChange::StatusChanged {
                            new_status: *new_status,
                            previous_status: Some(observed),
                        },
                    });
                }
            };
            let present = list.is_some_and(|l| l.iter().any(|v| v == value));
            keep_unless(present == adding, change)
        }

        StateChange::ForecastGenerated { forecast } => {
            let unchanged = state.forecasts.get(&forecast.area) == Some(forecast);
            keep_unless(unchanged, change)
        }
    }
}

fn keep_unless(no_op: bool, change: &StateChange) -> Option<StateChange> {
    if no_op {
        None
    } else {
        Some(change.clone())
    }
}
