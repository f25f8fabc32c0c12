//! State events - fine-grained mutations of the projected world.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use world_model::{Forecast, OutfitSlot, PairKey, RelationshipStatus};

use super::{now_millis, EventId, MessageId, SwipeId};

/// A single world mutation observed at one message/swipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEvent {
    pub id: EventId,
    pub message_id: MessageId,
    pub swipe_id: SwipeId,
    /// Epoch milliseconds; orders events within a message.
    pub timestamp: i64,
    pub change: StateChange,
    #[serde(default)]
    pub deleted: bool,
}

impl_logged_event!(StateEvent);

impl StateEvent {
    /// Create an event stamped with the current time.
    ///
    /// The id is a placeholder until the store assigns one on append.
    pub fn new(message_id: MessageId, swipe_id: SwipeId, change: StateChange) -> Self {
        Self {
            id: EventId::new(),
            message_id,
            swipe_id,
            timestamp: now_millis(),
            change,
            deleted: false,
        }
    }

    /// Override the timestamp.
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// What changed, grouped by the part of the world it touches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StateChange {
    Time {
        change: TimeChange,
    },
    Location {
        change: LocationChange,
    },
    Character {
        name: String,
        change: CharacterChange,
    },
    /// `from`'s side of the relationship with `towards`.
    Relationship {
        from: String,
        towards: String,
        change: RelationshipChange,
    },
    ForecastGenerated {
        forecast: Forecast,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "subkind", rename_all = "snake_case")]
pub enum TimeChange {
    /// Set the absolute clock.
    Initial { datetime: NaiveDateTime },
    /// Advance the clock.
    Delta {
        #[serde(default)]
        days: i64,
        #[serde(default)]
        hours: i64,
        #[serde(default)]
        minutes: i64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "subkind", rename_all = "snake_case")]
pub enum LocationChange {
    /// Replace area/place/position; props carry over.
    Moved {
        area: String,
        place: String,
        position: String,
    },
    PropAdded { prop: String },
    PropRemoved { prop: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "subkind", rename_all = "snake_case")]
pub enum CharacterChange {
    Appeared,
    Departed,
    MoodAdded { mood: String },
    MoodRemoved { mood: String },
    PhysicalAdded { state: String },
    PhysicalRemoved { state: String },
    OutfitChanged {
        slot: OutfitSlot,
        new_value: Option<String>,
        #[serde(default)]
        previous_value: Option<String>,
    },
    PositionChanged {
        new_value: Option<String>,
        #[serde(default)]
        previous_value: Option<String>,
    },
    ActivityChanged {
        new_value: Option<String>,
        #[serde(default)]
        previous_value: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "subkind", rename_all = "snake_case")]
pub enum RelationshipChange {
    FeelingAdded { value: String },
    FeelingRemoved { value: String },
    SecretAdded { value: String },
    SecretRemoved { value: String },
    WantAdded { value: String },
    WantRemoved { value: String },
    /// Pair-level; `from`/`towards` only identify the pair.
    StatusChanged {
        new_status: RelationshipStatus,
        #[serde(default)]
        previous_status: Option<RelationshipStatus>,
    },
}

impl StateChange {
    pub fn time_initial(datetime: NaiveDateTime) -> Self {
        Self::Time {
            change: TimeChange::Initial { datetime },
        }
    }

    pub fn time_delta(days: i64, hours: i64, minutes: i64) -> Self {
        Self::Time {
            change: TimeChange::Delta {
                days,
                hours,
                minutes,
            },
        }
    }

    pub fn location(change: LocationChange) -> Self {
        Self::Location { change }
    }

    pub fn character(name: impl Into<String>, change: CharacterChange) -> Self {
        Self::Character {
            name: name.into(),
            change,
        }
    }

    pub fn relationship(
        from: impl Into<String>,
        towards: impl Into<String>,
        change: RelationshipChange,
    ) -> Self {
        Self::Relationship {
            from: from.into(),
            towards: towards.into(),
            change,
        }
    }

    /// Pair touched by a relationship change.
    pub fn pair(&self) -> Option<PairKey> {
        match self {
            Self::Relationship { from, towards, .. } => Some(PairKey::new(from, towards)),
            _ => None,
        }
    }
}
