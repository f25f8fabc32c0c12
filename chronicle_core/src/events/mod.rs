//! Event types recorded in the log.
//!
//! Two logs are kept side by side:
//! - [`StateEvent`]: fine-grained world mutations replayed into a projection
//! - [`NarrativeEvent`]: story-significant occurrences carrying milestone flags
//!
//! Both share the same envelope (id, message, swipe, timestamp, tombstone),
//! exposed through the [`LoggedEvent`] trait so the store can keep either log
//! sorted with the same code.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Index of a chat message in the host conversation.
pub type MessageId = u32;

/// Index of an alternative generation ("swipe") of a message.
pub type SwipeId = u32;

/// Unique identifier for logged events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    /// Create a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Current wall-clock time in epoch milliseconds, used to order events
/// within a message.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Shared envelope of every logged event.
pub trait LoggedEvent {
    fn id(&self) -> EventId;
    fn set_id(&mut self, id: EventId);
    fn message_id(&self) -> MessageId;
    fn swipe_id(&self) -> SwipeId;
    fn timestamp(&self) -> i64;
    fn is_deleted(&self) -> bool;
    fn set_deleted(&mut self, deleted: bool);

    /// Position in the log: `(message_id, timestamp)`.
    fn sort_key(&self) -> (MessageId, i64) {
        (self.message_id(), self.timestamp())
    }

    fn is_active(&self) -> bool {
        !self.is_deleted()
    }

    /// Whether a projection at `(message_id, swipe_id)` sees this event:
    /// every earlier message, plus the exact swipe of the target message.
    fn visible_at(&self, message_id: MessageId, swipe_id: SwipeId) -> bool {
        self.message_id() < message_id
            || (self.message_id() == message_id && self.swipe_id() == swipe_id)
    }
}

macro_rules! impl_logged_event {
    ($ty:ty) => {
        impl $crate::events::LoggedEvent for $ty {
            fn id(&self) -> $crate::events::EventId {
                self.id
            }
            fn set_id(&mut self, id: $crate::events::EventId) {
                self.id = id;
            }
            fn message_id(&self) -> $crate::events::MessageId {
                self.message_id
            }
            fn swipe_id(&self) -> $crate::events::SwipeId {
                self.swipe_id
            }
            fn timestamp(&self) -> i64 {
                self.timestamp
            }
            fn is_deleted(&self) -> bool {
                self.deleted
            }
            fn set_deleted(&mut self, deleted: bool) {
                self.deleted = deleted;
            }
        }
    };
}

mod narrative;
mod state;

pub use narrative::*;
pub use state::*;
