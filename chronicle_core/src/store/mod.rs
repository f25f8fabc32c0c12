//! Event Store - the append-only, tombstoned event log.
//!
//! The store owns both logs plus the optional projection baseline, chapter
//! snapshots and invalidation boundary. Both logs are kept sorted by
//! `(message_id, timestamp)` after every mutation; nothing outside this module
//! can reach the vectors mutably, so the order cannot be broken by callers.
//!
//! Mutations are total: an unknown id yields `false`/`None`, never an error.

mod persist;

pub use persist::*;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use world_model::{PairKey, ProjectedState};

use crate::config::{EngineConfig, TombstoneRetention};
use crate::dedup::deduplicate;
use crate::events::{
    AffectedPair, EventId, LoggedEvent, MessageId, NarrativeEvent, StateChange, StateEvent,
    SwipeId,
};
use crate::projector::apply_change;
use crate::snapshot::ChapterSnapshot;

/// Current persisted record version.
pub const STORE_VERSION: u32 = 2;

/// Partial update for a state event. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct StateEventPatch {
    pub message_id: Option<MessageId>,
    pub swipe_id: Option<SwipeId>,
    pub timestamp: Option<i64>,
    pub change: Option<StateChange>,
}

/// Partial update for a narrative event. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct NarrativeEventPatch {
    pub message_id: Option<MessageId>,
    pub swipe_id: Option<SwipeId>,
    pub timestamp: Option<i64>,
    pub description: Option<String>,
    pub event_types: Option<Vec<world_model::NarrativeEventType>>,
    pub affected_pairs: Option<Vec<AffectedPair>>,
    pub chapter_index: Option<Option<u32>>,
}

/// Result of regenerating one message/swipe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaceOutcome {
    /// Events (of either kind) tombstoned at the target message/swipe.
    pub tombstoned: usize,
    /// Ids of appended replacement events, state events first.
    pub appended: Vec<EventId>,
    /// Replacement state events dropped as no-ops.
    pub suppressed: usize,
}

/// The event-sourced store for one story.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventStore {
    pub version: u32,

    pub(crate) state_events: Vec<StateEvent>,

    pub(crate) narrative_events: Vec<NarrativeEvent>,

    /// State before the first message; replay starts here when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) initial_projection: Option<ProjectedState>,

    /// Chapter checkpoints, sorted by chapter index.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) snapshots: Vec<ChapterSnapshot>,

    /// Earliest message at which cached projections are stale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) invalid_from: Option<MessageId>,

    #[serde(skip)]
    pub(crate) config: EngineConfig,
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Insert keeping `(message_id, timestamp)` order; equal keys keep arrival order.
pub(crate) fn insert_sorted<E: LoggedEvent>(log: &mut Vec<E>, event: E) -> usize {
    let key = event.sort_key();
    let index = log.partition_point(|e| e.sort_key() <= key);
    log.insert(index, event);
    index
}

fn pair_keys(event: &NarrativeEvent) -> Vec<PairKey> {
    event.affected_pairs.iter().map(|p| p.pair.clone()).collect()
}

fn position_of<E: LoggedEvent>(log: &[E], id: EventId) -> Option<usize> {
    log.iter().position(|e| e.id() == id)
}

/// Index range of events belonging to one message.
pub(crate) fn message_range<E: LoggedEvent>(log: &[E], message_id: MessageId) -> std::ops::Range<usize> {
    let start = log.partition_point(|e| e.message_id() < message_id);
    let end = log.partition_point(|e| e.message_id() <= message_id);
    start..end
}

impl EventStore {
    /// Create an empty store with default configuration.
    pub fn new() -> Self {
        Self {
            version: STORE_VERSION,
            state_events: Vec::new(),
            narrative_events: Vec::new(),
            initial_projection: None,
            snapshots: Vec::new(),
            invalid_from: None,
            config: EngineConfig::default(),
        }
    }

    /// Attach a configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Seed the state that exists before the first message.
    pub fn with_initial_projection(mut self, projection: ProjectedState) -> Self {
        self.initial_projection = Some(projection);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: EngineConfig) {
        self.config = config;
    }

    pub fn initial_projection(&self) -> Option<&ProjectedState> {
        self.initial_projection.as_ref()
    }

    /// Replace the seeded baseline. Every cached projection becomes stale.
    pub fn set_initial_projection(&mut self, projection: Option<ProjectedState>) {
        self.initial_projection = projection;
        self.invalidate_from(0);
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Every state event, tombstones included, in log order.
    pub fn all_state_events(&self) -> &[StateEvent] {
        &self.state_events
    }

    /// Every narrative event, tombstones included, in log order.
    pub fn all_narrative_events(&self) -> &[NarrativeEvent] {
        &self.narrative_events
    }

    /// Active state events in log order.
    pub fn state_events(&self) -> impl Iterator<Item = &StateEvent> {
        self.state_events.iter().filter(|e| e.is_active())
    }

    /// Active narrative events in log order.
    pub fn narrative_events(&self) -> impl Iterator<Item = &NarrativeEvent> {
        self.narrative_events.iter().filter(|e| e.is_active())
    }

    /// Look up an active state event.
    pub fn get_state(&self, id: EventId) -> Option<&StateEvent> {
        self.state_events
            .iter()
            .find(|e| e.id == id && e.is_active())
    }

    /// Look up an active narrative event.
    pub fn get_narrative(&self, id: EventId) -> Option<&NarrativeEvent> {
        self.narrative_events
            .iter()
            .find(|e| e.id == id && e.is_active())
    }

    /// Active state events recorded at exactly `(message_id, swipe_id)`.
    pub fn state_events_for_message(
        &self,
        message_id: MessageId,
        swipe_id: SwipeId,
    ) -> Vec<&StateEvent> {
        self.state_events[message_range(&self.state_events, message_id)]
            .iter()
            .filter(|e| e.is_active() && e.swipe_id == swipe_id)
            .collect()
    }

    /// Active narrative events recorded at exactly `(message_id, swipe_id)`.
    pub fn narrative_events_for_message(
        &self,
        message_id: MessageId,
        swipe_id: SwipeId,
    ) -> Vec<&NarrativeEvent> {
        self.narrative_events[message_range(&self.narrative_events, message_id)]
            .iter()
            .filter(|e| e.is_active() && e.swipe_id == swipe_id)
            .collect()
    }

    /// Active narrative events affecting a pair, in log order.
    pub fn narrative_events_for_pair(&self, pair: &PairKey) -> Vec<&NarrativeEvent> {
        self.narrative_events().filter(|e| e.affects(pair)).collect()
    }

    /// Active narrative events filed under a chapter.
    pub fn narrative_events_for_chapter(&self, chapter_index: u32) -> Vec<&NarrativeEvent> {
        self.narrative_events()
            .filter(|e| e.chapter_index == Some(chapter_index))
            .collect()
    }

    // ------------------------------------------------------------------
    // State event writes
    // ------------------------------------------------------------------

    /// Append a state event, assigning it a fresh id.
    ///
    /// Returns `None` when the event restates the projection immediately
    /// preceding it and deduplication is enabled.
    pub fn append_state(&mut self, mut event: StateEvent) -> Option<EventId> {
        if self.config.deduplicate {
            let before = self.project_preceding(event.message_id, event.swipe_id, event.timestamp);
            match deduplicate(&before, &event.change) {
                Some(change) => event.change = change,
                None => {
                    debug!(
                        message_id = event.message_id,
                        swipe_id = event.swipe_id,
                        "suppressing no-op state event"
                    );
                    return None;
                }
            }
        }
        Some(self.insert_state(event))
    }

    /// Append several state events; each is checked against the projection
    /// including the survivors before it.
    pub fn append_state_batch(&mut self, events: Vec<StateEvent>) -> Vec<EventId> {
        events
            .into_iter()
            .filter_map(|event| self.append_state(event))
            .collect()
    }

    fn insert_state(&mut self, mut event: StateEvent) -> EventId {
        let id = EventId::new();
        event.set_id(id);
        let message_id = event.message_id;
        insert_sorted(&mut self.state_events, event);
        self.note_state_write(message_id);
        id
    }

    /// Partially update an active state event, re-positioning it if its
    /// sort key changed.
    pub fn update_state(&mut self, id: EventId, patch: StateEventPatch) -> bool {
        let Some(index) = position_of(&self.state_events, id) else {
            return false;
        };
        if self.state_events[index].deleted {
            return false;
        }

        let mut event = self.state_events.remove(index);
        let old_message = event.message_id;
        if let Some(message_id) = patch.message_id {
            event.message_id = message_id;
        }
        if let Some(swipe_id) = patch.swipe_id {
            event.swipe_id = swipe_id;
        }
        if let Some(timestamp) = patch.timestamp {
            event.timestamp = timestamp;
        }
        if let Some(change) = patch.change {
            event.change = change;
        }

        let new_message = event.message_id;
        insert_sorted(&mut self.state_events, event);
        self.note_state_write(old_message.min(new_message));
        true
    }

    /// Tombstone a state event. Returns `false` for an unknown id.
    pub fn soft_delete_state(&mut self, id: EventId) -> bool {
        let Some(event) = self.state_events.iter_mut().find(|e| e.id == id) else {
            return false;
        };
        event.set_deleted(true);
        let message_id = event.message_id;
        self.note_state_write(message_id);
        true
    }

    fn note_state_write(&mut self, message_id: MessageId) {
        if self.config.invalidate_on_write {
            self.invalidate_from(message_id);
        }
    }

    // ------------------------------------------------------------------
    // Narrative event writes
    // ------------------------------------------------------------------

    /// Append a narrative event, assigning it a fresh id.
    ///
    /// Milestones of the pairs it affects are recomputed from its message
    /// on, so caller-supplied `first_for` grants are re-derived.
    pub fn append_narrative(&mut self, event: NarrativeEvent) -> EventId {
        let from_message = event.message_id;
        let pairs = pair_keys(&event);
        let id = self.insert_narrative(event);
        if !pairs.is_empty() {
            self.recompute_first_for(from_message, Some(pairs.as_slice()));
        }
        id
    }

    fn insert_narrative(&mut self, mut event: NarrativeEvent) -> EventId {
        let id = EventId::new();
        event.set_id(id);
        insert_sorted(&mut self.narrative_events, event);
        id
    }

    /// Partially update an active narrative event.
    pub fn update_narrative(&mut self, id: EventId, patch: NarrativeEventPatch) -> bool {
        let Some(index) = position_of(&self.narrative_events, id) else {
            return false;
        };
        if self.narrative_events[index].deleted {
            return false;
        }

        let mut event = self.narrative_events.remove(index);
        let old_message = event.message_id;
        let mut pairs = pair_keys(&event);
        if let Some(message_id) = patch.message_id {
            event.message_id = message_id;
        }
        if let Some(swipe_id) = patch.swipe_id {
            event.swipe_id = swipe_id;
        }
        if let Some(timestamp) = patch.timestamp {
            event.timestamp = timestamp;
        }
        if let Some(description) = patch.description {
            event.description = description;
        }
        if let Some(event_types) = patch.event_types {
            event.event_types = event_types;
        }
        if let Some(affected_pairs) = patch.affected_pairs {
            event.affected_pairs = affected_pairs;
        }
        if let Some(chapter_index) = patch.chapter_index {
            event.chapter_index = chapter_index;
        }
        let new_message = event.message_id;
        pairs.extend(pair_keys(&event));
        pairs.sort();
        pairs.dedup();
        insert_sorted(&mut self.narrative_events, event);

        if !pairs.is_empty() {
            self.recompute_first_for(old_message.min(new_message), Some(pairs.as_slice()));
        }
        true
    }

    /// Tombstone a narrative event. Returns `false` for an unknown id.
    ///
    /// Milestones it held are not moved; see
    /// [`delete_narrative_with_repair`](Self::delete_narrative_with_repair).
    pub fn soft_delete_narrative(&mut self, id: EventId) -> bool {
        match self.narrative_events.iter_mut().find(|e| e.id == id) {
            Some(event) => {
                event.set_deleted(true);
                true
            }
            None => false,
        }
    }

    // ------------------------------------------------------------------
    // Swipe regeneration
    // ------------------------------------------------------------------

    /// Replace everything recorded at `(message_id, swipe_id)`.
    ///
    /// Active events there are tombstoned, replacement state events are
    /// deduplicated against the state before the message (and against each
    /// other), and milestones are recomputed from this message on for every
    /// pair touched by the old or new narrative events.
    pub fn replace_for_message(
        &mut self,
        message_id: MessageId,
        swipe_id: SwipeId,
        state_events: Vec<StateEvent>,
        narrative_events: Vec<NarrativeEvent>,
    ) -> ReplaceOutcome {
        let mut outcome = ReplaceOutcome::default();
        let mut touched_pairs: Vec<PairKey> = Vec::new();

        let range = message_range(&self.state_events, message_id);
        for event in &mut self.state_events[range] {
            if event.is_active() && event.swipe_id == swipe_id {
                event.set_deleted(true);
                outcome.tombstoned += 1;
            }
        }
        let range = message_range(&self.narrative_events, message_id);
        for event in &mut self.narrative_events[range] {
            if event.is_active() && event.swipe_id == swipe_id {
                event.set_deleted(true);
                touched_pairs.extend(pair_keys(event));
                outcome.tombstoned += 1;
            }
        }

        let mut running = self.project_before_message(message_id, swipe_id);
        for mut event in state_events {
            event.message_id = message_id;
            event.swipe_id = swipe_id;
            if self.config.deduplicate {
                match deduplicate(&running, &event.change) {
                    Some(change) => event.change = change,
                    None => {
                        outcome.suppressed += 1;
                        continue;
                    }
                }
            }
            apply_change(&mut running, &event.change);
            let id = EventId::new();
            event.set_id(id);
            insert_sorted(&mut self.state_events, event);
            outcome.appended.push(id);
        }

        for mut event in narrative_events {
            event.message_id = message_id;
            event.swipe_id = swipe_id;
            touched_pairs.extend(pair_keys(&event));
            outcome.appended.push(self.insert_narrative(event));
        }

        touched_pairs.sort();
        touched_pairs.dedup();
        if !touched_pairs.is_empty() {
            self.recompute_first_for(message_id, Some(touched_pairs.as_slice()));
        }

        self.invalidate_from(message_id);
        info!(
            message_id,
            swipe_id,
            tombstoned = outcome.tombstoned,
            appended = outcome.appended.len(),
            suppressed = outcome.suppressed,
            "replaced events for message"
        );
        outcome
    }

    // ------------------------------------------------------------------
    // Retention
    // ------------------------------------------------------------------

    /// Physically drop tombstones the retention policy allows to go.
    ///
    /// Under [`TombstoneRetention::BeforeEarliestSnapshot`], tombstones whose
    /// message precedes the earliest chapter snapshot are removed. Returns the
    /// number of events dropped.
    pub fn compact_tombstones(&mut self) -> usize {
        let boundary = match self.config.tombstone_retention {
            TombstoneRetention::KeepAll => return 0,
            TombstoneRetention::BeforeEarliestSnapshot => {
                match self.snapshots.iter().map(|s| s.message_id).min() {
                    Some(boundary) => boundary,
                    None => return 0,
                }
            }
        };

        let before = self.state_events.len() + self.narrative_events.len();
        self.state_events
            .retain(|e| e.is_active() || e.message_id >= boundary);
        self.narrative_events
            .retain(|e| e.is_active() || e.message_id >= boundary);
        let removed = before - self.state_events.len() - self.narrative_events.len();

        info!(boundary, removed, "compacted tombstones");
        removed
    }
}
