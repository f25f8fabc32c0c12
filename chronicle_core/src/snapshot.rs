//! Snapshot Cache - chapter checkpoints that bound replay cost.
//!
//! A [`ChapterSnapshot`] caches the projection computed when a chapter was
//! closed. [`EventStore::project_optimized`] starts from the nearest usable
//! checkpoint and replays only the events after it.
//!
//! Staleness is tracked by a single invalidation boundary that only ever
//! moves backward. Invalidating a message prunes every snapshot at or after
//! it; snapshots are never recomputed in place.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use world_model::ProjectedState;

use crate::events::{LoggedEvent, MessageId, SwipeId};
use crate::projector::replay_into;
use crate::store::{message_range, EventStore};

/// Projection cached at the end of a chapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterSnapshot {
    pub chapter_index: u32,
    pub message_id: MessageId,
    pub swipe_id: SwipeId,
    pub projection: ProjectedState,
}

impl EventStore {
    /// All snapshots, sorted by chapter index.
    pub fn snapshots(&self) -> &[ChapterSnapshot] {
        &self.snapshots
    }

    /// Store a checkpoint, replacing any earlier one for the same chapter.
    ///
    /// The invalidation boundary is left as it is.
    pub fn save_snapshot(
        &mut self,
        chapter_index: u32,
        message_id: MessageId,
        swipe_id: SwipeId,
        projection: ProjectedState,
    ) {
        let snapshot = ChapterSnapshot {
            chapter_index,
            message_id,
            swipe_id,
            projection,
        };
        match self
            .snapshots
            .binary_search_by_key(&chapter_index, |s| s.chapter_index)
        {
            Ok(index) => self.snapshots[index] = snapshot,
            Err(index) => self.snapshots.insert(index, snapshot),
        }
        debug!(chapter_index, message_id, swipe_id, "saved chapter snapshot");
    }

    /// Latest snapshot strictly before a message, regardless of validity.
    pub fn find_snapshot_before(&self, message_id: MessageId) -> Option<&ChapterSnapshot> {
        self.snapshots
            .iter()
            .filter(|s| s.message_id < message_id)
            .max_by_key(|s| (s.message_id, s.chapter_index))
    }

    /// Latest snapshot before a message that full replay would agree with.
    ///
    /// Stale snapshots are already pruned. This skips snapshots whose
    /// message also has active events on another swipe (full replay of a
    /// later message sees every swipe of earlier ones).
    fn usable_snapshot_before(&self, message_id: MessageId) -> Option<&ChapterSnapshot> {
        self.snapshots
            .iter()
            .filter(|s| s.message_id < message_id)
            .filter(|s| {
                self.state_events[message_range(&self.state_events, s.message_id)]
                    .iter()
                    .all(|e| !e.is_active() || e.swipe_id == s.swipe_id)
            })
            .max_by_key(|s| (s.message_id, s.chapter_index))
    }

    /// Cheapest valid starting point for replaying up to `message_id`: the
    /// state to start from and the index of the first event left to replay.
    pub(crate) fn checkpoint_for(&self, message_id: MessageId) -> (ProjectedState, usize) {
        match self.usable_snapshot_before(message_id) {
            Some(snapshot) => {
                let start = message_range(&self.state_events, snapshot.message_id).end;
                (snapshot.projection.clone(), start)
            }
            None => (self.baseline(), 0),
        }
    }

    /// Same result as [`project_at`](Self::project_at), replaying only the
    /// events after the nearest usable checkpoint.
    pub fn project_optimized(&self, message_id: MessageId, swipe_id: SwipeId) -> ProjectedState {
        let (mut state, start) = self.checkpoint_for(message_id);
        let applied = replay_into(
            &mut state,
            &self.state_events[start..],
            message_id,
            swipe_id,
            None,
        );
        debug!(message_id, swipe_id, skipped = start, applied, "optimized replay");
        state
    }

    // ------------------------------------------------------------------
    // Invalidation
    // ------------------------------------------------------------------

    /// Record that cached projections from `message_id` on are stale and
    /// prune the snapshots they affect.
    ///
    /// The boundary only moves backward. Snapshots saved after an earlier
    /// invalidation survive as long as they sit before `message_id`.
    pub fn invalidate_from(&mut self, message_id: MessageId) {
        let boundary = match self.invalid_from {
            Some(current) => current.min(message_id),
            None => message_id,
        };
        self.invalid_from = Some(boundary);
        self.prune_snapshots_from(message_id);
    }

    /// Current invalidation boundary, if any.
    pub fn invalid_from(&self) -> Option<MessageId> {
        self.invalid_from
    }

    /// Whether a cached projection at `message_id` must be recomputed.
    pub fn is_invalidated(&self, message_id: MessageId) -> bool {
        self.invalid_from.is_some_and(|boundary| message_id >= boundary)
    }

    /// Drop snapshots at or after a message. Returns how many were removed.
    pub fn prune_snapshots_from(&mut self, message_id: MessageId) -> usize {
        let before = self.snapshots.len();
        self.snapshots.retain(|s| s.message_id < message_id);
        let removed = before - self.snapshots.len();
        if removed > 0 {
            info!(message_id, removed, "pruned chapter snapshots");
        }
        removed
    }

    /// Forget the invalidation boundary once the host has re-derived
    /// everything it cached past it.
    pub fn clear_invalidation(&mut self) {
        self.invalid_from = None;
    }

    // ------------------------------------------------------------------
    // Chapters
    // ------------------------------------------------------------------

    /// File every active, unfiled narrative event up to `through_message`
    /// under a chapter. Returns the number of events filed.
    pub fn assign_chapter(&mut self, chapter_index: u32, through_message: MessageId) -> usize {
        let mut filed = 0;
        for event in &mut self.narrative_events {
            if event.message_id > through_message {
                break;
            }
            if event.is_active() && event.chapter_index.is_none() {
                event.chapter_index = Some(chapter_index);
                filed += 1;
            }
        }
        filed
    }

    /// Close a chapter at `(message_id, swipe_id)`: file its narrative events
    /// and checkpoint the projection there.
    pub fn finalize_chapter(
        &mut self,
        chapter_index: u32,
        message_id: MessageId,
        swipe_id: SwipeId,
    ) -> usize {
        let filed = self.assign_chapter(chapter_index, message_id);
        let projection = self.project_optimized(message_id, swipe_id);
        self.save_snapshot(chapter_index, message_id, swipe_id, projection);
        info!(chapter_index, message_id, filed, "finalized chapter");
        filed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{CharacterChange, LocationChange, NarrativeEvent, StateChange, StateEvent};
    use crate::EngineConfig;

    fn snapshot_at(store: &mut EventStore, chapter: u32, message_id: MessageId) {
        store.save_snapshot(chapter, message_id, 0, ProjectedState::new());
    }

    fn prop_event(message_id: MessageId, swipe_id: SwipeId, prop: &str) -> StateEvent {
        StateEvent::new(
            message_id,
            swipe_id,
            StateChange::location(LocationChange::PropAdded {
                prop: prop.to_string(),
            }),
        )
        .with_timestamp(i64::from(message_id) * 10 + i64::from(swipe_id))
    }

    /// Build a store with some churn: props, characters, deletions, swipes.
    fn busy_store() -> EventStore {
        let mut store = EventStore::new();
        for message_id in 0..12u32 {
            store.append_state(prop_event(message_id, 0, &format!("prop-{message_id}")));
            if message_id % 3 == 0 {
                store.append_state(
                    StateEvent::new(
                        message_id,
                        0,
                        StateChange::character(format!("C{message_id}"), CharacterChange::Appeared),
                    )
                    .with_timestamp(i64::from(message_id) * 10 + 5),
                );
            }
            if message_id % 4 == 0 {
                store.append_state(prop_event(message_id, 1, "alt-swipe"));
            }
        }
        let doomed = store.state_events().nth(4).map(|e| e.id).unwrap();
        store.soft_delete_state(doomed);
        store
    }

    #[test]
    fn test_save_snapshot_upserts_and_sorts() {
        let mut store = EventStore::new();
        snapshot_at(&mut store, 2, 20);
        snapshot_at(&mut store, 0, 5);
        snapshot_at(&mut store, 1, 12);
        snapshot_at(&mut store, 1, 14);

        let chapters: Vec<_> = store
            .snapshots()
            .iter()
            .map(|s| (s.chapter_index, s.message_id))
            .collect();
        assert_eq!(chapters, vec![(0, 5), (1, 14), (2, 20)]);
    }

    #[test]
    fn test_find_snapshot_before() {
        let mut store = EventStore::new();
        snapshot_at(&mut store, 0, 5);
        snapshot_at(&mut store, 1, 12);

        assert!(store.find_snapshot_before(5).is_none());
        assert_eq!(store.find_snapshot_before(6).unwrap().chapter_index, 0);
        assert_eq!(store.find_snapshot_before(13).unwrap().chapter_index, 1);
    }

    #[test]
    fn test_invalidation_only_moves_backward() {
        let mut store = EventStore::new();
        assert!(!store.is_invalidated(0));

        store.invalidate_from(10);
        store.invalidate_from(15);
        assert_eq!(store.invalid_from(), Some(10));
        store.invalidate_from(4);
        assert_eq!(store.invalid_from(), Some(4));

        assert!(store.is_invalidated(4));
        assert!(store.is_invalidated(9));
        assert!(!store.is_invalidated(3));
    }

    #[test]
    fn test_prune_from_message() {
        let mut store = EventStore::new();
        snapshot_at(&mut store, 0, 4);
        snapshot_at(&mut store, 1, 9);
        snapshot_at(&mut store, 2, 10);
        snapshot_at(&mut store, 3, 15);

        assert_eq!(store.prune_snapshots_from(10), 2);
        assert_eq!(store.prune_snapshots_from(10), 0);

        let remaining: Vec<_> = store.snapshots().iter().map(|s| s.message_id).collect();
        assert_eq!(remaining, vec![4, 9]);
        assert_eq!(store.invalid_from(), None);
    }

    #[test]
    fn test_invalidation_prunes_affected_snapshots() {
        let mut store = EventStore::new();
        snapshot_at(&mut store, 0, 4);
        snapshot_at(&mut store, 1, 9);
        snapshot_at(&mut store, 2, 10);

        store.invalidate_from(9);

        let remaining: Vec<_> = store.snapshots().iter().map(|s| s.message_id).collect();
        assert_eq!(remaining, vec![4]);
        assert_eq!(store.invalid_from(), Some(9));
    }

    #[test]
    fn test_saving_snapshot_keeps_boundary() {
        let mut store = EventStore::new();
        snapshot_at(&mut store, 0, 4);
        snapshot_at(&mut store, 1, 9);
        store.invalidate_from(3);
        assert!(store.is_invalidated(5));

        snapshot_at(&mut store, 2, 10);
        assert_eq!(store.invalid_from(), Some(3));
        assert!(store.is_invalidated(5));
        let remaining: Vec<_> = store.snapshots().iter().map(|s| s.chapter_index).collect();
        assert_eq!(remaining, vec![2]);

        // A later write past the fresh snapshot prunes it again.
        store.invalidate_from(7);
        assert_eq!(store.invalid_from(), Some(3));
        assert!(store.snapshots().is_empty());
    }

    #[test]
    fn test_clear_invalidation_resets_boundary() {
        let mut store = EventStore::new();
        store.invalidate_from(6);
        snapshot_at(&mut store, 0, 8);

        store.clear_invalidation();
        assert_eq!(store.invalid_from(), None);
        assert!(!store.is_invalidated(6));
        assert_eq!(store.snapshots().len(), 1);

        store.invalidate_from(12);
        assert_eq!(store.invalid_from(), Some(12));
        assert_eq!(store.snapshots().len(), 1);
    }

    #[test]
    fn test_optimized_matches_full_replay() {
        let mut store = busy_store();
        store.finalize_chapter(0, 3, 0);
        store.finalize_chapter(1, 7, 0);
        assert_eq!(store.snapshots().len(), 2);

        for message_id in 0..14u32 {
            for swipe_id in 0..2u32 {
                assert_eq!(
                    store.project_optimized(message_id, swipe_id),
                    store.project_at(message_id, swipe_id),
                    "diverged at ({message_id}, {swipe_id})"
                );
            }
        }
    }

    #[test]
    fn test_optimized_ignores_snapshot_after_write() {
        let mut store = busy_store();
        store.finalize_chapter(0, 5, 0);
        store.append_state(prop_event(2, 0, "late arrival"));

        assert!(store.is_invalidated(5));
        assert!(store.snapshots().is_empty());
        assert_eq!(store.project_optimized(9, 0), store.project_at(9, 0));
        assert!(store.project_optimized(9, 0).location.unwrap().has_prop("late arrival"));
    }

    #[test]
    fn test_snapshot_with_other_swipe_is_skipped() {
        let config = EngineConfig {
            invalidate_on_write: false,
            ..Default::default()
        };
        let mut store = EventStore::new().with_config(config);
        store.append_state(prop_event(4, 0, "zero"));
        store.append_state(prop_event(4, 1, "one"));
        store.finalize_chapter(0, 4, 0);

        assert!(store.find_snapshot_before(6).is_some());
        assert_eq!(store.project_optimized(6, 0), store.project_at(6, 0));
    }

    #[test]
    fn test_stale_snapshot_is_used_without_auto_invalidation() {
        let config = EngineConfig {
            invalidate_on_write: false,
            ..Default::default()
        };
        let mut store = EventStore::new().with_config(config);
        store.append_state(prop_event(1, 0, "a"));
        store.finalize_chapter(0, 2, 0);
        store.append_state(prop_event(1, 0, "b"));

        assert_ne!(store.project_optimized(5, 0), store.project_at(5, 0));

        store.invalidate_from(1);
        assert_eq!(store.project_optimized(5, 0), store.project_at(5, 0));
    }

    #[test]
    fn test_baseline_hit_at_message_zero() {
        let mut baseline = ProjectedState::new();
        baseline.character_entry("Narrator");
        let store = EventStore::new().with_initial_projection(baseline.clone());

        assert_eq!(store.project_optimized(0, 0), baseline);
    }

    #[test]
    fn test_finalize_chapter_files_events() {
        let mut store = EventStore::new();
        store.append_narrative(NarrativeEvent::new(1, 0, "a").with_timestamp(1));
        store.append_narrative(NarrativeEvent::new(3, 0, "b").with_timestamp(1));
        store.append_narrative(NarrativeEvent::new(6, 0, "c").with_timestamp(1));

        assert_eq!(store.finalize_chapter(0, 3, 0), 2);
        assert_eq!(store.finalize_chapter(1, 8, 0), 1);

        assert_eq!(store.narrative_events_for_chapter(0).len(), 2);
        assert_eq!(store.narrative_events_for_chapter(1).len(), 1);
        assert_eq!(store.snapshots().len(), 2);
    }
}
