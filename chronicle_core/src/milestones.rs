//! Milestone / Relationship Engine.
//!
//! A milestone marks the earliest active narrative event of a given kind for a
//! pair ("first kiss", "first argument"). Grants live on the events themselves
//! (`AffectedPair::first_for`); this module keeps them consistent as events
//! are inserted, deleted or moved, and folds them into a relationship status.
//!
//! For every pair and milestone type, at most one active event holds that
//! milestone after a recompute.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info};
use world_model::{
    candidate_milestones, status_for_milestones, Attitude, MilestoneType, PairKey,
    RelationshipStatus,
};

use crate::events::{EventId, LoggedEvent, MessageId};
use crate::store::EventStore;

/// Counts from a recompute pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecomputeReport {
    /// Events examined in the mutable phase.
    pub events_scanned: usize,
    /// Grants added that were not there before.
    pub granted: usize,
    /// Stale grants removed.
    pub cleared: usize,
}

/// A milestone moved onto a new event by a targeted repair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Promotion {
    pub pair: PairKey,
    pub milestone: MilestoneType,
    pub event_id: EventId,
}

/// One granted milestone, as listed for a pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneRecord {
    pub milestone: MilestoneType,
    pub event_id: EventId,
    pub message_id: MessageId,
    pub description: Option<String>,
}

/// Read-model of a relationship. Never the source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipProjection {
    pub pair: PairKey,
    /// Status derived from granted milestones.
    pub status: RelationshipStatus,
    /// Status last set by a status-changed state event, if any.
    pub recorded_status: Option<RelationshipStatus>,
    /// Feelings, secrets and wants per holder, from state event replay.
    pub attitudes: BTreeMap<String, Attitude>,
    pub milestones: Vec<MilestoneRecord>,
}

impl EventStore {
    /// Reassign milestones from `from_message` on.
    ///
    /// Grants on events before `from_message` are frozen and only read. Each
    /// later event, in log order, is granted the candidate milestones (from
    /// its event types) that its pair has not been granted yet; its
    /// `first_for` and descriptions are overwritten with exactly that set.
    /// With `restrict_to_pairs`, other pairs are left untouched.
    pub fn recompute_first_for(
        &mut self,
        from_message: MessageId,
        restrict_to_pairs: Option<&[PairKey]>,
    ) -> RecomputeReport {
        let in_scope = |pair: &PairKey| restrict_to_pairs.map_or(true, |pairs| pairs.contains(pair));
        let mut seen: HashMap<PairKey, HashSet<MilestoneType>> = HashMap::new();
        let mut report = RecomputeReport::default();

        for event in &self.narrative_events {
            if event.message_id >= from_message {
                break;
            }
            if !event.is_active() {
                continue;
            }
            for entry in event.affected_pairs.iter().filter(|e| in_scope(&e.pair)) {
                seen.entry(entry.pair.clone())
                    .or_default()
                    .extend(entry.first_for.iter().copied());
            }
        }

        let start = self
            .narrative_events
            .partition_point(|e| e.message_id < from_message);
        for event in self.narrative_events[start..]
            .iter_mut()
            .filter(|e| e.is_active())
        {
            report.events_scanned += 1;
            let candidates = candidate_milestones(&event.event_types);

            for entry in event.affected_pairs.iter_mut() {
                if !in_scope(&entry.pair) {
                    continue;
                }
                let granted_before = seen.entry(entry.pair.clone()).or_default();
                let granted: Vec<MilestoneType> = candidates
                    .iter()
                    .copied()
                    .filter(|m| granted_before.insert(*m))
                    .collect();

                report.cleared += entry
                    .first_for
                    .iter()
                    .filter(|m| !granted.contains(m))
                    .count();
                report.granted += granted
                    .iter()
                    .filter(|m| !entry.first_for.contains(m))
                    .count();

                entry.milestone_descriptions.retain(|m, _| granted.contains(m));
                entry.first_for = granted;
            }
        }

        info!(
            from_message,
            scanned = report.events_scanned,
            granted = report.granted,
            cleared = report.cleared,
            "recomputed milestones"
        );
        report
    }

    /// Give a milestone to the earliest active qualifying event for a pair,
    /// without a full recompute.
    ///
    /// Used after the holder was deleted. The scan runs from the start of the
    /// log rather than from the deleted holder, so a qualifying event that
    /// sits earlier than it is picked first. Returns `None` if an active event
    /// already holds the milestone or no event qualifies.
    pub fn promote_next_event_for_milestone(
        &mut self,
        pair: &PairKey,
        milestone: MilestoneType,
    ) -> Option<EventId> {
        let already_held = self.narrative_events().any(|e| {
            e.pair_entry(pair)
                .is_some_and(|entry| entry.holds(milestone))
        });
        if already_held {
            return None;
        }

        let event = self
            .narrative_events
            .iter_mut()
            .filter(|e| e.is_active() && e.qualifies_for(milestone))
            .find(|e| e.affects(pair))?;
        let entry = event.pair_entry_mut(pair)?;
        entry.first_for.push(milestone);

        debug!(%pair, ?milestone, event_id = %event.id, "promoted milestone");
        Some(event.id)
    }

    /// Soft-delete a narrative event and move each milestone it held to the
    /// next qualifying event. Returns `None` for an unknown or deleted id.
    pub fn delete_narrative_with_repair(&mut self, id: EventId) -> Option<Vec<Promotion>> {
        let held: Vec<(PairKey, MilestoneType)> = self
            .get_narrative(id)?
            .affected_pairs
            .iter()
            .flat_map(|entry| entry.first_for.iter().map(|m| (entry.pair.clone(), *m)))
            .collect();

        self.soft_delete_narrative(id);

        let promotions = held
            .into_iter()
            .filter_map(|(pair, milestone)| {
                self.promote_next_event_for_milestone(&pair, milestone)
                    .map(|event_id| Promotion {
                        pair,
                        milestone,
                        event_id,
                    })
            })
            .collect();
        Some(promotions)
    }

    /// Milestones currently granted for a pair, in log order.
    pub fn milestones_for_pair(&self, pair: &PairKey) -> Vec<MilestoneRecord> {
        self.narrative_events()
            .filter_map(|event| event.pair_entry(pair).map(|entry| (event, entry)))
            .flat_map(|(event, entry)| {
                entry.first_for.iter().map(move |m| MilestoneRecord {
                    milestone: *m,
                    event_id: event.id,
                    message_id: event.message_id,
                    description: entry.milestone_descriptions.get(m).cloned(),
                })
            })
            .collect()
    }

    /// Coarse status from the union of milestones granted to a pair.
    pub fn compute_status(&self, pair: &PairKey) -> RelationshipStatus {
        status_for_milestones(self.milestones_for_pair(pair).into_iter().map(|r| r.milestone))
    }

    /// Assemble the current read-model of a relationship.
    pub fn project_relationship(&self, pair: &PairKey) -> RelationshipProjection {
        let current = match self.latest_position() {
            Some((message_id, swipe_id)) => self.project_optimized(message_id, swipe_id),
            None => self.baseline(),
        };
        let replayed = current.relationship(pair);
        let milestones = self.milestones_for_pair(pair);

        RelationshipProjection {
            pair: pair.clone(),
            status: status_for_milestones(milestones.iter().map(|r| r.milestone)),
            recorded_status: replayed.map(|r| r.status),
            attitudes: replayed.map(|r| r.attitudes.clone()).unwrap_or_default(),
            milestones,
        }
    }
}
