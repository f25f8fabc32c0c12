//! Narrative events - story beats that affect character pairs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use world_model::{MilestoneType, NarrativeEventType, PairKey};

use super::{now_millis, EventId, MessageId, SwipeId};

/// A pair affected by a narrative event, with the milestones it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffectedPair {
    pub pair: PairKey,

    /// Milestones this event is the first occurrence of, for this pair.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub first_for: Vec<MilestoneType>,

    /// Optional prose per granted milestone.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub milestone_descriptions: BTreeMap<MilestoneType, String>,
}

impl AffectedPair {
    pub fn new(a: &str, b: &str) -> Self {
        Self {
            pair: PairKey::new(a, b),
            first_for: Vec::new(),
            milestone_descriptions: BTreeMap::new(),
        }
    }

    /// Mark this entry as holding a milestone.
    pub fn with_first_for(mut self, milestone: MilestoneType) -> Self {
        if !self.first_for.contains(&milestone) {
            self.first_for.push(milestone);
        }
        self
    }

    pub fn with_description(mut self, milestone: MilestoneType, text: impl Into<String>) -> Self {
        self.milestone_descriptions.insert(milestone, text.into());
        self
    }

    pub fn holds(&self, milestone: MilestoneType) -> bool {
        self.first_for.contains(&milestone)
    }
}

/// A story-significant occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeEvent {
    pub id: EventId,
    pub message_id: MessageId,
    pub swipe_id: SwipeId,
    pub timestamp: i64,

    /// Short summary of what happened.
    pub description: String,

    pub event_types: Vec<NarrativeEventType>,

    pub affected_pairs: Vec<AffectedPair>,

    /// Chapter this event was filed under, once the chapter is closed.
    #[serde(default)]
    pub chapter_index: Option<u32>,

    #[serde(default)]
    pub deleted: bool,
}

impl_logged_event!(NarrativeEvent);

impl NarrativeEvent {
    /// Create an event stamped with the current time.
    pub fn new(message_id: MessageId, swipe_id: SwipeId, description: impl Into<String>) -> Self {
        Self {
            id: EventId::new(),
            message_id,
            swipe_id,
            timestamp: now_millis(),
            description: description.into(),
            event_types: Vec::new(),
            affected_pairs: Vec::new(),
            chapter_index: None,
            deleted: false,
        }
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_type(mut self, event_type: NarrativeEventType) -> Self {
        self.event_types.push(event_type);
        self
    }

    pub fn with_pair(mut self, pair: AffectedPair) -> Self {
        self.affected_pairs.push(pair);
        self
    }

    pub fn pair_entry(&self, pair: &PairKey) -> Option<&AffectedPair> {
        self.affected_pairs.iter().find(|p| &p.pair == pair)
    }

    pub fn pair_entry_mut(&mut self, pair: &PairKey) -> Option<&mut AffectedPair> {
        self.affected_pairs.iter_mut().find(|p| &p.pair == pair)
    }

    pub fn affects(&self, pair: &PairKey) -> bool {
        self.pair_entry(pair).is_some()
    }

    /// Whether any of this event's tags can grant the milestone.
    pub fn qualifies_for(&self, milestone: MilestoneType) -> bool {
        self.event_types
            .iter()
            .any(|t| t.milestones().contains(&milestone))
    }
}
