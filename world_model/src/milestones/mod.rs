//! Narrative event types, milestone types, and the rules connecting them.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::entities::RelationshipStatus;

/// Tags describing what happened in a narrative event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrativeEventType {
    // Neutral
    Conversation,
    Introduction,
    Discovery,
    Departure,

    // Warm
    Laughter,
    Gift,
    Compliment,
    SharedMeal,

    // Close
    Flirtation,
    Touch,
    Embrace,
    SecretShared,
    Vulnerability,
    Promise,
    Protection,
    Rescue,
    Sacrifice,

    // Romantic
    Date,
    Kiss,
    Confession,
    Intimacy,

    // Conflict
    Argument,
    Insult,
    Threat,
    Violence,
    Betrayal,

    // Repair
    Apology,
    Reconciliation,
}

/// "First time this happened between these two" markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneType {
    FirstMeeting,
    FirstLaugh,
    FirstGift,
    FirstCompliment,
    FirstMeal,
    FirstFlirt,
    FirstTouch,
    FirstEmbrace,
    FirstSecretShared,
    FirstVulnerability,
    FirstPromise,
    FirstRescue,
    FirstSacrifice,
    FirstDate,
    FirstKiss,
    FirstConfession,
    FirstIntimacy,
    FirstArgument,
    FirstThreat,
    FirstFight,
    FirstBetrayal,
    Reconciliation,
}

/// Rung of the status ladder a milestone contributes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MilestoneTier {
    Acquaintance,
    Friendly,
    Close,
    Intimate,
    Conflict,
    /// Softens a conflict result; otherwise counts as acquaintance.
    Reconciliation,
}

impl NarrativeEventType {
    /// Milestones an event of this type can be the first occurrence of.
    pub fn milestones(self) -> &'static [MilestoneType] {
        use MilestoneType as M;
        match self {
            Self::Conversation | Self::Discovery | Self::Departure => &[],
            Self::Introduction => &[M::FirstMeeting],
            Self::Laughter => &[M::FirstLaugh],
            Self::Gift => &[M::FirstGift],
            Self::Compliment => &[M::FirstCompliment],
            Self::SharedMeal => &[M::FirstMeal],
            Self::Flirtation => &[M::FirstFlirt],
            Self::Touch => &[M::FirstTouch],
            Self::Embrace => &[M::FirstEmbrace, M::FirstTouch],
            Self::SecretShared => &[M::FirstSecretShared],
            Self::Vulnerability => &[M::FirstVulnerability],
            Self::Promise => &[M::FirstPromise],
            Self::Protection | Self::Rescue => &[M::FirstRescue],
            Self::Sacrifice => &[M::FirstSacrifice],
            Self::Date => &[M::FirstDate],
            Self::Kiss => &[M::FirstKiss, M::FirstTouch],
            Self::Confession => &[M::FirstConfession],
            Self::Intimacy => &[M::FirstIntimacy],
            Self::Argument | Self::Insult => &[M::FirstArgument],
            Self::Threat => &[M::FirstThreat],
            Self::Violence => &[M::FirstFight],
            Self::Betrayal => &[M::FirstBetrayal],
            Self::Apology => &[],
            Self::Reconciliation => &[M::Reconciliation],
        }
    }
}

/// Candidate milestones for a set of event tags, deduplicated, in tag order.
pub fn candidate_milestones(event_types: &[NarrativeEventType]) -> Vec<MilestoneType> {
    let mut seen = HashSet::new();
    event_types
        .iter()
        .flat_map(|t| t.milestones().iter().copied())
        .filter(|m| seen.insert(*m))
        .collect()
}

impl MilestoneType {
    pub fn tier(self) -> MilestoneTier {
        match self {
            Self::FirstMeeting => MilestoneTier::Acquaintance,
            Self::FirstLaugh | Self::FirstGift | Self::FirstCompliment | Self::FirstMeal => {
                MilestoneTier::Friendly
            }
            Self::FirstFlirt
            | Self::FirstTouch
            | Self::FirstEmbrace
            | Self::FirstSecretShared
            | Self::FirstVulnerability
            | Self::FirstPromise
            | Self::FirstRescue
            | Self::FirstSacrifice => MilestoneTier::Close,
            Self::FirstDate | Self::FirstKiss | Self::FirstConfession | Self::FirstIntimacy => {
                MilestoneTier::Intimate
            }
            Self::FirstArgument | Self::FirstThreat | Self::FirstFight | Self::FirstBetrayal => {
                MilestoneTier::Conflict
            }
            Self::Reconciliation => MilestoneTier::Reconciliation,
        }
    }
}

/// Fold granted milestones through the status precedence ladder.
///
/// Intimate > close > friendly > conflict > acquaintance > strangers. A
/// reconciliation turns a conflict result from hostile into strained.
pub fn status_for_milestones<I>(milestones: I) -> RelationshipStatus
where
    I: IntoIterator<Item = MilestoneType>,
{
    let tiers: HashSet<MilestoneTier> = milestones.into_iter().map(MilestoneType::tier).collect();
    let has = |tier| tiers.contains(&tier);

    if has(MilestoneTier::Intimate) {
        RelationshipStatus::Intimate
    } else if has(MilestoneTier::Close) {
        RelationshipStatus::Close
    } else if has(MilestoneTier::Friendly) {
        RelationshipStatus::Friendly
    } else if has(MilestoneTier::Conflict) {
        if has(MilestoneTier::Reconciliation) {
            RelationshipStatus::Strained
        } else {
            RelationshipStatus::Hostile
        }
    } else if has(MilestoneTier::Acquaintance) || has(MilestoneTier::Reconciliation) {
        RelationshipStatus::Acquaintances
    } else {
        RelationshipStatus::Strangers
    }
}
