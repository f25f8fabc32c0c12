//! Per-character projected state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Clothing slots tracked for each character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutfitSlot {
    Head,
    Neck,
    Jacket,
    Back,
    Torso,
    Legwear,
    Underwear,
    Socks,
    Footwear,
}

/// What a character currently looks like and is doing, as of a projection point.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CharacterState {
    pub name: String,

    /// Where in the scene the character is (e.g. "by the window").
    pub position: Option<String>,

    /// What the character is doing right now.
    pub activity: Option<String>,

    /// Current moods, in the order they were observed.
    pub mood: Vec<String>,

    /// Physical conditions (e.g. "wet", "limping").
    pub physical_state: Vec<String>,

    /// Worn item per slot. A missing slot means nothing is worn there.
    pub outfit: BTreeMap<OutfitSlot, String>,
}

impl CharacterState {
    /// Create an empty record for a newly seen character.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Check whether the character currently shows a mood.
    pub fn has_mood(&self, mood: &str) -> bool {
        self.mood.iter().any(|m| m == mood)
    }

    /// Check whether the character currently has a physical condition.
    pub fn has_physical_state(&self, state: &str) -> bool {
        self.physical_state.iter().any(|s| s == state)
    }

    /// Item worn in a slot, if any.
    pub fn worn(&self, slot: OutfitSlot) -> Option<&str> {
        self.outfit.get(&slot).map(String::as_str)
    }

    /// Put an item in a slot, or clear the slot with `None`.
    pub fn set_outfit(&mut self, slot: OutfitSlot, item: Option<String>) {
        match item {
            Some(item) => {
                self.outfit.insert(slot, item);
            }
            None => {
                self.outfit.remove(&slot);
            }
        }
    }
}
