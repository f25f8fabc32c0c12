//! Relationship state between two characters.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Direction-independent identity of a character pair.
///
/// Both names are trimmed and lowercased, then sorted lexicographically, so
/// `PairKey::new("Bob", "alice")` and `PairKey::new("Alice", "BOB")` are the
/// same key. The string form is `"alice|bob"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PairKey {
    first: String,
    second: String,
}

impl PairKey {
    pub const SEPARATOR: char = '|';

    /// Build the canonical key for two character names.
    pub fn new(a: &str, b: &str) -> Self {
        let a = normalize_name(a);
        let b = normalize_name(b);
        if a <= b {
            Self { first: a, second: b }
        } else {
            Self { first: b, second: a }
        }
    }

    /// The two normalized names, in canonical order.
    pub fn names(&self) -> (&str, &str) {
        (&self.first, &self.second)
    }

    /// Check whether a character (any casing) belongs to this pair.
    pub fn contains(&self, name: &str) -> bool {
        let name = normalize_name(name);
        self.first == name || self.second == name
    }
}

/// Canonical form used for every name comparison at a lookup boundary.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

impl std::fmt::Display for PairKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.first, Self::SEPARATOR, self.second)
    }
}

impl From<PairKey> for String {
    fn from(key: PairKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for PairKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.split_once(Self::SEPARATOR) {
            Some((a, b)) => Ok(PairKey::new(a, b)),
            None => Err(format!("pair key `{value}` is missing a `|` separator")),
        }
    }
}

/// Coarse relationship status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipStatus {
    #[default]
    Strangers,
    Acquaintances,
    Friendly,
    Close,
    Intimate,
    Strained,
    Hostile,
    Complicated,
}

/// How one side of a pair regards the other.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Attitude {
    pub feelings: Vec<String>,
    pub secrets: Vec<String>,
    pub wants: Vec<String>,
}

/// Projected relationship between two characters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipState {
    pub pair: PairKey,

    /// Last status recorded by a status-changed event.
    pub status: RelationshipStatus,

    /// Normalized holder name -> that character's attitude towards the other.
    pub attitudes: BTreeMap<String, Attitude>,
}

impl RelationshipState {
    /// Create a fresh relationship between two strangers.
    pub fn new(pair: PairKey) -> Self {
        Self {
            pair,
            status: RelationshipStatus::Strangers,
            attitudes: BTreeMap::new(),
        }
    }

    /// Attitude held by `from` towards the other member, if any was recorded.
    pub fn attitude(&self, from: &str) -> Option<&Attitude> {
        self.attitudes.get(&normalize_name(from))
    }

    /// Mutable attitude held by `from`, created on first use.
    pub fn attitude_mut(&mut self, from: &str) -> &mut Attitude {
        self.attitudes.entry(normalize_name(from)).or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_key_is_direction_independent() {
        assert_eq!(PairKey::new("Alice", "Bob"), PairKey::new("bob", "ALICE"));
        assert_eq!(PairKey::new(" Bob ", "alice").to_string(), "alice|bob");
    }

    #[test]
    fn test_pair_key_ties_break_lexicographically() {
        let key = PairKey::new("Zed", "Amy");
        assert_eq!(key.names(), ("amy", "zed"));
        assert!(key.contains("ZED"));
        assert!(!key.contains("bob"));
    }

    #[test]
    fn test_pair_key_as_json_map_key() {
        let mut map = BTreeMap::new();
        map.insert(PairKey::new("Bob", "Alice"), 1);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"alice|bob":1}"#);

        let back: BTreeMap<PairKey, i32> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get(&PairKey::new("alice", "bob")), Some(&1));
    }

    #[test]
    fn test_pair_key_rejects_missing_separator() {
        let result: Result<PairKey, _> = serde_json::from_str("\"alicebob\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_attitude_lookup_is_case_insensitive() {
        let mut relationship = RelationshipState::new(PairKey::new("Alice", "Bob"));
        relationship
            .attitude_mut("Alice")
            .feelings
            .push("trust".to_string());

        assert_eq!(relationship.attitude("alice").unwrap().feelings, vec!["trust"]);
        assert!(relationship.attitude("Bob").is_none());
    }
}
