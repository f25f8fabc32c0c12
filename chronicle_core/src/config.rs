//! Engine configuration.
//!
//! Loaded from TOML; every field has a default so an empty document is a
//! valid configuration:
//!
//! ```toml
//! deduplicate = true
//! invalidate_on_write = true
//! tombstone_retention = "keep_all"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// What happens to soft-deleted events over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TombstoneRetention {
    /// Never physically remove anything.
    #[default]
    KeepAll,
    /// Allow compaction of tombstones older than the earliest chapter snapshot.
    BeforeEarliestSnapshot,
}

/// Behavior switches for an [`EventStore`](crate::EventStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Drop state events that would not change the projection.
    pub deduplicate: bool,

    /// Move the invalidation boundary back on every state-event write.
    pub invalidate_on_write: bool,

    pub tombstone_retention: TombstoneRetention,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            deduplicate: true,
            invalidate_on_write: true,
            tombstone_retention: TombstoneRetention::KeepAll,
        }
    }
}

impl EngineConfig {
    /// Parse configuration from a TOML string.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml)?)
    }

    /// Read and parse a TOML configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert!(config.deduplicate);
        assert!(config.invalidate_on_write);
        assert_eq!(config.tombstone_retention, TombstoneRetention::KeepAll);
    }

    #[test]
    fn test_partial_document() {
        let config = EngineConfig::from_toml_str(
            "deduplicate = false\ntombstone_retention = \"before_earliest_snapshot\"\n",
        )
        .unwrap();
        assert!(!config.deduplicate);
        assert!(config.invalidate_on_write);
        assert_eq!(
            config.tombstone_retention,
            TombstoneRetention::BeforeEarliestSnapshot
        );
    }

    #[test]
    fn test_invalid_document() {
        let result = EngineConfig::from_toml_str("deduplicate = \"sometimes\"");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = EngineConfig::from_file(Path::new("/nonexistent/chronicle.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
