//! Error types for the persistence and configuration boundaries.
//!
//! Store mutations themselves never fail: unknown ids yield `false` or `None`.

/// Errors raised while loading or saving a persisted store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The record is not valid JSON or does not match the expected shape.
    #[error("failed to parse event store: {0}")]
    Json(#[from] serde_json::Error),

    /// The record carries a version this build cannot read.
    #[error("unsupported event store version {found} (latest is {latest})")]
    UnsupportedVersion {
        /// Version tag found in the record.
        found: u32,
        /// Highest version this build understands.
        latest: u32,
    },
}

/// Errors raised while loading engine configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse TOML content.
    #[error("failed to parse config TOML: {0}")]
    Toml(#[from] toml::de::Error),
}
