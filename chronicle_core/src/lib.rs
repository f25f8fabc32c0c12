//! # Chronicle Core
//!
//! Event-sourced tracking of a story world. Instead of storing mutable
//! snapshots of "what is true right now", the engine keeps an append-only log
//! of discrete events and rebuilds the current state on demand.
//!
//! ## Core Components
//!
//! - **store**: Append-only, tombstoned event logs kept sorted by `(message, timestamp)`
//! - **dedup**: Suppresses state events that restate the preceding projection
//! - **projector**: Pure replay of state events into a [`world_model::ProjectedState`]
//! - **snapshot**: Chapter checkpoints and the invalidation boundary
//! - **milestones**: "First occurrence" flags and milestone-derived relationship status
//!
//! ## Design Philosophy
//!
//! - **Explicit**: Every operation takes the store it works on; there is no global state
//! - **Total**: Mutations return `bool`/`Option`; only loading config or persisted records can fail
//! - **Synchronous**: No I/O, no threads; the host applies complete batches of events

pub mod config;
pub mod dedup;
pub mod error;
pub mod events;
pub mod milestones;
pub mod projector;
pub mod snapshot;
pub mod store;

pub use config::*;
pub use error::*;
pub use events::*;
pub use milestones::*;
pub use snapshot::*;
pub use store::*;
