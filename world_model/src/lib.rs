//! # World Model
//!
//! The vocabulary of a tracked story world: the projected state (clock,
//! location, characters, relationships) and the narrative tags and milestone
//! rules used to derive relationship status. This crate holds no event log and
//! no replay logic; it is the read-model that `chronicle_core` rebuilds.

pub mod entities;
pub mod milestones;
pub mod world_state;

pub use entities::*;
pub use milestones::*;
pub use world_state::*;
