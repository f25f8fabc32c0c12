//! Characters and the relationships between them.

mod character;
mod relationship;

pub use character::*;
pub use relationship::*;
