//! Index & validation over the task tree
//!
//! The ownership tree (subtasks) is a strict forest. The dependency graph is
//! separate, may contain cycles, and is only ever reported on.

mod index;
mod validate;

pub use index::{IndexEntry, TaskIndex, node_at};
pub use validate::{Warning, find_cycles, validate};
