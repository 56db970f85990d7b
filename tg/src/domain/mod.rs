//! Domain types for taskgraph
//!
//! TaskNode is the single entity: a work item with an owned list of subtasks
//! and a list of dependency ids that may point anywhere in the document.

mod priority;
mod status;
mod task;

pub use priority::Priority;
pub use status::TaskStatus;
pub use task::{SUBTASKS_KEY, TaskNode, walk_forest};
