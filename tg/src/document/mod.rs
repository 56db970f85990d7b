//! Task document parsing and writing
//!
//! A task document is a single JSON file in one of three shapes:
//!
//! ```text
//! tagged:  { "master": { "tasks": [...], "metadata": {...} }, "feature-x": {...} }
//! flat:    { "tasks": [...], "metadata": {...} }
//! array:   [ {...}, {...} ]
//! ```
//!
//! Loading records which shape was detected so a later write can replace the
//! task array in place and leave every other key untouched.

mod loader;
mod writer;

pub use loader::{list_tags, normalize_id, parse_document};
pub use writer::{render_document, splice_tasks, write_document};

use crate::domain::TaskNode;

/// Key holding the task array in the tagged and flat shapes
pub const TASKS_KEY: &str = "tasks";

/// The on-disk layout a document was loaded from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentShape {
    /// Object keyed by context name, each context holding a `tasks` array
    Tagged { tag: String },
    /// Root object with a `tasks` array
    Flat,
    /// Bare array of tasks
    Array,
}

impl DocumentShape {
    /// The context tag, if the document is tagged
    pub fn tag(&self) -> Option<&str> {
        match self {
            Self::Tagged { tag } => Some(tag),
            _ => None,
        }
    }
}

impl std::fmt::Display for DocumentShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tagged { tag } => write!(f, "tagged ({})", tag),
            Self::Flat => write!(f, "flat"),
            Self::Array => write!(f, "array"),
        }
    }
}

/// Result of parsing a document
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    /// Detected layout
    pub shape: DocumentShape,

    /// Root-level tasks in document order
    pub tasks: Vec<TaskNode>,
}
