//! Sync service configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where the task document lives and which context is active
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Explicit project root; discovered from the working directory when unset
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Active document context (tag)
    #[serde(default = "default_tag")]
    pub tag: String,

    /// Document path relative to the project root
    #[serde(default = "default_document")]
    pub document: PathBuf,

    /// Directory whose presence marks a project root
    #[serde(rename = "marker-dir", default = "default_marker_dir")]
    pub marker_dir: String,
}

fn default_tag() -> String {
    "master".to_string()
}

fn default_document() -> PathBuf {
    PathBuf::from(".taskmaster").join("tasks").join("tasks.json")
}

fn default_marker_dir() -> String {
    ".taskmaster".to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            root: None,
            tag: default_tag(),
            document: default_document(),
            marker_dir: default_marker_dir(),
        }
    }
}

impl SyncConfig {
    /// Config rooted at an explicit directory
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            ..Default::default()
        }
    }
}
