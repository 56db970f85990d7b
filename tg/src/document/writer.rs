//! Document writer - task tree back to bytes, preserving the container

use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use super::{DocumentShape, TASKS_KEY};
use crate::domain::TaskNode;
use crate::error::{SyncError, SyncResult};

/// Replace the task array inside `current` and render the result
///
/// Only the array addressed by `shape` changes; every other key keeps its
/// value and position. The trailing newline of `current` is kept as found.
pub fn splice_tasks(current: &[u8], shape: &DocumentShape, tasks: &[TaskNode]) -> SyncResult<String> {
    debug!(%shape, count = tasks.len(), "splice_tasks: called");
    let mut root: Value =
        serde_json::from_slice(current).map_err(|e| SyncError::MalformedDocument(e.to_string()))?;
    let array = Value::Array(tasks.iter().map(TaskNode::to_json).collect());

    match shape {
        DocumentShape::Tagged { tag } => {
            let context = root.get_mut(tag.as_str()).and_then(Value::as_object_mut).ok_or_else(|| {
                SyncError::UnrecognizedDocumentShape(format!("context '{}' no longer exists on disk", tag))
            })?;
            context.insert(TASKS_KEY.to_string(), array);
        }
        DocumentShape::Flat => {
            let object = root.as_object_mut().ok_or_else(|| {
                SyncError::UnrecognizedDocumentShape("document on disk is no longer an object".to_string())
            })?;
            object.insert(TASKS_KEY.to_string(), array);
        }
        DocumentShape::Array => {
            if !root.is_array() {
                return Err(SyncError::UnrecognizedDocumentShape(
                    "document on disk is no longer an array".to_string(),
                ));
            }
            root = array;
        }
    }

    let trailing_newline = current.last() == Some(&b'\n');
    render_document(&root, trailing_newline)
}

/// Render a document with 2-space indentation
pub fn render_document(root: &Value, trailing_newline: bool) -> SyncResult<String> {
    let mut out = serde_json::to_string_pretty(root)?;
    if trailing_newline {
        out.push('\n');
    }
    Ok(out)
}

/// Re-read the document at `path`, splice in `tasks` and write it back
pub fn write_document(path: &Path, shape: &DocumentShape, tasks: &[TaskNode]) -> SyncResult<()> {
    debug!(path = %path.display(), %shape, "write_document: called");
    let current = fs::read(path).map_err(|e| SyncError::io(path, e))?;
    let rendered = splice_tasks(&current, shape, tasks)?;
    fs::write(path, rendered).map_err(|e| SyncError::io(path, e))?;
    debug!(path = %path.display(), "write_document: written");
    Ok(())
}
