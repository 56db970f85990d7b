//! Deletion against the live task tree

use std::fs;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::analysis::{ImpactReport, analyze_impact, prune_tasks};
use crate::document::write_document;
use crate::error::{SyncError, SyncResult};
use crate::sync::{TaskSnapshot, TaskSync};

/// Delete behaviour switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    /// Remove descendants and dependents instead of refusing
    pub recursive: bool,
    /// Skip missing targets instead of failing
    pub force: bool,
}

/// What a completed deletion removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub report: ImpactReport,
    /// Nodes removed from the tree
    pub removed: usize,
}

impl TaskSync {
    /// Report what deleting `ids` would remove, without changing anything
    pub fn analyze_impact(&self, ids: &[String], recursive: bool) -> SyncResult<ImpactReport> {
        let snapshot = self.get_all()?;
        Ok(analyze_impact(snapshot.tasks(), snapshot.index(), ids, recursive))
    }

    /// Delete `ids` from the tree and write the result back to disk
    ///
    /// The closure is recomputed under the write lock. A blocked or failed
    /// request leaves the tree untouched. Once the tree is swapped a failing
    /// disk write is returned as an error, and the next load re-reads the
    /// document from disk.
    pub fn delete(&self, ids: &[String], options: DeleteOptions, cancel: &CancellationToken) -> SyncResult<DeleteOutcome> {
        debug!(?ids, ?options, "delete: called");
        let path = self.require_document()?;
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let mut state = self.write_state();
        if cancel.is_cancelled() {
            debug!("delete: cancelled while waiting for lock");
            return Err(SyncError::Cancelled);
        }

        let current = state.snapshot.clone();
        let report = analyze_impact(current.tasks(), current.index(), ids, options.recursive);

        if let Some(id) = report.missing.first() {
            if !options.force {
                return Err(SyncError::NotFound(id.clone()));
            }
            for id in &report.missing {
                warn!(%id, "Skipping missing task");
            }
        }
        if report.is_blocked() {
            info!(selected = ?report.selected, "Deletion blocked");
            return Err(SyncError::BlockedDeletion(Box::new(report)));
        }
        if report.selected.is_empty() {
            debug!("delete: nothing to remove");
            return Ok(DeleteOutcome { report, removed: 0 });
        }

        let tasks = prune_tasks(current.tasks(), &report.removal_set());
        let next = TaskSnapshot::build(tasks, current.shape().clone());
        let removed = current.node_count().saturating_sub(next.node_count());

        // Swap first; the tree reflects the attempted result even if the write fails
        self.install(&mut state, next, None);
        let installed = state.snapshot.clone();

        write_document(path, installed.shape(), installed.tasks())?;
        state.modified = fs::metadata(path).and_then(|m| m.modified()).ok();

        info!(
            selected = ?report.selected,
            removed,
            path = %path.display(),
            "Tasks deleted"
        );
        Ok(DeleteOutcome { report, removed })
    }
}
