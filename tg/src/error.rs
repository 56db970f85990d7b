//! Error types for the sync engine
//!
//! Structural problems in a document (duplicate ids, bad enum values,
//! dangling or circular dependencies) are never errors; they are reported as
//! [`Warning`](crate::graph::Warning)s. Everything here is returned to the
//! immediate caller and never retried internally.

use std::path::PathBuf;

use thiserror::Error;

use crate::impact::ImpactReport;

/// Errors from document, sync and mutation operations
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    #[error("Unrecognized document shape: {0}")]
    UnrecognizedDocumentShape(String),

    #[error("Task document unavailable: no project root found")]
    Unavailable,

    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Deletion blocked: {}", .0.blocking_reason.as_deref().unwrap_or("task has dependents"))]
    BlockedDeletion(Box<ImpactReport>),

    #[error("External command failed with exit code {code:?}: {stderr}")]
    ExternalCommandFailed { code: Option<i32>, stderr: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl SyncError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Check if this is a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SyncError::Cancelled)
    }

    /// Check if the document itself could not be understood
    pub fn is_document_error(&self) -> bool {
        matches!(
            self,
            SyncError::MalformedDocument(_) | SyncError::UnrecognizedDocumentShape(_)
        )
    }

    /// Get the impact report if this is a blocked deletion
    pub fn impact(&self) -> Option<&ImpactReport> {
        match self {
            SyncError::BlockedDeletion(report) => Some(report),
            _ => None,
        }
    }
}

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;
