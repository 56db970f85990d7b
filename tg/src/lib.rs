//! taskgraph - sync and mutation engine for task-master task documents
//!
//! A task document is one JSON file holding a forest of tasks, each with
//! nested subtasks and a list of dependencies on other tasks. This crate keeps
//! an in-memory copy of that forest in step with the file and serves queries
//! against it.
//!
//! # Core Concepts
//!
//! - **Snapshots**: every load produces an immutable [`TaskSnapshot`]; readers
//!   share it through an `Arc` while writers swap in a new one
//! - **Warnings, not errors**: duplicate ids, bad enum values, dangling and
//!   circular dependencies are reported and never block a load
//! - **Container preservation**: writes replace only the task array and keep
//!   every other key of the document as found
//! - **External mutations**: task breakdown and import run through an
//!   external command whose output is classified into progress events
//!
//! # Modules
//!
//! - [`domain`] - Task node, status and priority types
//! - [`document`] - Shape detection, parsing and container-preserving writes
//! - [`graph`] - Id index, validation and cycle detection
//! - [`sync`] - The `TaskSync` service and its snapshot cache
//! - [`impact`] - Impact analysis and deletion
//! - [`watcher`] - Debounced file watching
//! - [`external`] - External command orchestration and output classification
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod document;
pub mod domain;
pub mod error;
pub mod external;
pub mod graph;
pub mod impact;
pub mod sync;
pub mod watcher;

// Re-export commonly used types
pub use config::Config;
pub use document::{DocumentShape, LoadedDocument, parse_document, write_document};
pub use domain::{Priority, TaskNode, TaskStatus};
pub use error::{SyncError, SyncResult};
pub use external::{
    ExpandOptions, ExpandScope, ExternalConfig, ExternalOperation, ExternalOutcome, ImportOptions,
    MutationOrchestrator, ProgressClassifier, ProgressEvent, Stage, classify_line,
};
pub use graph::{TaskIndex, Warning, find_cycles, validate};
pub use impact::{DeleteOptions, DeleteOutcome, ImpactReport, analyze_impact, prune_tasks};
pub use sync::{LoadOutcome, ReloadNotice, SyncConfig, TaskSnapshot, TaskSync};
pub use watcher::{DocumentWatcher, WatcherConfig, WatcherHandle};
