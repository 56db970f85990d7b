//! File watcher for the task document

mod config;
mod document_watcher;

pub use config::WatcherConfig;
pub use document_watcher::{DocumentWatcher, WatcherHandle};
