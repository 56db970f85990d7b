//! Document synchronization
//!
//! Loads the task document into an immutable [`TaskSnapshot`], caches it by
//! modification time and tag, and serves read queries from it.

mod config;
mod discovery;
mod service;
mod snapshot;

pub use config::SyncConfig;
pub use discovery::discover_root;
pub use service::{LoadOutcome, ReloadNotice, TaskSync};
pub use snapshot::TaskSnapshot;
