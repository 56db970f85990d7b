//! TaskSync - owner of the in-memory task tree
//!
//! One `RwLock` guards the current snapshot and its cache key. Writers
//! (load, tag switch, delete) hold the write lock for the whole
//! read-parse-swap sequence, so readers always see one consistent tree.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::SystemTime;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::SyncConfig;
use super::discovery::discover_root;
use super::snapshot::TaskSnapshot;
use crate::document::{DocumentShape, list_tags, parse_document};
use crate::domain::{TaskNode, TaskStatus};
use crate::error::{SyncError, SyncResult};

/// Sent after every snapshot swap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadNotice {
    /// Monotonic counter, bumped on every swap
    pub generation: u64,
    /// Tag the new snapshot was loaded from
    pub tag: String,
}

/// Result of a load request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The document was unchanged; the existing snapshot was kept
    Cached,
    /// A new snapshot was parsed and installed
    Reloaded { nodes: usize, warnings: usize },
}

/// Mutable state behind the lock
#[derive(Debug)]
pub(crate) struct SyncState {
    pub(crate) snapshot: Arc<TaskSnapshot>,
    pub(crate) tag: String,
    pub(crate) modified: Option<SystemTime>,
    pub(crate) generation: u64,
}

/// Synchronizes the on-disk task document with an in-memory tree
#[derive(Debug)]
pub struct TaskSync {
    root: Option<PathBuf>,
    document: Option<PathBuf>,
    state: RwLock<SyncState>,
    notify_tx: mpsc::Sender<ReloadNotice>,
    notify_rx: Mutex<Option<mpsc::Receiver<ReloadNotice>>>,
}

impl TaskSync {
    /// Create a service for the project containing `start`
    ///
    /// No document I/O happens here. When no project root is found the
    /// service is built in the unavailable state and every read fails with
    /// [`SyncError::Unavailable`].
    pub fn new(config: &SyncConfig, start: &Path) -> Self {
        debug!(start = %start.display(), tag = %config.tag, "TaskSync::new: called");
        let root = discover_root(config, start);
        let document = root.as_ref().map(|r| r.join(&config.document));
        match &document {
            Some(path) => info!(document = %path.display(), "Task document located"),
            None => warn!(start = %start.display(), "No project root found; task sync unavailable"),
        }

        let (notify_tx, notify_rx) = mpsc::channel(1);
        let state = SyncState {
            snapshot: Arc::new(TaskSnapshot::empty(DocumentShape::Tagged {
                tag: config.tag.clone(),
            })),
            tag: config.tag.clone(),
            modified: None,
            generation: 0,
        };

        Self {
            root,
            document,
            state: RwLock::new(state),
            notify_tx,
            notify_rx: Mutex::new(Some(notify_rx)),
        }
    }

    /// Create a service for the project containing the working directory
    pub fn discover(config: &SyncConfig) -> SyncResult<Self> {
        let cwd = std::env::current_dir().map_err(|e| SyncError::io(".", e))?;
        Ok(Self::new(config, &cwd))
    }

    pub fn is_available(&self) -> bool {
        self.document.is_some()
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn document_path(&self) -> Option<&Path> {
        self.document.as_deref()
    }

    /// Currently active tag
    pub fn tag(&self) -> String {
        self.read_state().tag.clone()
    }

    /// Number of snapshot swaps so far
    pub fn generation(&self) -> u64 {
        self.read_state().generation
    }

    /// Take the reload notification receiver; only the first caller gets it
    ///
    /// The channel holds one pending notice. Further swaps while it is full
    /// are coalesced into the notice already queued.
    pub fn reload_notifications(&self) -> Option<mpsc::Receiver<ReloadNotice>> {
        self.notify_rx.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    /// Load the document if it changed since the last load, or always when `force`
    ///
    /// On any error the previous snapshot stays installed.
    pub fn load(&self, force: bool, cancel: &CancellationToken) -> SyncResult<LoadOutcome> {
        debug!(force, "load: called");
        self.load_tag(None, force, cancel)
    }

    /// Make `tag` the active context and load it
    pub fn switch_tag(&self, tag: &str, cancel: &CancellationToken) -> SyncResult<LoadOutcome> {
        debug!(%tag, "switch_tag: called");
        self.load_tag(Some(tag), true, cancel)
    }

    /// Tags present in the document on disk
    pub fn available_tags(&self) -> SyncResult<Vec<String>> {
        debug!("available_tags: called");
        let path = self.require_document()?;
        let bytes = fs::read(path).map_err(|e| SyncError::io(path, e))?;
        list_tags(&bytes)
    }

    fn load_tag(&self, tag: Option<&str>, force: bool, cancel: &CancellationToken) -> SyncResult<LoadOutcome> {
        let path = self.require_document()?;
        if cancel.is_cancelled() {
            debug!("load_tag: cancelled before lock");
            return Err(SyncError::Cancelled);
        }

        let mut state = self.write_state();
        if cancel.is_cancelled() {
            debug!("load_tag: cancelled while waiting for lock");
            return Err(SyncError::Cancelled);
        }

        let tag = tag.map(str::to_string).unwrap_or_else(|| state.tag.clone());
        let modified = fs::metadata(path)
            .and_then(|m| m.modified())
            .map_err(|e| SyncError::io(path, e))?;

        if !force && state.generation > 0 && state.modified == Some(modified) && state.tag == tag {
            debug!(%tag, "load_tag: cache hit");
            return Ok(LoadOutcome::Cached);
        }

        let bytes = fs::read(path).map_err(|e| SyncError::io(path, e))?;
        if cancel.is_cancelled() {
            debug!("load_tag: cancelled after read");
            return Err(SyncError::Cancelled);
        }

        let loaded = parse_document(&bytes, &tag)?;
        let snapshot = TaskSnapshot::build(loaded.tasks, loaded.shape);
        let outcome = LoadOutcome::Reloaded {
            nodes: snapshot.node_count(),
            warnings: snapshot.warnings().len(),
        };
        for warning in snapshot.warnings() {
            warn!(%warning, "Task document warning");
        }

        state.tag = tag;
        self.install(&mut state, snapshot, Some(modified));
        info!(tag = %state.tag, ?outcome, "Task document loaded");
        Ok(outcome)
    }

    /// Swap in a new snapshot and queue a reload notice
    pub(crate) fn install(&self, state: &mut SyncState, snapshot: TaskSnapshot, modified: Option<SystemTime>) {
        state.snapshot = Arc::new(snapshot);
        state.modified = modified;
        state.generation += 1;

        let notice = ReloadNotice {
            generation: state.generation,
            tag: state.tag.clone(),
        };
        if let Err(e) = self.notify_tx.try_send(notice) {
            debug!(error = %e, "install: reload notice coalesced");
        }
    }

    /// Current snapshot
    ///
    /// Two calls with no reload in between return the same `Arc`.
    pub fn get_all(&self) -> SyncResult<Arc<TaskSnapshot>> {
        self.require_document()?;
        Ok(Arc::clone(&self.read_state().snapshot))
    }

    /// Node with the given id at any depth
    pub fn get_by_id(&self, id: &str) -> SyncResult<Option<TaskNode>> {
        debug!(%id, "get_by_id: called");
        Ok(self.get_all()?.get(id).cloned())
    }

    /// Next pending task whose dependencies are done
    pub fn get_next(&self) -> SyncResult<Option<TaskNode>> {
        debug!("get_next: called");
        Ok(self.get_all()?.next_task().cloned())
    }

    pub fn count_by_status(&self) -> SyncResult<BTreeMap<TaskStatus, usize>> {
        Ok(self.get_all()?.count_by_status())
    }

    /// Warnings from the current snapshot, rendered for display
    pub fn warnings(&self) -> SyncResult<Vec<String>> {
        Ok(self.get_all()?.warning_messages())
    }

    pub(crate) fn require_document(&self) -> SyncResult<&Path> {
        self.document.as_deref().ok_or(SyncError::Unavailable)
    }

    fn read_state(&self) -> RwLockReadGuard<'_, SyncState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write_state(&self) -> RwLockWriteGuard<'_, SyncState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DOC: &str = r#"{
  "master": {
    "tasks": [
      { "id": 1, "title": "one", "status": "done", "dependencies": [] },
      { "id": 2, "title": "two", "status": "pending", "dependencies": [1],
        "subtasks": [ { "id": 1, "title": "two-a", "status": "pending", "dependencies": [] } ] }
    ]
  },
  "feature": {
    "tasks": [ { "id": 7, "title": "seven", "status": "pending", "dependencies": [] } ]
  }
}
"#;

    fn project(doc: &str) -> (TempDir, TaskSync) {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(".taskmaster").join("tasks");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("tasks.json"), doc).unwrap();
        let sync = TaskSync::new(&SyncConfig::default(), temp.path());
        (temp, sync)
    }

    #[test]
    fn test_unavailable_without_root() {
        let temp = TempDir::new().unwrap();
        let config = SyncConfig {
            marker_dir: ".no-such-marker".to_string(),
            ..Default::default()
        };
        let sync = TaskSync::new(&config, temp.path());
        assert!(!sync.is_available());
        assert!(matches!(sync.get_all(), Err(SyncError::Unavailable)));
        assert!(matches!(
            sync.load(false, &CancellationToken::new()),
            Err(SyncError::Unavailable)
        ));
    }

    #[test]
    fn test_load_then_cache_hit() {
        let (_temp, sync) = project(DOC);
        let cancel = CancellationToken::new();

        let first = sync.load(false, &cancel).unwrap();
        assert_eq!(first, LoadOutcome::Reloaded { nodes: 3, warnings: 0 });
        let a = sync.get_all().unwrap();

        assert_eq!(sync.load(false, &cancel).unwrap(), LoadOutcome::Cached);
        let b = sync.get_all().unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        sync.load(true, &cancel).unwrap();
        let c = sync.get_all().unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_readers() {
        let (_temp, sync) = project(DOC);
        sync.load(false, &CancellationToken::new()).unwrap();

        assert_eq!(sync.get_by_id("2.1").unwrap().unwrap().title, "two-a");
        assert!(sync.get_by_id("42").unwrap().is_none());
        assert_eq!(sync.get_next().unwrap().unwrap().id, "2");
        assert_eq!(sync.count_by_status().unwrap()[&TaskStatus::Pending], 2);
        assert!(sync.warnings().unwrap().is_empty());
    }

    #[test]
    fn test_cancelled_load_keeps_state() {
        let (_temp, sync) = project(DOC);
        let cancel = CancellationToken::new();
        sync.load(false, &cancel).unwrap();
        let before = sync.get_all().unwrap();

        let cancelled = CancellationToken::new();
        cancelled.cancel();
        assert!(matches!(sync.load(true, &cancelled), Err(SyncError::Cancelled)));
        assert!(Arc::ptr_eq(&before, &sync.get_all().unwrap()));
    }

    #[test]
    fn test_malformed_document_keeps_previous_tree() {
        let (temp, sync) = project(DOC);
        let cancel = CancellationToken::new();
        sync.load(false, &cancel).unwrap();
        let before = sync.get_all().unwrap();

        fs::write(temp.path().join(".taskmaster/tasks/tasks.json"), "{ not json").unwrap();
        let err = sync.load(true, &cancel).unwrap_err();
        assert!(err.is_document_error());
        assert!(Arc::ptr_eq(&before, &sync.get_all().unwrap()));
    }

    #[test]
    fn test_switch_tag() {
        let (_temp, sync) = project(DOC);
        let cancel = CancellationToken::new();
        sync.load(false, &cancel).unwrap();

        let mut tags = sync.available_tags().unwrap();
        tags.sort();
        assert_eq!(tags, vec!["feature", "master"]);

        sync.switch_tag("feature", &cancel).unwrap();
        assert_eq!(sync.tag(), "feature");
        assert!(sync.get_by_id("7").unwrap().is_some());
        assert!(sync.get_by_id("1").unwrap().is_none());

        // same mtime but different tag is not a cache hit
        let outcome = sync.switch_tag("master", &cancel).unwrap();
        assert!(matches!(outcome, LoadOutcome::Reloaded { .. }));
    }

    #[test]
    fn test_reload_notifications_coalesce() {
        let (_temp, sync) = project(DOC);
        let mut rx = sync.reload_notifications().unwrap();
        assert!(sync.reload_notifications().is_none());

        let cancel = CancellationToken::new();
        sync.load(true, &cancel).unwrap();
        sync.load(true, &cancel).unwrap();

        let notice = rx.try_recv().unwrap();
        assert_eq!(notice.generation, 1);
        assert_eq!(notice.tag, "master");
        assert!(rx.try_recv().is_err());
    }
}
