//! Document watcher - debounced reloads on file change

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::WatcherConfig;
use crate::error::{SyncError, SyncResult};
use crate::sync::TaskSync;

type NotifyResult = Result<Event, notify::Error>;

/// Watches the task document and force-reloads the sync service
pub struct DocumentWatcher;

impl DocumentWatcher {
    /// Start watching the document of `sync`
    ///
    /// The parent directory is watched so the document may be created,
    /// replaced or deleted at any time. When that directory does not exist
    /// yet, its nearest existing ancestor is watched recursively instead.
    /// Cancelling `cancel` (or calling [`WatcherHandle::stop`]) ends the loop.
    pub fn spawn(sync: Arc<TaskSync>, config: &WatcherConfig, cancel: &CancellationToken) -> SyncResult<WatcherHandle> {
        let path = sync.document_path().ok_or(SyncError::Unavailable)?.to_path_buf();
        debug!(path = %path.display(), debounce_ms = config.debounce_ms, "DocumentWatcher::spawn: called");

        let (target, watch_dir, mode) = WatchTarget::locate(&path)?;

        let (tx, rx) = mpsc::channel::<NotifyResult>(config.channel_capacity.max(1));
        let mut watcher = notify::recommended_watcher(move |res: NotifyResult| forward(&tx, &target, res))?;
        watcher.watch(&watch_dir, mode)?;
        info!(dir = %watch_dir.display(), ?mode, "Watching task document");

        let cancel = cancel.child_token();
        let task = tokio::spawn(run(watcher, rx, sync, config.debounce(), cancel.clone()));

        Ok(WatcherHandle {
            cancel,
            task: Some(task),
        })
    }
}

/// Which filesystem events concern the document
#[derive(Debug)]
struct WatchTarget {
    file_name: OsString,
    /// Directories between the watched ancestor and the document, not yet created
    missing_dirs: Vec<OsString>,
}

impl WatchTarget {
    /// Find the directory to watch for `path` and how
    fn locate(path: &Path) -> SyncResult<(Self, PathBuf, RecursiveMode)> {
        let file_name = path
            .file_name()
            .map(ToOwned::to_owned)
            .ok_or_else(|| SyncError::io(path, std::io::Error::other("document has no file name")))?;

        let mut missing_dirs = Vec::new();
        let mut dir = path.parent();
        while let Some(candidate) = dir {
            if candidate.is_dir() {
                let mode = if missing_dirs.is_empty() {
                    RecursiveMode::NonRecursive
                } else {
                    RecursiveMode::Recursive
                };
                let target = Self {
                    file_name,
                    missing_dirs,
                };
                return Ok((target, candidate.to_path_buf(), mode));
            }
            if let Some(name) = candidate.file_name() {
                missing_dirs.push(name.to_owned());
            }
            dir = candidate.parent();
        }

        Err(SyncError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "no existing directory above the document"),
        ))
    }

    fn touches(&self, event: &Event) -> bool {
        if matches!(event.kind, EventKind::Access(_)) {
            return false;
        }
        let created = event.kind.is_create();
        event.paths.iter().filter_map(|p| p.file_name()).any(|name| {
            name == self.file_name.as_os_str() || (created && self.missing_dirs.iter().any(|d| d == name))
        })
    }
}

/// Queue document events and watch errors; everything else is dropped here
fn forward(tx: &mpsc::Sender<NotifyResult>, target: &WatchTarget, res: NotifyResult) {
    let relevant = match &res {
        Ok(event) => target.touches(event),
        Err(_) => true,
    };
    if relevant {
        // A full channel already holds a document change
        let _ = tx.try_send(res);
    }
}

/// Handle to a running watcher; dropping it stops the watcher
pub struct WatcherHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl WatcherHandle {
    /// Stop the watcher and wait for its loop to exit
    pub async fn stop(mut self) {
        debug!("WatcherHandle::stop: called");
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!(error = %e, "Watcher task panicked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run(
    watcher: RecommendedWatcher,
    mut rx: mpsc::Receiver<NotifyResult>,
    sync: Arc<TaskSync>,
    window: Duration,
    cancel: CancellationToken,
) {
    loop {
        let msg = tokio::select! {
            _ = cancel.cancelled() => break,
            msg = rx.recv() => msg,
        };
        match msg {
            None => break,
            Some(Err(e)) => warn!(error = %e, "Filesystem watch error"),
            Some(Ok(event)) => {
                debug!(kind = ?event.kind, "run: document changed, debouncing");
                if !settle(&mut rx, window, &cancel).await {
                    break;
                }
                reload(&sync, &cancel).await;
            }
        }
    }

    // Stops the notify thread and closes the channel
    drop(watcher);
    rx.close();
    info!("Document watcher stopped");
}

/// Wait until `window` passes with no further change; false if cancelled
async fn settle(rx: &mut mpsc::Receiver<NotifyResult>, window: Duration, cancel: &CancellationToken) -> bool {
    let mut deadline = Instant::now() + window;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return false,
            _ = sleep_until(deadline) => return true,
            msg = rx.recv() => match msg {
                None => return true,
                Some(Ok(_)) => deadline = Instant::now() + window,
                Some(Err(e)) => warn!(error = %e, "Filesystem watch error"),
            },
        }
    }
}

async fn reload(sync: &Arc<TaskSync>, cancel: &CancellationToken) {
    let sync = Arc::clone(sync);
    let token = cancel.clone();
    match tokio::task::spawn_blocking(move || sync.load(true, &token)).await {
        Ok(Ok(outcome)) => debug!(?outcome, "reload: complete"),
        Ok(Err(e)) if e.is_cancelled() => debug!("reload: cancelled"),
        Ok(Err(e)) => warn!(error = %e, "Reload after file change failed; still watching"),
        Err(e) => error!(error = %e, "Reload task failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind};

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    fn target(missing: &[&str]) -> WatchTarget {
        WatchTarget {
            file_name: OsString::from("tasks.json"),
            missing_dirs: missing.iter().map(OsString::from).collect(),
        }
    }

    #[test]
    fn test_touches_filters_by_name_and_kind() {
        let target = target(&[]);
        assert!(target.touches(&event(EventKind::Modify(ModifyKind::Any), "/p/tasks.json")));
        assert!(target.touches(&event(EventKind::Create(CreateKind::File), "/p/tasks.json")));
        assert!(!target.touches(&event(EventKind::Modify(ModifyKind::Any), "/p/other.json")));
        assert!(!target.touches(&event(EventKind::Access(AccessKind::Any), "/p/tasks.json")));
    }

    #[test]
    fn test_touches_creation_of_missing_dir() {
        let target = target(&["tasks"]);
        assert!(target.touches(&event(EventKind::Create(CreateKind::Folder), "/p/.taskmaster/tasks")));
        assert!(!target.touches(&event(EventKind::Modify(ModifyKind::Any), "/p/.taskmaster/tasks")));
        assert!(!target.touches(&event(EventKind::Create(CreateKind::Folder), "/p/.taskmaster/docs")));
    }

    #[test]
    fn test_locate_existing_parent() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("tasks.json");
        let (target, dir, mode) = WatchTarget::locate(&path).unwrap();
        assert_eq!(dir, temp.path());
        assert_eq!(mode, RecursiveMode::NonRecursive);
        assert!(target.missing_dirs.is_empty());
    }

    #[test]
    fn test_locate_missing_parent() {
        let temp = tempfile::tempdir().unwrap();
        let marker = temp.path().join(".taskmaster");
        std::fs::create_dir(&marker).unwrap();
        let path = marker.join("tasks").join("tasks.json");

        let (target, dir, mode) = WatchTarget::locate(&path).unwrap();
        assert_eq!(dir, marker);
        assert_eq!(mode, RecursiveMode::Recursive);
        assert_eq!(target.missing_dirs, vec![OsString::from("tasks")]);
    }

    #[test]
    fn test_forward_keeps_queue_for_document_events() {
        let (tx, mut rx) = mpsc::channel(1);
        let target = target(&[]);
        for i in 0..10 {
            let other = format!("/p/other-{}.json", i);
            forward(&tx, &target, Ok(event(EventKind::Modify(ModifyKind::Any), &other)));
        }
        assert!(rx.try_recv().is_err());

        forward(&tx, &target, Ok(event(EventKind::Modify(ModifyKind::Any), "/p/tasks.json")));
        let queued = rx.try_recv().unwrap().unwrap();
        assert_eq!(queued.paths, vec![PathBuf::from("/p/tasks.json")]);
    }

    #[tokio::test]
    async fn test_settle_collapses_burst() {
        let (tx, mut rx) = mpsc::channel(16);
        for _ in 0..5 {
            tx.send(Ok(event(EventKind::Modify(ModifyKind::Any), "/p/tasks.json")))
                .await
                .unwrap();
        }
        let cancel = CancellationToken::new();
        assert!(settle(&mut rx, Duration::from_millis(20), &cancel).await);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_settle_cancelled() {
        let (_tx, mut rx) = mpsc::channel::<NotifyResult>(1);
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(!settle(&mut rx, Duration::from_secs(5), &cancel).await);
    }

    #[test]
    fn test_spawn_unavailable() {
        let temp = tempfile::tempdir().unwrap();
        let config = crate::sync::SyncConfig {
            marker_dir: ".no-such-marker".to_string(),
            ..Default::default()
        };
        let sync = Arc::new(TaskSync::new(&config, temp.path()));
        let result = DocumentWatcher::spawn(sync, &WatcherConfig::default(), &CancellationToken::new());
        assert!(matches!(result, Err(SyncError::Unavailable)));
    }
}
