//! MutationOrchestrator - runs the external command and streams progress
//!
//! stdout and stderr are read concurrently by two pump tasks feeding one
//! line channel. The orchestrator owns the classifier and the caller's
//! callback, so events reach the callback in the order lines arrive.
//! The sync lock is not held while the command runs, and the reload after
//! it runs on the blocking pool.

use std::collections::VecDeque;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::classifier::{ProgressClassifier, ProgressEvent};
use super::config::ExternalConfig;
use super::operation::ExternalOperation;
use crate::error::{SyncError, SyncResult};
use crate::sync::{LoadOutcome, TaskSync};

/// One line read from the child
#[derive(Debug)]
pub struct LineTap {
    pub line: String,
    pub stream: LineStream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStream {
    Stdout,
    Stderr,
}

/// Result of a successful external operation
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalOutcome {
    /// Progress events delivered to the callback
    pub events: usize,
    /// Result of the reload that followed the command
    pub reload: LoadOutcome,
    pub elapsed: Duration,
}

/// Runs external mutations against the project of a [`TaskSync`]
#[derive(Debug, Clone)]
pub struct MutationOrchestrator {
    sync: Arc<TaskSync>,
    config: ExternalConfig,
}

impl MutationOrchestrator {
    pub fn new(sync: Arc<TaskSync>, config: ExternalConfig) -> Self {
        Self { sync, config }
    }

    /// Run `op`, forwarding classified progress to `on_progress`
    ///
    /// Cancelling `cancel` terminates the command's process group and returns
    /// [`SyncError::Cancelled`]. A non-zero exit returns
    /// [`SyncError::ExternalCommandFailed`] with the tail of stderr. On
    /// success the sync service is force-reloaded before returning.
    pub async fn run<F>(
        &self,
        op: &ExternalOperation,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> SyncResult<ExternalOutcome>
    where
        F: FnMut(ProgressEvent) + Send,
    {
        debug!(%op, "MutationOrchestrator::run: called");
        let root = self.sync.root().ok_or(SyncError::Unavailable)?.to_path_buf();
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let started = Instant::now();
        let args = op.args(&self.sync.tag());
        info!(command = %self.config.command, subcommand = op.subcommand(), ?args, "Starting external operation");

        let mut child = self.spawn(op, &args, &root)?;
        let (line_tx, mut line_rx) = mpsc::channel::<LineTap>(self.config.line_channel_capacity.max(1));
        let mut pumps = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            pumps.push(pump_lines(stdout, LineStream::Stdout, line_tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            pumps.push(pump_lines(stderr, LineStream::Stderr, line_tx.clone()));
        }
        drop(line_tx);

        let mut classifier = ProgressClassifier::new();
        let mut stderr_tail = OutputTail::new(self.config.capture_bytes);
        let mut events = 0usize;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(self.abort(&mut child, pumps).await);
                }
                tap = line_rx.recv() => match tap {
                    Some(tap) => {
                        if tap.stream == LineStream::Stderr {
                            stderr_tail.push(&tap.line);
                        }
                        if let Some(event) = classifier.feed(&tap.line) {
                            debug!(stage = %event.stage, progress = event.progress, "run: progress");
                            events += 1;
                            on_progress(event);
                        }
                    }
                    None => break,
                },
            }
        }

        let status: ExitStatus = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(self.abort(&mut child, pumps).await);
            }
            status = child.wait() => status.map_err(|e| SyncError::io(&root, e))?,
        };

        if !status.success() {
            let stderr = stderr_tail.into_string();
            warn!(code = ?status.code(), %op, "External operation failed");
            return Err(SyncError::ExternalCommandFailed {
                code: status.code(),
                stderr,
            });
        }

        let sync = Arc::clone(&self.sync);
        let token = cancel.clone();
        let reload = tokio::task::spawn_blocking(move || sync.load(true, &token)).await??;
        let elapsed = started.elapsed();
        info!(%op, events, ?reload, elapsed_ms = elapsed.as_millis() as u64, "External operation complete");
        Ok(ExternalOutcome { events, reload, elapsed })
    }

    fn spawn(&self, op: &ExternalOperation, args: &[String], root: &Path) -> SyncResult<Child> {
        let mut cmd = Command::new(&self.config.command);
        cmd.arg(op.subcommand())
            .args(args)
            .current_dir(root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn().map_err(|source| SyncError::Spawn {
            program: self.config.command.clone(),
            source,
        })?;
        debug!(pid = ?child.id(), "spawn: child started");
        Ok(child)
    }

    /// Stop the child and its pumps, always reaping the child
    async fn abort(&self, child: &mut Child, pumps: Vec<JoinHandle<()>>) -> SyncError {
        info!(pid = ?child.id(), "Cancelling external operation");
        terminate(child, self.config.kill_grace()).await;
        for pump in pumps {
            pump.abort();
        }
        SyncError::Cancelled
    }
}

/// SIGTERM the process group, wait out the grace period, then SIGKILL
async fn terminate(child: &mut Child, grace: Duration) {
    if let Some(pid) = child.id() {
        signal_group(pid, false);
        if let Ok(status) = tokio::time::timeout(grace, child.wait()).await {
            debug!(?status, "terminate: exited after SIGTERM");
            signal_group(pid, true);
            return;
        }
        signal_group(pid, true);
    }
    if let Err(e) = child.kill().await {
        debug!(error = %e, "terminate: kill failed");
    }
}

#[cfg(unix)]
fn signal_group(pid: u32, force: bool) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let signal = if force { Signal::SIGKILL } else { Signal::SIGTERM };
    if let Err(e) = killpg(Pid::from_raw(pid as i32), signal) {
        debug!(pid, ?signal, error = %e, "signal_group: failed");
    }
}

#[cfg(not(unix))]
fn signal_group(_pid: u32, _force: bool) {}

fn pump_lines<R>(rd: R, stream: LineStream, tx: mpsc::Sender<LineTap>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(rd);
        let mut buf = Vec::with_capacity(1024);
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    trim_newline(&mut buf);
                    let line = String::from_utf8_lossy(&buf).into_owned();
                    if tx.send(LineTap { line, stream }).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(?stream, error = %e, "Failed reading command output");
                    break;
                }
            }
        }
    })
}

fn trim_newline(buf: &mut Vec<u8>) {
    if buf.last() == Some(&b'\n') {
        buf.pop();
    }
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
}

/// Keeps the last `limit` bytes worth of lines
#[derive(Debug)]
struct OutputTail {
    lines: VecDeque<String>,
    bytes: usize,
    limit: usize,
}

impl OutputTail {
    fn new(limit: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            bytes: 0,
            limit,
        }
    }

    fn push(&mut self, line: &str) {
        self.bytes += line.len() + 1;
        self.lines.push_back(line.to_string());
        while self.bytes > self.limit && self.lines.len() > 1 {
            if let Some(old) = self.lines.pop_front() {
                self.bytes -= old.len() + 1;
            }
        }
    }

    fn into_string(self) -> String {
        Vec::from(self.lines).join("\n")
    }
}
