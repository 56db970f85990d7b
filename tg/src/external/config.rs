//! External command configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the MutationOrchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalConfig {
    /// Executable to invoke, looked up on PATH unless it contains a separator
    #[serde(default = "default_command")]
    pub command: String,

    /// Bytes of trailing stderr kept for error reports
    #[serde(rename = "capture-bytes", default = "default_capture_bytes")]
    pub capture_bytes: usize,

    /// Time between SIGTERM and SIGKILL on cancellation, in milliseconds
    #[serde(rename = "kill-grace-ms", default = "default_kill_grace_ms")]
    pub kill_grace_ms: u64,

    /// Buffered output lines between the stream readers and the classifier
    #[serde(rename = "line-channel-capacity", default = "default_line_channel_capacity")]
    pub line_channel_capacity: usize,
}

fn default_command() -> String {
    "task-master".to_string()
}

fn default_capture_bytes() -> usize {
    16 * 1024
}

fn default_kill_grace_ms() -> u64 {
    2000
}

fn default_line_channel_capacity() -> usize {
    256
}

impl Default for ExternalConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            capture_bytes: default_capture_bytes(),
            kill_grace_ms: default_kill_grace_ms(),
            line_channel_capacity: default_line_channel_capacity(),
        }
    }
}

impl ExternalConfig {
    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }
}
