//! Watcher configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the DocumentWatcher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Quiet period after the last write before a reload, in milliseconds
    #[serde(rename = "debounce-ms", default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Buffered filesystem events between the notify thread and the reload loop
    #[serde(rename = "channel-capacity", default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_channel_capacity() -> usize {
    64
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl WatcherConfig {
    /// Get the debounce window as a Duration
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
