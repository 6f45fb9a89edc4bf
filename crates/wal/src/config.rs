//! WAL configuration (spec.md §4.2: segment-size threshold, fsync delay).

use std::time::Duration;

/// Default segment rollover threshold: 10 MiB (spec.md §3).
pub const DEFAULT_SEGMENT_SIZE: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct WalConfig {
    /// Size in bytes above which the active segment is rolled.
    pub segment_size: u64,
    /// Delay before the fsync scheduler flushes pending writes. Zero means
    /// the scheduler fires on the same tick it was armed ("immediate"), so
    /// a successful write implies durability before the call returns.
    /// Non-zero batches concurrent writers behind one fsync, at the cost of
    /// up to `sync_delay` of unsynced data on crash.
    pub sync_delay: Duration,
}

impl Default for WalConfig {
    fn default() -> Self {
        Self {
            segment_size: DEFAULT_SEGMENT_SIZE,
            sync_delay: Duration::ZERO,
        }
    }
}

impl WalConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_segment_size(mut self, bytes: u64) -> Self {
        self.segment_size = bytes;
        self
    }

    pub fn with_sync_delay(mut self, delay: Duration) -> Self {
        self.sync_delay = delay;
        self
    }

    /// Small segment size for tests that want to exercise rollover quickly.
    pub fn for_testing() -> Self {
        Self {
            segment_size: 4096,
            sync_delay: Duration::ZERO,
        }
    }
}
