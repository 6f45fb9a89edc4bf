//! Points-writer configuration, following the WAL's `WalConfig` builder
//! pattern (`with_*` setters, `Default`, `for_testing()`).

use std::time::Duration;

/// Default whole-batch write timeout.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);
/// Default bounded capacity of each subscriber's fan-out channel.
pub const DEFAULT_SUBSCRIBER_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct PointsWriterConfig {
    /// Whole-batch timeout: once exceeded, `write_points` returns
    /// `WriteError::Timeout` even if some per-shard tasks are still
    /// in flight (spec.md §5 "Cancellation and timeouts").
    pub write_timeout: Duration,
    /// Bounded capacity of each subscriber's fan-out channel. A full
    /// channel is a silent drop, counted in `subWriteDrop`.
    pub subscriber_channel_capacity: usize,
    /// Width of the admission limiter capping concurrent WAL-encoding
    /// tasks (spec.md §5: `2 x CPU`). `None` derives it from
    /// `std::thread::available_parallelism` at construction time.
    pub admission_limit: Option<usize>,
}

impl Default for PointsWriterConfig {
    fn default() -> Self {
        Self {
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            subscriber_channel_capacity: DEFAULT_SUBSCRIBER_CHANNEL_CAPACITY,
            admission_limit: None,
        }
    }
}

impl PointsWriterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn with_subscriber_channel_capacity(mut self, capacity: usize) -> Self {
        self.subscriber_channel_capacity = capacity;
        self
    }

    pub fn with_admission_limit(mut self, limit: usize) -> Self {
        self.admission_limit = Some(limit);
        self
    }

    /// The effective admission-limiter width: `2 x CPU` unless overridden.
    pub fn resolved_admission_limit(&self) -> usize {
        self.admission_limit.unwrap_or_else(|| {
            2 * std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        })
    }

    /// Short timeout and small channel, for tests that want deterministic
    /// timeout/drop behavior without waiting on real wall-clock defaults.
    pub fn for_testing() -> Self {
        Self {
            write_timeout: Duration::from_millis(200),
            subscriber_channel_capacity: 4,
            admission_limit: Some(2),
        }
    }
}
