//! The WAL's statistics surface (spec.md §6):
//! `walSegments`, `walCurrentSegmentBytes`, `walOldSegmentBytes`,
//! `walCompactionTimeMs`.
//!
//! Kept as live gauges updated on rotation/remove rather than recomputed on
//! read, matching how the rest of the system's counters behave.

use tsdb_core::stats::Gauge;

#[derive(Debug, Default)]
pub struct WalStats {
    pub segments: Gauge,
    pub current_segment_bytes: Gauge,
    pub old_segment_bytes: Gauge,
    pub compaction_time_ms: Gauge,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WalStatsSnapshot {
    pub segments: u64,
    pub current_segment_bytes: u64,
    pub old_segment_bytes: u64,
    pub compaction_time_ms: u64,
}

impl WalStats {
    pub fn snapshot(&self) -> WalStatsSnapshot {
        WalStatsSnapshot {
            segments: self.segments.get(),
            current_segment_bytes: self.current_segment_bytes.get(),
            old_segment_bytes: self.old_segment_bytes.get(),
            compaction_time_ms: self.compaction_time_ms.get(),
        }
    }
}
