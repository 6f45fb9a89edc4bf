//! The cache's statistics surface (spec.md §6):
//! `cacheMemBytes, cacheDiskBytes, cacheSnapshots, cacheAgeMs,
//! cacheCachedBytes`.

use tsdb_core::stats::Gauge;

#[derive(Debug, Default)]
pub struct CacheStats {
    /// Bytes held in the hot store.
    pub mem_bytes: Gauge,
    /// Bytes held in prepared-but-uncommitted snapshots, awaiting durable
    /// write to disk by the compactor.
    pub disk_bytes: Gauge,
    /// Number of snapshots currently prepared but not yet committed.
    pub snapshots: Gauge,
    /// Milliseconds since the last snapshot was prepared.
    pub age_ms: Gauge,
    /// Total bytes resident in memory across hot store and snapshots.
    pub cached_bytes: Gauge,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStatsSnapshot {
    pub mem_bytes: u64,
    pub disk_bytes: u64,
    pub snapshots: u64,
    pub age_ms: u64,
    pub cached_bytes: u64,
}

impl CacheStats {
    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            mem_bytes: self.mem_bytes.get(),
            disk_bytes: self.disk_bytes.get(),
            snapshots: self.snapshots.get(),
            age_ms: self.age_ms.get(),
            cached_bytes: self.cached_bytes.get(),
        }
    }
}
