//! The in-memory per-series cache: hot store, byte-bounded admission, and
//! the three-phase snapshot protocol the compactor drives (spec.md §4.3).
//!
//! Concurrency mirrors the teacher's `UnifiedStore`: one `parking_lot::RwLock`
//! around the hot map, read-locked for the common write/read path and
//! upgraded to a write lock only when a lazy sort is unavoidable. The
//! snapshot lifecycle is serialized by a disjoint [`CommitGate`] rather than
//! folded into the same lock, so a long-running snapshot prepare never
//! blocks an unrelated cache write.

use crate::entry::{dedup_last_write_wins, values_size, CacheEntry};
use crate::error::CacheError;
use crate::gate::CommitGate;
use crate::snapshot::Snapshot;
use crate::stats::{CacheStats, CacheStatsSnapshot};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tsdb_core::value::TimestampedValue;

/// In-memory, per-series-key value store with bounded memory and a
/// snapshot/commit/rollback protocol for the compactor (spec.md §4.3).
pub struct Cache {
    store: RwLock<FxHashMap<Vec<u8>, CacheEntry>>,
    snapshots: RwLock<Vec<Snapshot>>,
    size: AtomicU64,
    snapshots_size: AtomicU64,
    max_size: u64,
    last_snapshot: Mutex<Instant>,
    commit_gate: CommitGate,
    stats: CacheStats,
}

impl Cache {
    pub fn new(max_size: u64) -> Self {
        Self {
            store: RwLock::new(FxHashMap::default()),
            snapshots: RwLock::new(Vec::new()),
            size: AtomicU64::new(0),
            snapshots_size: AtomicU64::new(0),
            max_size,
            last_snapshot: Mutex::new(Instant::now()),
            commit_gate: CommitGate::new(),
            stats: CacheStats::default(),
        }
    }

    /// Write values for a single series key.
    pub fn write(&self, key: Vec<u8>, values: Vec<TimestampedValue>) -> Result<(), CacheError> {
        self.write_multi(std::iter::once((key, values)).collect())
    }

    /// Write values for multiple series keys as one admission-checked batch.
    pub fn write_multi(
        &self,
        writes: FxHashMap<Vec<u8>, Vec<TimestampedValue>>,
    ) -> Result<(), CacheError> {
        let added: u64 = writes
            .values()
            .map(|values| values_size(values) as u64)
            .sum();

        let current_size = self.size.load(Ordering::Acquire);
        let current_snapshots_size = self.snapshots_size.load(Ordering::Acquire);
        if self.max_size > 0 && current_size + current_snapshots_size + added > self.max_size {
            return Err(CacheError::MemoryExceeded {
                requested: added,
                available: self
                    .max_size
                    .saturating_sub(current_size + current_snapshots_size),
            });
        }

        let mut store = self.store.write();
        for (key, values) in writes {
            store.entry(key).or_default().append(values);
        }
        drop(store);

        self.size.fetch_add(added, Ordering::AcqRel);
        self.stats.mem_bytes.add(added);
        self.stats.cached_bytes.add(added);
        Ok(())
    }

    /// The merged, sorted, deduplicated value sequence for `key`: every
    /// pending snapshot in chronological order, followed by the hot entry.
    pub fn values(&self, key: &[u8]) -> Vec<TimestampedValue> {
        let snapshots = self.snapshots.read();

        // Fast path: no snapshot in flight and the hot entry is already
        // sorted — a read lock suffices for the whole merge.
        {
            let store = self.store.read();
            let hot = store.get(key);
            let hot_needs_sort = hot.map(|e| e.need_sort).unwrap_or(false);
            if snapshots.is_empty() && !hot_needs_sort {
                return hot.map(|e| e.values.clone()).unwrap_or_default();
            }
        }

        // Slow path: at least one input needs sorting or merging. Upgrade to
        // a write lock only for the hot entry's own lazy sort; snapshots are
        // immutable once prepared and never need this.
        let mut capacity = 0usize;
        for snap in snapshots.iter() {
            if let Some(entry) = snap.store.get(key) {
                capacity += entry.values.len();
            }
        }

        let hot_values: Vec<TimestampedValue> = {
            let mut store = self.store.write();
            if let Some(entry) = store.get_mut(key) {
                if entry.need_sort {
                    entry.deduplicate();
                }
                capacity += entry.values.len();
                entry.values.clone()
            } else {
                Vec::new()
            }
        };

        let mut merged = Vec::with_capacity(capacity);
        for snap in snapshots.iter() {
            if let Some(entry) = snap.store.get(key) {
                merged.extend(entry.values.iter().cloned());
            }
        }
        merged.extend(hot_values);

        if merged.windows(2).any(|w| w[0].timestamp > w[1].timestamp)
            || has_duplicate_timestamps(&merged)
        {
            dedup_last_write_wins(&mut merged);
        }
        merged
    }

    /// Remove keys from the hot store. Snapshots and TSM tombstones are a
    /// separate mechanism (spec.md §4.3 "Delete"), out of scope here.
    pub fn delete(&self, keys: &[Vec<u8>]) {
        let mut store = self.store.write();
        let mut freed = 0u64;
        for key in keys {
            if let Some(entry) = store.remove(key) {
                freed += entry.size() as u64;
            }
        }
        drop(store);
        self.size.fetch_sub(freed, Ordering::AcqRel);
        self.stats.mem_bytes.sub(freed);
        self.stats.cached_bytes.sub(freed);
    }

    /// Phase 1 of the snapshot protocol: atomically move the hot store into
    /// a new, immutable snapshot, then return every snapshot currently
    /// pending (including the one just prepared). Entries flagged
    /// `need_sort` are deduplicated before being handed to the snapshot, so
    /// reads concurrent with the compactor never observe an unsorted
    /// snapshot entry.
    ///
    /// `closed_wal_segments` are the WAL segment paths this snapshot is
    /// responsible for: the full closed-segment list minus whatever an
    /// earlier, still-pending snapshot already claimed.
    pub fn prepare_snapshots(&self, closed_wal_segments: &[PathBuf]) -> Vec<Snapshot> {
        self.commit_gate.acquire();

        let already_claimed: std::collections::HashSet<&PathBuf> = self
            .snapshots
            .read()
            .iter()
            .flat_map(|s| s.segment_paths.iter())
            .collect();
        let newly_claimed: Vec<PathBuf> = closed_wal_segments
            .iter()
            .filter(|p| !already_claimed.contains(p))
            .cloned()
            .collect();

        let mut store = self.store.write();
        let mut taken = std::mem::take(&mut *store);
        drop(store);

        for entry in taken.values_mut() {
            if entry.need_sort {
                entry.deduplicate();
            }
        }

        let size = taken.values().map(|e| e.size() as u64).sum::<u64>();
        let snapshot = Snapshot {
            store: Arc::new(taken),
            size,
            segment_paths: newly_claimed,
        };

        self.size.store(0, Ordering::Release);
        self.snapshots_size.fetch_add(size, Ordering::AcqRel);
        self.stats.mem_bytes.set(0);
        self.stats.disk_bytes.add(size);
        self.stats.snapshots.incr();
        *self.last_snapshot.lock() = Instant::now();

        let mut snapshots = self.snapshots.write();
        snapshots.push(snapshot);
        let result = snapshots.clone();
        tracing::debug!(snapshots = result.len(), bytes = size, "prepared cache snapshot");
        result
    }

    /// Phase 2: the compactor has durably written every prepared snapshot
    /// to TSM files and deleted the WAL segments they covered. Drop the
    /// snapshot list and release the commit gate.
    pub fn commit_snapshots(&self) {
        let mut snapshots = self.snapshots.write();
        let freed: u64 = snapshots.iter().map(|s| s.size).sum();
        snapshots.clear();
        drop(snapshots);

        self.snapshots_size.fetch_sub(freed, Ordering::AcqRel);
        self.stats.disk_bytes.sub(freed);
        self.stats.cached_bytes.sub(freed);
        self.stats.snapshots.set(0);
        tracing::debug!(bytes = freed, "committed cache snapshots");
        self.commit_gate.release();
    }

    /// Phase 3: compaction failed. Rebuild the pending-snapshot list from
    /// `retained` (whatever the caller determined still needs retrying) and
    /// release the commit gate.
    pub fn rollback_snapshots(&self, retained: Vec<Snapshot>) {
        let size: u64 = retained.iter().map(|s| s.size).sum();
        let mut snapshots = self.snapshots.write();
        let previous: u64 = snapshots.iter().map(|s| s.size).sum();
        *snapshots = retained;
        drop(snapshots);

        if size >= previous {
            self.snapshots_size.fetch_add(size - previous, Ordering::AcqRel);
        } else {
            self.snapshots_size.fetch_sub(previous - size, Ordering::AcqRel);
        }
        self.stats.snapshots.set(self.snapshots.read().len() as u64);
        tracing::warn!(bytes = size, "rolled back cache snapshots after compaction failure");
        self.commit_gate.release();
    }

    pub fn len(&self) -> usize {
        self.store.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn size(&self) -> u64 {
        self.size.load(Ordering::Acquire)
    }

    pub fn snapshots_size(&self) -> u64 {
        self.snapshots_size.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        let mut snap = self.stats.snapshot();
        snap.age_ms = self.last_snapshot.lock().elapsed().as_millis() as u64;
        snap
    }
}

fn has_duplicate_timestamps(values: &[TimestampedValue]) -> bool {
    values.windows(2).any(|w| w[0].timestamp == w[1].timestamp)
}
