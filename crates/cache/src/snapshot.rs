//! A prepared-but-not-yet-committed cache snapshot (spec.md §4.3).

use crate::entry::CacheEntry;
use rustc_hash::FxHashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// One snapshot of the hot store, taken by `PrepareSnapshots`. The store is
/// `Arc`-shared rather than deep-cloned: once a snapshot is created its
/// entries are never mutated again, so handing callers a cheap `Arc` clone
/// satisfies "returns a copy of the snapshots slice" without copying every
/// series' value sequence.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub store: Arc<FxHashMap<Vec<u8>, CacheEntry>>,
    pub size: u64,
    pub segment_paths: Vec<PathBuf>,
}
