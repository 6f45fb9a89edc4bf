//! `Shard` and `LocalStore`: the root crate's glue between the points
//! writer's `TSDBStore` collaborator interface and the WAL/Cache/Index
//! crates underneath it (spec.md §2 data-flow diagram: `Shard Mapper ->
//! per-shard goroutines -> {WAL.append, Cache.write}`).
//!
//! Grounded in the teacher's `strata-storage::sharded` module: a
//! `dashmap::DashMap` registry of shard state, created lazily and looked up
//! by id without a global lock serializing unrelated shards.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use rustc_hash::FxHashMap;
use thiserror::Error;

use tsdb_cache::{Cache, CacheError};
use tsdb_core::error::{Classify, ErrorKind};
use tsdb_core::value::TimestampedValue;
use tsdb_core::{Point, ShardId};
use tsdb_index::SeriesIndex;
use tsdb_points_writer::collaborators::{ShardWriteError, TSDBStore};
use tsdb_wal::entry::SeriesWrite;
use tsdb_wal::{WalConfig, WalError, WalWriter};

#[derive(Debug, Error)]
pub enum ShardError {
    #[error("wal error: {0}")]
    Wal(#[from] WalError),
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
}

impl Classify for ShardError {
    fn kind(&self) -> ErrorKind {
        match self {
            ShardError::Wal(e) => e.kind(),
            ShardError::Cache(e) => e.kind(),
        }
    }
}

/// A single physical storage unit: its own WAL, cache, and series index
/// (spec.md GLOSSARY "Shard"). Series ids are local to a shard's index —
/// the original rebuilds the index from TSM file metadata on restart, which
/// is out of this core's scope (spec.md §1), so here a fresh `Shard::open`
/// starts with an empty index and re-assigns ids as points arrive; the
/// cache is still made whole from the WAL, which is the durability
/// guarantee spec.md §4.3's loader actually promises.
pub struct Shard {
    id: ShardId,
    wal: WalWriter,
    cache: Cache,
    index: SeriesIndex,
}

impl Shard {
    /// Open (or create) the shard rooted at `wal_dir`, replaying any
    /// existing WAL segments into a fresh cache before accepting writes.
    pub fn open(wal_dir: PathBuf, id: ShardId, wal_config: WalConfig, cache_max_size: u64) -> Result<Self, ShardError> {
        let cache = Cache::new(cache_max_size);
        let pending_deletes = tsdb_cache::load(&wal_dir, &cache)?;
        for delete in pending_deletes {
            tracing::warn!(
                org_id = delete.org_id,
                bucket_id = delete.bucket_id,
                "shard loader found a DeleteBucketRange entry; bucket-range deletion is handled above the core"
            );
        }

        let wal = WalWriter::open(wal_dir, wal_config, true)?;
        Ok(Self {
            id,
            wal,
            cache,
            index: SeriesIndex::new(),
        })
    }

    pub fn id(&self) -> ShardId {
        self.id
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn index(&self) -> &SeriesIndex {
        &self.index
    }

    /// Apply one batch of points: register each series and its fields in
    /// the index, durably log the accepted values, then make them
    /// queryable in the cache. Fields that fail `create_field` (a type
    /// conflict, or the measurement's 256th distinct field) are dropped
    /// individually rather than failing the whole point, matching spec.md
    /// §1's framing of schema enforcement as "field-type-per-measurement"
    /// rather than whole-batch validation.
    pub fn write(&self, points: &[Point]) -> Result<(), ShardError> {
        let mut grouped: FxHashMap<Vec<u8>, Vec<TimestampedValue>> = FxHashMap::default();

        for point in points {
            let key = point.series_key();
            let tags: Vec<(String, String)> =
                point.tags.iter().map(|t| (t.key.clone(), t.value.clone())).collect();
            self.index.series_id_for(&point.measurement, key.clone(), tags);

            for (name, value) in &point.fields {
                match self.index.create_field(&point.measurement, name, value.field_type()) {
                    Ok(_) => grouped
                        .entry(key.clone())
                        .or_default()
                        .push(TimestampedValue::new(point.timestamp, value.clone())),
                    Err(err) => tracing::warn!(
                        measurement = %point.measurement,
                        field = %name,
                        error = %err,
                        "dropping field write: schema conflict"
                    ),
                }
            }
        }

        if grouped.is_empty() {
            return Ok(());
        }

        let writes: Vec<SeriesWrite> = grouped
            .iter()
            .map(|(key, values)| SeriesWrite { key: key.clone(), values: values.clone() })
            .collect();
        self.wal.write_multi(writes)?;
        self.cache.write_multi(grouped)?;
        Ok(())
    }

    /// The merged, sorted, deduplicated value sequence for one series key,
    /// as the query engine would request via the cursor contract (spec.md
    /// §4.3 "Read path").
    pub fn values(&self, series_key: &[u8]) -> Vec<TimestampedValue> {
        self.cache.values(series_key)
    }

    /// Open a typed cursor over one series/field's values in `[min_time,
    /// max_time)`, merging this shard's cache with `tsm_values` (spec.md §9
    /// Design Note 2: the field's declared type picks the concrete cursor,
    /// no runtime reflection). `None` if the field was never created on
    /// `measurement`.
    pub fn open_cursor(
        &self,
        measurement: &str,
        field_name: &str,
        series_key: &[u8],
        min_time: i64,
        max_time: i64,
        tsm_values: Vec<(i64, tsdb_core::value::FieldValue)>,
    ) -> Option<crate::cursor::AnyCursor> {
        let field = self.index.field(measurement, field_name)?;
        let cache_values = self.cache.values(series_key);
        Some(crate::cursor::AnyCursor::open(
            field.field_type,
            cache_values,
            tsm_values,
            min_time,
            max_time,
        ))
    }

    pub fn stats(&self) -> ShardStats {
        ShardStats {
            wal: self.wal.stats(),
            cache: self.cache.stats(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ShardStats {
    pub wal: tsdb_wal::WalStatsSnapshot,
    pub cache: tsdb_cache::CacheStatsSnapshot,
}

/// Implements `TSDBStore`: owns every shard of one engine instance, keyed
/// by id, and lazily creates a shard's on-disk directory and WAL on first
/// `create_shard` call (spec.md §6 persisted layout `data/<db>/<rp>/
/// <shardID>/wal/`).
pub struct LocalStore {
    root_dir: PathBuf,
    wal_config: WalConfig,
    cache_max_size: u64,
    shards: DashMap<ShardId, Arc<Shard>>,
    /// Shards simulating a pending TSM-compaction-triggered deletion, for
    /// exercising `ShardWriteError::ShardDeletion` -> `PartialWrite`
    /// (spec.md §4.1). Real shard deletion is a catalog operation external
    /// to this core's scope.
    deleting: DashSet<ShardId>,
}

impl LocalStore {
    pub fn new(root_dir: PathBuf, wal_config: WalConfig, cache_max_size: u64) -> Self {
        Self {
            root_dir,
            wal_config,
            cache_max_size,
            shards: DashMap::new(),
            deleting: DashSet::new(),
        }
    }

    pub fn shard(&self, id: ShardId) -> Option<Arc<Shard>> {
        self.shards.get(&id).map(|entry| entry.clone())
    }

    /// Mark `id` as undergoing deletion: subsequent writes report
    /// `ShardDeletion` instead of reaching the shard.
    pub fn mark_deleting(&self, id: ShardId) {
        self.deleting.insert(id);
    }

    fn shard_dir(&self, db: &str, rp: &str, shard_id: ShardId) -> PathBuf {
        self.root_dir.join(db).join(rp).join(shard_id.to_string()).join("wal")
    }
}

impl TSDBStore for LocalStore {
    fn write_to_shard(&self, shard_id: ShardId, points: &[Point]) -> Result<(), ShardWriteError> {
        if self.deleting.contains(&shard_id) {
            return Err(ShardWriteError::ShardDeletion(shard_id));
        }
        let shard = self.shard(shard_id).ok_or(ShardWriteError::ShardNotFound(shard_id))?;
        shard.write(points).map_err(|e| ShardWriteError::Other(e.to_string()))
    }

    fn create_shard(&self, db: &str, rp: &str, shard_id: ShardId, _enabled: bool) -> Result<(), ShardWriteError> {
        if self.shards.contains_key(&shard_id) {
            return Ok(());
        }
        let dir = self.shard_dir(db, rp, shard_id);
        let shard = Shard::open(dir, shard_id, self.wal_config.clone(), self.cache_max_size)
            .map_err(|e| ShardWriteError::Other(e.to_string()))?;
        self.shards.insert(shard_id, Arc::new(shard));
        Ok(())
    }
}

/// All open shard directories currently on disk for one `LocalStore` root,
/// for tests and operators inspecting layout.
pub fn shard_root(root_dir: &Path, db: &str, rp: &str, shard_id: ShardId) -> PathBuf {
    root_dir.join(db).join(rp).join(shard_id.to_string())
}
