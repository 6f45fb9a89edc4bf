//! Cache loader: replay WAL segments into a fresh [`Cache`] at startup
//! (spec.md §4.3 "Loader").
//!
//! `DeleteBucketRange` entries are out of the core's scope to apply (the
//! bucket/shard-range-to-series-key mapping they require lives in the
//! root crate's shard bookkeeping); the loader surfaces them to the caller
//! instead of dropping them silently.

use rustc_hash::FxHashMap;
use std::path::Path;
use tsdb_wal::entry::WalEntry;
use tsdb_wal::recover;
use tsdb_wal::error::WalError;

use crate::cache::Cache;

/// A `DeleteBucketRange` entry recovered from the WAL but not applied by
/// the loader itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingBucketDelete {
    pub org_id: u64,
    pub bucket_id: u64,
    pub min_time: i64,
    pub max_time: i64,
}

/// Replay every segment under `wal_dir` into `cache`. Returns the
/// `DeleteBucketRange` entries encountered, in WAL order, for the caller to
/// apply once it can map them to series keys.
///
/// Per spec.md §4.3: "After loader returns, the WAL's segment list is
/// trimmed to what survived truncation" — `recover` already performs that
/// truncation as a side effect before handing entries back here.
pub fn load(wal_dir: &Path, cache: &Cache) -> Result<Vec<PendingBucketDelete>, WalError> {
    let result = recover(wal_dir)?;
    let mut deletes = Vec::new();

    for entry in result.entries {
        match entry {
            WalEntry::Write(writes) => {
                let mut batch: FxHashMap<Vec<u8>, Vec<tsdb_core::value::TimestampedValue>> =
                    FxHashMap::default();
                for sw in writes {
                    batch.entry(sw.key).or_default().extend(sw.values);
                }
                // Recovery must never fail the startup path on a memory
                // bound: the loader is reconstructing history the WAL
                // already accepted, so admission control does not apply.
                if let Err(err) = cache.write_multi(batch) {
                    tracing::warn!(error = %err, "cache loader ignoring memory bound during replay");
                }
            }
            WalEntry::DeleteBucketRange {
                org_id,
                bucket_id,
                min_time,
                max_time,
            } => deletes.push(PendingBucketDelete {
                org_id,
                bucket_id,
                min_time,
                max_time,
            }),
        }
    }

    Ok(deletes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tsdb_core::value::FieldValue;
    use tsdb_wal::entry::SeriesWrite;
    use tsdb_wal::{WalConfig, WalWriter};

    #[test]
    fn replays_writes_into_cache() {
        let dir = tempdir().unwrap();
        {
            let writer = WalWriter::open(dir.path().to_path_buf(), WalConfig::for_testing(), true).unwrap();
            for n in 0..1000i64 {
                writer
                    .write_multi(vec![SeriesWrite {
                        key: b"cpu,host=a".to_vec(),
                        values: vec![tsdb_core::value::TimestampedValue::new(
                            n,
                            FieldValue::Integer(n),
                        )],
                    }])
                    .unwrap();
            }
        }

        let cache = Cache::new(0);
        let deletes = load(dir.path(), &cache).unwrap();
        assert!(deletes.is_empty());
        assert_eq!(cache.values(b"cpu,host=a").len(), 1000);
    }

    #[test]
    fn surfaces_delete_bucket_range_entries() {
        let dir = tempdir().unwrap();
        {
            let writer = WalWriter::open(dir.path().to_path_buf(), WalConfig::for_testing(), true).unwrap();
            writer.delete_bucket_range(1, 2, 100, 200).unwrap();
        }
        let cache = Cache::new(0);
        let deletes = load(dir.path(), &cache).unwrap();
        assert_eq!(
            deletes,
            vec![PendingBucketDelete {
                org_id: 1,
                bucket_id: 2,
                min_time: 100,
                max_time: 200
            }]
        );
    }
}
