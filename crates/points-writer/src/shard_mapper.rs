//! `MapShards` (spec.md §4.1): resolve the retention policy, drop points
//! outside it, assign each surviving point to a shard group by time and a
//! shard within that group by hashing its series key.
//!
//! `ShardGroupCache` is the local, lazily-populated read-through cache of
//! shard-group placement the algorithm's step 3 requires ("ask the Meta
//! collaborator to create one"); the distillation frames shard-group
//! placement as entirely external, but without *some* local cache per
//! `(db, rp)` the binary search in step 4 has nothing to search. Grounded
//! in the original's `Store.shardGroupCache`.

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHasher};
use std::hash::{Hash, Hasher};
use tsdb_core::{Point, ShardGroup, ShardId};

use crate::collaborators::MetaClient;
use crate::error::WriteError;

/// Sorted-by-`(end, start)` shard groups for every `(db, rp)` this writer
/// has seen, refreshed from `MetaClient` on a cache miss.
#[derive(Default)]
pub struct ShardGroupCache {
    groups: RwLock<FxHashMap<(String, String), Vec<ShardGroup>>>,
}

impl ShardGroupCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn covering_group(&self, db: &str, rp: &str, t: i64) -> Option<ShardGroup> {
        let groups = self.groups.read();
        let list = groups.get(&(db.to_string(), rp.to_string()))?;
        // Sorted by end ascending: find the first group whose end is
        // strictly greater than `t`, then confirm it actually starts at or
        // before `t` (a gap in coverage is possible if shard groups were
        // pruned).
        let idx = list.partition_point(|g| g.end_ns <= t);
        list.get(idx).filter(|g| g.contains(t)).cloned()
    }

    fn insert(&self, db: &str, rp: &str, group: ShardGroup) {
        let mut groups = self.groups.write();
        let list = groups.entry((db.to_string(), rp.to_string())).or_default();
        let pos = list.partition_point(|g| g < &group);
        if list.get(pos) != Some(&group) {
            list.insert(pos, group);
        }
    }
}

/// The result of mapping one batch of points to shards.
pub struct ShardMapping {
    /// shard-id -> points routed to it.
    pub mapping: FxHashMap<ShardId, Vec<Point>>,
    /// Every shard touched, for result-collection bookkeeping.
    pub shards: Vec<ShardId>,
    /// Points outside the retention window.
    pub dropped: usize,
}

/// Hash a series key to one shard within `shards` (spec.md §4.1 step 4).
/// Uses `FxHasher` directly rather than the default `SipHash`-based
/// `RandomState`: the hash must be deterministic across calls within one
/// process so the same series key always lands on the same shard.
fn shard_for_key(key: &[u8], shards: &[ShardId]) -> ShardId {
    let mut hasher = FxHasher::default();
    key.hash(&mut hasher);
    let idx = (hasher.finish() as usize) % shards.len();
    shards[idx]
}

/// `MapShards` (spec.md §4.1): resolve the retention policy, then route
/// every point to a shard, dropping anything older than the retention
/// window.
pub fn map_shards(
    meta: &dyn MetaClient,
    shard_groups: &ShardGroupCache,
    db: &str,
    rp_name: &str,
    now_ns: i64,
    points: Vec<Point>,
) -> Result<ShardMapping, WriteError> {
    let rp = meta
        .retention_policy(db, rp_name)
        .ok_or_else(|| WriteError::RetentionPolicyNotFound {
            db: db.to_string(),
            rp: rp_name.to_string(),
        })?;

    let min_time = if rp.duration_ns == 0 {
        0
    } else {
        now_ns.saturating_sub(rp.duration_ns)
    };

    let mut dropped = 0usize;
    let mut kept: Vec<Point> = Vec::with_capacity(points.len());
    for point in points {
        if point.timestamp < min_time {
            dropped += 1;
            continue;
        }
        if shard_groups.covering_group(db, rp_name, point.timestamp).is_none() {
            let created = meta.create_shard_group(db, rp_name, point.timestamp).map_err(|_| {
                WriteError::RetentionPolicyNotFound {
                    db: db.to_string(),
                    rp: rp_name.to_string(),
                }
            })?;
            shard_groups.insert(
                db,
                rp_name,
                ShardGroup::new(created.start_ns, created.end_ns, created.shards),
            );
        }
        kept.push(point);
    }

    let mut mapping: FxHashMap<ShardId, Vec<Point>> = FxHashMap::default();
    for point in kept {
        // Every kept point now has a covering group by construction.
        let group = shard_groups
            .covering_group(db, rp_name, point.timestamp)
            .expect("shard group must exist for every kept point");
        let shard_id = shard_for_key(&point.series_key(), &group.shards);
        mapping.entry(shard_id).or_default().push(point);
    }

    let shards: Vec<ShardId> = mapping.keys().copied().collect();
    Ok(ShardMapping {
        mapping,
        shards,
        dropped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tsdb_core::value::FieldValue;

    struct FakeMeta {
        rp_duration: i64,
        created_groups: Mutex<usize>,
    }

    impl MetaClient for FakeMeta {
        fn database(&self, _name: &str) -> Option<crate::collaborators::DatabaseInfo> {
            None
        }

        fn retention_policy(&self, _db: &str, _name: &str) -> Option<crate::collaborators::RetentionPolicyInfo> {
            Some(crate::collaborators::RetentionPolicyInfo {
                name: "autogen".to_string(),
                duration_ns: self.rp_duration,
            })
        }

        fn create_shard_group(
            &self,
            _db: &str,
            _rp: &str,
            timestamp: i64,
        ) -> Result<crate::collaborators::ShardGroupInfo, crate::collaborators::MetaError> {
            let start = (timestamp / 100) * 100;
            let end = start + 100;
            let shards = vec![1u64, 2];
            *self.created_groups.lock().unwrap() += 1;
            Ok(crate::collaborators::ShardGroupInfo {
                start_ns: start,
                end_ns: end,
                shards,
            })
        }
    }

    fn point(t: i64) -> Point {
        Point::new("cpu", t).with_tag("host", "a").with_field("value", FieldValue::Integer(1))
    }

    #[test]
    fn drops_points_outside_retention_window() {
        let meta = FakeMeta {
            rp_duration: 1_000,
            created_groups: Mutex::new(0),
        };
        let cache = ShardGroupCache::new();
        let result = map_shards(&meta, &cache, "d", "autogen", 10_000, vec![point(8_000), point(9_500)]).unwrap();
        assert_eq!(result.dropped, 1);
    }

    #[test]
    fn creates_shard_group_on_first_miss_and_reuses_on_second() {
        let meta = FakeMeta {
            rp_duration: 0,
            created_groups: Mutex::new(0),
        };
        let cache = ShardGroupCache::new();
        map_shards(&meta, &cache, "d", "autogen", 0, vec![point(50), point(60)]).unwrap();
        assert_eq!(*meta.created_groups.lock().unwrap(), 1);
    }

    #[test]
    fn rp_not_found_is_an_error() {
        struct NoRp;
        impl MetaClient for NoRp {
            fn database(&self, _: &str) -> Option<crate::collaborators::DatabaseInfo> {
                None
            }
            fn retention_policy(&self, _: &str, _: &str) -> Option<crate::collaborators::RetentionPolicyInfo> {
                None
            }
            fn create_shard_group(
                &self,
                _: &str,
                _: &str,
                _: i64,
            ) -> Result<crate::collaborators::ShardGroupInfo, crate::collaborators::MetaError> {
                unreachable!()
            }
        }
        let cache = ShardGroupCache::new();
        let err = map_shards(&NoRp, &cache, "d", "missing", 0, vec![point(1)]).unwrap_err();
        assert!(matches!(err, WriteError::RetentionPolicyNotFound { .. }));
    }
}
