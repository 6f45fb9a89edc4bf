//! `Catalog`: the local stand-in for the metadata/catalog service the core
//! treats as an external collaborator (spec.md §1). It owns the database ->
//! retention-policy mapping and assigns shard groups, implementing the
//! narrow `MetaClient` interface `tsdb-points-writer` consumes.
//!
//! Grounded in the teacher's `engine::database::registry` pattern: a
//! `parking_lot::RwLock`-guarded map keyed by name, written only when a new
//! entry appears, read otherwise.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use tsdb_core::ShardId;
use tsdb_points_writer::collaborators::{
    DatabaseInfo, MetaClient, MetaError, RetentionPolicyInfo, ShardGroupInfo,
};

/// Default width of a shard group's time window: one hour. The original
/// derives this from each retention policy's `ShardGroupDuration`; spec.md
/// treats shard-group placement as entirely external and gives no formula,
/// so a fixed default stands in here (see DESIGN.md for this call).
pub const DEFAULT_SHARD_GROUP_DURATION_NS: i64 = 3_600 * 1_000_000_000;
/// Shards per newly created shard group.
const SHARDS_PER_GROUP: usize = 1;

struct DatabaseEntry {
    default_retention_policy: String,
    retention_policies: FxHashMap<String, RetentionPolicyInfo>,
}

/// In-memory catalog of databases, retention policies, and shard-group
/// placement. One `Catalog` is shared (via `Arc`) between the points writer
/// and whatever owns shard creation.
pub struct Catalog {
    databases: RwLock<FxHashMap<String, DatabaseEntry>>,
    /// Shard groups already handed out, keyed by `(db, rp, bucket start)` so
    /// repeated `create_shard_group` calls for the same time window are
    /// idempotent rather than minting a fresh shard every time.
    shard_groups: RwLock<FxHashMap<(String, String, i64), ShardGroupInfo>>,
    next_shard_id: AtomicU64,
    group_duration_ns: i64,
}

impl Catalog {
    pub fn new() -> Self {
        Self::with_group_duration(DEFAULT_SHARD_GROUP_DURATION_NS)
    }

    pub fn with_group_duration(group_duration_ns: i64) -> Self {
        Self {
            databases: RwLock::new(FxHashMap::default()),
            shard_groups: RwLock::new(FxHashMap::default()),
            next_shard_id: AtomicU64::new(1),
            group_duration_ns,
        }
    }

    /// Create a database with a default retention policy of `duration_ns`
    /// (0 = infinite). Idempotent: an existing database of the same name is
    /// left untouched.
    pub fn create_database(&self, name: &str, default_rp: &str, duration_ns: i64) {
        let mut databases = self.databases.write();
        databases.entry(name.to_string()).or_insert_with(|| {
            let mut retention_policies = FxHashMap::default();
            retention_policies.insert(
                default_rp.to_string(),
                RetentionPolicyInfo {
                    name: default_rp.to_string(),
                    duration_ns,
                },
            );
            DatabaseEntry {
                default_retention_policy: default_rp.to_string(),
                retention_policies,
            }
        });
    }

    /// Add (or overwrite the duration of) a non-default retention policy.
    pub fn create_retention_policy(&self, db: &str, name: &str, duration_ns: i64) {
        let mut databases = self.databases.write();
        if let Some(entry) = databases.get_mut(db) {
            entry
                .retention_policies
                .insert(name.to_string(), RetentionPolicyInfo { name: name.to_string(), duration_ns });
        }
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MetaClient for Catalog {
    fn database(&self, name: &str) -> Option<DatabaseInfo> {
        self.databases.read().get(name).map(|entry| DatabaseInfo {
            name: name.to_string(),
            default_retention_policy: entry.default_retention_policy.clone(),
        })
    }

    fn retention_policy(&self, db: &str, name: &str) -> Option<RetentionPolicyInfo> {
        self.databases.read().get(db)?.retention_policies.get(name).cloned()
    }

    fn create_shard_group(&self, db: &str, rp: &str, timestamp: i64) -> Result<ShardGroupInfo, MetaError> {
        if self.database(db).is_none() {
            return Err(MetaError::DatabaseNotFound(db.to_string()));
        }
        if self.retention_policy(db, rp).is_none() {
            return Err(MetaError::RetentionPolicyNotFound(rp.to_string()));
        }

        let bucket_start = timestamp.div_euclid(self.group_duration_ns) * self.group_duration_ns;
        let lookup_key = (db.to_string(), rp.to_string(), bucket_start);

        if let Some(existing) = self.shard_groups.read().get(&lookup_key) {
            return Ok(existing.clone());
        }

        let mut groups = self.shard_groups.write();
        if let Some(existing) = groups.get(&lookup_key) {
            return Ok(existing.clone());
        }

        let shards: Vec<ShardId> = (0..SHARDS_PER_GROUP)
            .map(|_| self.next_shard_id.fetch_add(1, Ordering::Relaxed))
            .collect();
        let info = ShardGroupInfo {
            start_ns: bucket_start,
            end_ns: bucket_start + self.group_duration_ns,
            shards,
        };
        groups.insert(lookup_key, info.clone());
        tracing::debug!(db, rp, start = info.start_ns, end = info.end_ns, "created shard group");
        Ok(info)
    }
}
