//! The collaborator interfaces the points writer consumes (spec.md §6):
//! `MetaClient`, `TSDBStore`, and the write-subscriber fan-out. These are
//! narrow traits rather than concrete types so the root crate's shard/meta
//! bookkeeping can implement them without this crate depending back on it
//! (dependency order: Series Index -> Cache -> WAL -> Points Writer).

use tsdb_core::{Point, ShardId};

/// A database's retention policies, as far as the points writer needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseInfo {
    pub name: String,
    pub default_retention_policy: String,
}

/// A single retention policy's duration, in nanoseconds (0 = infinite).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionPolicyInfo {
    pub name: String,
    pub duration_ns: i64,
}

/// A newly created (or looked-up) shard group, as `MetaClient` hands it
/// back after `create_shard_group`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardGroupInfo {
    pub start_ns: i64,
    pub end_ns: i64,
    pub shards: Vec<ShardId>,
}

/// Narrow view of the metadata/catalog service the core consumes
/// (spec.md §1 "the metadata/catalog service ... the core consumes a
/// narrow `MetaClient` interface").
pub trait MetaClient: Send + Sync {
    fn database(&self, name: &str) -> Option<DatabaseInfo>;
    fn retention_policy(&self, db: &str, name: &str) -> Option<RetentionPolicyInfo>;
    /// Create (or idempotently return) the shard group covering `timestamp`
    /// for `(db, rp)`.
    fn create_shard_group(&self, db: &str, rp: &str, timestamp: i64) -> Result<ShardGroupInfo, MetaError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetaError {
    #[error("database {0:?} not found")]
    DatabaseNotFound(String),
    #[error("retention policy {0:?} not found")]
    RetentionPolicyNotFound(String),
}

/// Per-shard write outcomes the store can report (spec.md §6).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShardWriteError {
    #[error("shard {0} not found")]
    ShardNotFound(ShardId),
    #[error("shard {0} is being deleted")]
    ShardDeletion(ShardId),
    #[error("shard write failed: {0}")]
    Other(String),
}

/// Narrow view of the local shard engine (spec.md §6 `TSDBStore`).
pub trait TSDBStore: Send + Sync {
    fn write_to_shard(&self, shard_id: ShardId, points: &[Point]) -> Result<(), ShardWriteError>;
    fn create_shard(
        &self,
        db: &str,
        rp: &str,
        shard_id: ShardId,
        enabled: bool,
    ) -> Result<(), ShardWriteError>;
}

/// A batch forwarded to every registered subscriber (spec.md §6).
#[derive(Debug, Clone)]
pub struct WritePointsRequest {
    pub database: String,
    pub retention_policy: String,
    pub points: Vec<Point>,
}
