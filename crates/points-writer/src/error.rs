//! Points-writer error and outcome taxonomy (spec.md §4.1, §7).

use thiserror::Error;
use tsdb_core::error::{Classify, ErrorKind};

/// The non-error outcomes of a write: either every point was accepted, or
/// some were dropped but the batch is still considered to have completed
/// (spec.md §7: "`Partial` — always preferred over `Ok` when any points
/// were dropped").
#[derive(Debug, Clone, PartialEq)]
pub enum WriteStatus {
    Ok,
    PartialWrite { reason: String, dropped_count: usize },
}

/// Hard failures of `WritePoints` (spec.md §4.1 contract).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum WriteError {
    #[error("database {0:?} not found")]
    DatabaseNotFound(String),
    #[error("retention policy {rp:?} not found on database {db:?}")]
    RetentionPolicyNotFound { db: String, rp: String },
    #[error("write timed out")]
    Timeout,
    #[error("write failed: {0}")]
    WriteFailed(String),
}

impl Classify for WriteError {
    fn kind(&self) -> ErrorKind {
        match self {
            WriteError::DatabaseNotFound(_) => ErrorKind::NotFound,
            WriteError::RetentionPolicyNotFound { .. } => ErrorKind::NotFound,
            WriteError::Timeout => ErrorKind::Transient,
            WriteError::WriteFailed(_) => ErrorKind::Durability,
        }
    }
}

/// The result a single shard's write task reports back to the collector.
#[derive(Debug, Clone)]
pub(crate) enum ShardOutcome {
    Ok,
    Dropped(usize),
    Err(WriteError),
}
