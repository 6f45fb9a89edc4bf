//! `tsdb-cache`: the in-memory per-series value store, its snapshot/commit/
//! rollback protocol for the compactor, and the WAL-replay loader that
//! rebuilds it on startup (spec.md §4.3).

pub mod cache;
pub mod entry;
pub mod error;
pub mod gate;
pub mod loader;
pub mod snapshot;
pub mod stats;

pub use cache::Cache;
pub use entry::CacheEntry;
pub use error::CacheError;
pub use loader::{load, PendingBucketDelete};
pub use snapshot::Snapshot;
pub use stats::{CacheStats, CacheStatsSnapshot};
