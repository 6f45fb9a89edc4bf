//! `tsdb-points-writer`: accepts a batch of points, maps them to shards,
//! fans the write out in parallel, and collects per-shard outcomes under a
//! whole-batch timeout (spec.md §4.1).
//!
//! Dependency order (spec.md §2): this crate sits on top of `tsdb-core`
//! only — the WAL and Cache are not touched directly here. Durability and
//! queryability happen behind `TSDBStore::write_to_shard`, which the root
//! crate implements by owning a `Shard` (wal + cache + index) per shard id.

pub mod collaborators;
pub mod config;
pub mod error;
pub mod shard_mapper;
pub mod stats;
pub mod subscriber;

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::{mpsc, Semaphore};

use tsdb_core::Point;

use collaborators::{MetaClient, ShardWriteError, TSDBStore, WritePointsRequest};
use config::PointsWriterConfig;
use error::{ShardOutcome, WriteError, WriteStatus};
use shard_mapper::{map_shards, ShardGroupCache};
use stats::{PointsWriterStats, PointsWriterStatsSnapshot};
use subscriber::Subscribers;

/// Replication consistency level requested by the client. The core has no
/// multi-node replication (spec.md §1 Non-goals), so this is accepted for
/// interface compatibility and otherwise unused: every write is applied
/// locally exactly once, which already satisfies `One`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consistency {
    Any,
    One,
    Quorum,
    All,
}

impl Default for Consistency {
    fn default() -> Self {
        Consistency::One
    }
}

/// Accepts batches of points, routes them to shards, and fans the write out
/// to `TSDBStore` in parallel (spec.md §4.1).
pub struct PointsWriter {
    meta: Arc<dyn MetaClient>,
    store: Arc<dyn TSDBStore>,
    shard_groups: ShardGroupCache,
    subscribers: Subscribers,
    admission: Arc<Semaphore>,
    config: PointsWriterConfig,
    stats: PointsWriterStats,
}

impl PointsWriter {
    pub fn new(meta: Arc<dyn MetaClient>, store: Arc<dyn TSDBStore>, config: PointsWriterConfig) -> Self {
        let admission = Arc::new(Semaphore::new(config.resolved_admission_limit()));
        Self {
            meta,
            store,
            shard_groups: ShardGroupCache::new(),
            subscribers: Subscribers::new(),
            admission,
            config,
            stats: PointsWriterStats::default(),
        }
    }

    pub fn add_write_subscriber(&self, sender: mpsc::Sender<WritePointsRequest>) {
        self.subscribers.add(sender);
    }

    pub fn stats(&self) -> PointsWriterStatsSnapshot {
        self.stats.snapshot()
    }

    /// `PointsWriter.WritePoints` (spec.md §6), timestamped with the
    /// wall-clock `now`.
    pub async fn write_points(
        &self,
        database: &str,
        retention_policy: &str,
        _consistency: Consistency,
        points: Vec<Point>,
    ) -> Result<WriteStatus, WriteError> {
        let now_ns = wall_clock_now_ns();
        self.write_points_at(database, retention_policy, points, now_ns).await
    }

    /// Same as [`Self::write_points`] but with an explicit `now_ns`, so
    /// retention-window behavior (spec.md scenario 3) can be driven
    /// deterministically in tests without sleeping real wall-clock time.
    pub async fn write_points_at(
        &self,
        database: &str,
        retention_policy: &str,
        points: Vec<Point>,
        now_ns: i64,
    ) -> Result<WriteStatus, WriteError> {
        self.stats.write_req.incr();
        self.stats.point_write_req.add(points.len() as u64);

        if points.is_empty() {
            // spec.md §4.1 "Empty batch: returns Ok without touching any shard."
            self.stats.write_ok.incr();
            return Ok(WriteStatus::Ok);
        }

        let result = self.write_points_inner(database, retention_policy, points, now_ns).await;
        match &result {
            Ok(WriteStatus::Ok) => self.stats.write_ok.incr(),
            Ok(WriteStatus::PartialWrite { .. }) => self.stats.write_ok.incr(),
            Err(WriteError::Timeout) => self.stats.write_timeout.incr(),
            Err(_) => self.stats.write_err.incr(),
        }
        result
    }

    async fn write_points_inner(
        &self,
        database: &str,
        retention_policy: &str,
        points: Vec<Point>,
        now_ns: i64,
    ) -> Result<WriteStatus, WriteError> {
        let db_info = self
            .meta
            .database(database)
            .ok_or_else(|| WriteError::DatabaseNotFound(database.to_string()))?;

        let rp_name = if retention_policy.is_empty() {
            db_info.default_retention_policy.clone()
        } else {
            retention_policy.to_string()
        };

        let mapping = map_shards(
            self.meta.as_ref(),
            &self.shard_groups,
            database,
            &rp_name,
            now_ns,
            points,
        )?;

        let dropped_by_retention = mapping.dropped;

        if mapping.mapping.is_empty() {
            return if dropped_by_retention > 0 {
                self.stats.write_dropped.add(dropped_by_retention as u64);
                Ok(WriteStatus::PartialWrite {
                    reason: "points beyond retention policy".to_string(),
                    dropped_count: dropped_by_retention,
                })
            } else {
                Ok(WriteStatus::Ok)
            };
        }

        let shard_count = mapping.mapping.len();
        let (tx, mut rx) = mpsc::channel::<ShardOutcome>(shard_count.max(1));

        // Notify subscribers with the batch as mapped (best-effort,
        // non-blocking fan-out per spec.md §6), before the per-shard points
        // are handed off to the fan-out tasks below.
        if !self.subscribers.is_empty() {
            let all_points: Vec<Point> = mapping.mapping.values().flatten().cloned().collect();
            let request = WritePointsRequest {
                database: database.to_string(),
                retention_policy: rp_name.clone(),
                points: all_points,
            };
            self.subscribers.notify(&request, &self.stats);
        }

        // Fan out: one task per touched shard. Each task acquires an
        // admission permit before its blocking call into `TSDBStore`,
        // bounding concurrent WAL-encoding work at `2 x CPU` (spec.md §5).
        for (shard_id, shard_points) in mapping.mapping {
            let store = self.store.clone();
            let admission = self.admission.clone();
            let db = database.to_string();
            let rp = rp_name.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let outcome = run_shard_write(store, admission, db, rp, shard_id, shard_points).await;
                let _ = tx.send(outcome).await;
            });
        }
        drop(tx);

        let mut dropped_total = dropped_by_retention;
        let mut partial_reason: Option<String> = None;
        let mut received = 0usize;
        let mut hard_error: Option<WriteError> = None;

        let deadline = tokio::time::Instant::now() + self.config.write_timeout;
        while received < shard_count {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match tokio::time::timeout(remaining, rx.recv()).await {
                Ok(Some(outcome)) => {
                    received += 1;
                    match outcome {
                        ShardOutcome::Ok => {}
                        ShardOutcome::Dropped(n) => {
                            dropped_total += n;
                            partial_reason.get_or_insert_with(|| "shard deletion in progress".to_string());
                        }
                        ShardOutcome::Err(e) => {
                            hard_error.get_or_insert(e);
                        }
                    }
                    if hard_error.is_some() {
                        // First non-partial error: return immediately. The
                        // remaining tasks keep running against `store` and
                        // `tx`; their sends are simply dropped once `rx` is
                        // gone (spec.md §4.1 "other tasks continue in
                        // background to drain cleanly").
                        break;
                    }
                }
                Ok(None) => break, // all senders dropped before shard_count results arrived
                Err(_) => {
                    tracing::warn!(database, %rp_name, shard_count, received, "write batch timed out");
                    return Err(WriteError::Timeout);
                }
            }
        }

        if let Some(err) = hard_error {
            tracing::error!(database, %rp_name, error = %err, "write batch failed");
            return Err(err);
        }

        if dropped_total > 0 {
            let reason = partial_reason.unwrap_or_else(|| "points beyond retention policy".to_string());
            tracing::debug!(database, %rp_name, dropped_total, %reason, "write batch partially applied");
            self.stats.write_dropped.add(dropped_total as u64);
            Ok(WriteStatus::PartialWrite {
                reason,
                dropped_count: dropped_total,
            })
        } else {
            Ok(WriteStatus::Ok)
        }
    }
}

/// One shard's fan-out write, including the `ShardNotFound` ->
/// create-and-retry-once policy and `ShardDeletion` -> dropped-count
/// conversion (spec.md §4.1 "Fan-out write").
async fn run_shard_write(
    store: Arc<dyn TSDBStore>,
    admission: Arc<Semaphore>,
    db: String,
    rp: String,
    shard_id: u64,
    points: Vec<Point>,
) -> ShardOutcome {
    let first = blocking_write(&store, &admission, shard_id, points.clone()).await;

    match first {
        Ok(()) => ShardOutcome::Ok,
        Err(ShardWriteError::ShardDeletion(_)) => ShardOutcome::Dropped(points.len()),
        Err(ShardWriteError::ShardNotFound(_)) => {
            let store_for_create = store.clone();
            let permit = match admission.clone().acquire_owned().await {
                Ok(p) => p,
                Err(_) => return ShardOutcome::Err(WriteError::WriteFailed("admission limiter closed".into())),
            };
            let created = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                store_for_create.create_shard(&db, &rp, shard_id, true)
            })
            .await;
            match created {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return ShardOutcome::Err(WriteError::WriteFailed(e.to_string())),
                Err(_) => {
                    return ShardOutcome::Err(WriteError::WriteFailed(format!(
                        "create_shard task panicked for shard {shard_id}"
                    )))
                }
            }

            match blocking_write(&store, &admission, shard_id, points.clone()).await {
                Ok(()) => ShardOutcome::Ok,
                Err(ShardWriteError::ShardDeletion(_)) => ShardOutcome::Dropped(points.len()),
                Err(ShardWriteError::ShardNotFound(id)) => {
                    ShardOutcome::Err(WriteError::WriteFailed(format!("shard {id} not found after creation")))
                }
                Err(ShardWriteError::Other(msg)) => ShardOutcome::Err(WriteError::WriteFailed(msg)),
            }
        }
        Err(ShardWriteError::Other(msg)) => ShardOutcome::Err(WriteError::WriteFailed(msg)),
    }
}

async fn blocking_write(
    store: &Arc<dyn TSDBStore>,
    admission: &Arc<Semaphore>,
    shard_id: u64,
    points: Vec<Point>,
) -> Result<(), ShardWriteError> {
    let permit = admission
        .clone()
        .acquire_owned()
        .await
        .map_err(|_| ShardWriteError::Other("admission limiter closed".into()))?;
    let store = store.clone();
    let result = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        store.write_to_shard(shard_id, &points)
    })
    .await;
    match result {
        Ok(r) => r,
        Err(_) => Err(ShardWriteError::Other(format!("write task panicked for shard {shard_id}"))),
    }
}

fn wall_clock_now_ns() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_nanos() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use collaborators::{DatabaseInfo, MetaError, RetentionPolicyInfo, ShardGroupInfo};
    use parking_lot::Mutex;
    use std::collections::HashMap as StdHashMap;
    use tsdb_core::value::FieldValue;

    struct FakeMeta {
        rp_duration: i64,
    }

    impl MetaClient for FakeMeta {
        fn database(&self, name: &str) -> Option<DatabaseInfo> {
            Some(DatabaseInfo {
                name: name.to_string(),
                default_retention_policy: "autogen".to_string(),
            })
        }

        fn retention_policy(&self, _db: &str, name: &str) -> Option<RetentionPolicyInfo> {
            Some(RetentionPolicyInfo {
                name: name.to_string(),
                duration_ns: self.rp_duration,
            })
        }

        fn create_shard_group(&self, _db: &str, _rp: &str, timestamp: i64) -> Result<ShardGroupInfo, MetaError> {
            let start = (timestamp / 1_000) * 1_000;
            Ok(ShardGroupInfo {
                start_ns: start,
                end_ns: start + 1_000,
                shards: vec![1],
            })
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        written: Mutex<StdHashMap<u64, Vec<Point>>>,
        created: Mutex<Vec<u64>>,
        fail_first_write: Mutex<bool>,
    }

    impl TSDBStore for RecordingStore {
        fn write_to_shard(&self, shard_id: u64, points: &[Point]) -> Result<(), ShardWriteError> {
            if *self.fail_first_write.lock() {
                *self.fail_first_write.lock() = false;
                return Err(ShardWriteError::ShardNotFound(shard_id));
            }
            self.written.lock().entry(shard_id).or_default().extend(points.iter().cloned());
            Ok(())
        }

        fn create_shard(&self, _db: &str, _rp: &str, shard_id: u64, _enabled: bool) -> Result<(), ShardWriteError> {
            self.created.lock().push(shard_id);
            Ok(())
        }
    }

    fn point(t: i64) -> Point {
        Point::new("cpu", t).with_tag("host", "a").with_field("value", FieldValue::Integer(1))
    }

    #[tokio::test]
    async fn empty_batch_is_ok_and_touches_nothing() {
        let writer = PointsWriter::new(
            Arc::new(FakeMeta { rp_duration: 0 }),
            Arc::new(RecordingStore::default()),
            PointsWriterConfig::for_testing(),
        );
        let status = writer
            .write_points("d", "autogen", Consistency::One, Vec::new())
            .await
            .unwrap();
        assert_eq!(status, WriteStatus::Ok);
    }

    #[tokio::test]
    async fn successful_write_reaches_the_store() {
        let store = Arc::new(RecordingStore::default());
        let writer = PointsWriter::new(
            Arc::new(FakeMeta { rp_duration: 0 }),
            store.clone(),
            PointsWriterConfig::for_testing(),
        );
        let status = writer
            .write_points_at("d", "autogen", vec![point(10), point(20)], 10_000)
            .await
            .unwrap();
        assert_eq!(status, WriteStatus::Ok);
        assert_eq!(store.written.lock().values().map(|v| v.len()).sum::<usize>(), 2);
    }

    #[tokio::test]
    async fn subscriber_receives_the_actual_points_written() {
        let writer = PointsWriter::new(
            Arc::new(FakeMeta { rp_duration: 0 }),
            Arc::new(RecordingStore::default()),
            PointsWriterConfig::for_testing(),
        );
        let (tx, mut rx) = mpsc::channel(1);
        writer.add_write_subscriber(tx);

        writer
            .write_points_at("d", "autogen", vec![point(10), point(20)], 10_000)
            .await
            .unwrap();

        let request = rx.try_recv().unwrap();
        assert_eq!(request.points.len(), 2);
        assert_eq!(request.points[0].timestamp, 10);
        assert_eq!(request.points[1].timestamp, 20);
    }

    #[tokio::test]
    async fn dropped_points_are_counted_in_write_dropped_stat() {
        let writer = PointsWriter::new(
            Arc::new(FakeMeta { rp_duration: 3_600 }),
            Arc::new(RecordingStore::default()),
            PointsWriterConfig::for_testing(),
        );
        // now = 10_000, min_time = 6_400: one point (1_000) is too old.
        writer
            .write_points_at("d", "autogen", vec![point(1_000), point(9_999)], 10_000)
            .await
            .unwrap();
        assert_eq!(writer.stats().write_dropped, 1);
    }

    #[tokio::test]
    async fn retention_drop_is_partial_write() {
        let writer = PointsWriter::new(
            Arc::new(FakeMeta { rp_duration: 3_600 }),
            Arc::new(RecordingStore::default()),
            PointsWriterConfig::for_testing(),
        );
        // now = 10_000, min_time = 6_400: one point (1_000) is too old.
        let status = writer
            .write_points_at("d", "autogen", vec![point(1_000), point(9_999)], 10_000)
            .await
            .unwrap();
        match status {
            WriteStatus::PartialWrite { dropped_count, .. } => assert_eq!(dropped_count, 1),
            other => panic!("expected PartialWrite, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn shard_not_found_creates_then_retries_once() {
        let store = Arc::new(RecordingStore::default());
        *store.fail_first_write.lock() = true;
        let writer = PointsWriter::new(
            Arc::new(FakeMeta { rp_duration: 0 }),
            store.clone(),
            PointsWriterConfig::for_testing(),
        );
        let status = writer
            .write_points_at("d", "autogen", vec![point(1)], 0)
            .await
            .unwrap();
        assert_eq!(status, WriteStatus::Ok);
        assert_eq!(store.created.lock().len(), 1);
    }

    #[tokio::test]
    async fn timeout_when_store_never_responds() {
        struct HangingStore;
        impl TSDBStore for HangingStore {
            fn write_to_shard(&self, _shard_id: u64, _points: &[Point]) -> Result<(), ShardWriteError> {
                std::thread::sleep(std::time::Duration::from_secs(5));
                Ok(())
            }
            fn create_shard(&self, _db: &str, _rp: &str, _shard_id: u64, _enabled: bool) -> Result<(), ShardWriteError> {
                Ok(())
            }
        }
        let writer = PointsWriter::new(
            Arc::new(FakeMeta { rp_duration: 0 }),
            Arc::new(HangingStore),
            PointsWriterConfig::for_testing(),
        );
        let err = writer
            .write_points_at("d", "autogen", vec![point(1)], 0)
            .await
            .unwrap_err();
        assert!(matches!(err, WriteError::Timeout));
        assert_eq!(writer.stats().write_timeout, 1);
    }

    #[tokio::test]
    async fn missing_database_is_an_error() {
        struct NoDb;
        impl MetaClient for NoDb {
            fn database(&self, _: &str) -> Option<DatabaseInfo> {
                None
            }
            fn retention_policy(&self, _: &str, _: &str) -> Option<RetentionPolicyInfo> {
                None
            }
            fn create_shard_group(&self, _: &str, _: &str, _: i64) -> Result<ShardGroupInfo, MetaError> {
                unreachable!()
            }
        }
        let writer = PointsWriter::new(Arc::new(NoDb), Arc::new(RecordingStore::default()), PointsWriterConfig::for_testing());
        let err = writer
            .write_points("missing", "autogen", Consistency::One, vec![point(1)])
            .await
            .unwrap_err();
        assert!(matches!(err, WriteError::DatabaseNotFound(_)));
    }
}
