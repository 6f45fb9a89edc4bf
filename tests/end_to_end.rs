//! Concrete end-to-end scenarios (spec.md §8) exercised against the wired
//! root crate: `Catalog` + `LocalStore` + `PointsWriter`.

use std::sync::Arc;

use tempfile::tempdir;

use tsdb_core::value::FieldValue;
use tsdb_core::Point;
use tsdb_engine::{Catalog, LocalStore};
use tsdb_index::filter::{Combinator, Filter};
use tsdb_index::SeriesIndex;
use tsdb_points_writer::error::WriteStatus;
use tsdb_points_writer::{Consistency, PointsWriter, PointsWriterConfig};
use tsdb_wal::WalConfig;

fn point(measurement: &str, t: i64, v: i64) -> Point {
    Point::new(measurement, t)
        .with_tag("host", "a")
        .with_field("value", FieldValue::Integer(v))
}

fn single_shard_engine(dir: &std::path::Path) -> (Arc<Catalog>, PointsWriter) {
    let catalog = Arc::new(Catalog::new());
    catalog.create_database("d", "r", 0);
    let store = Arc::new(LocalStore::new(
        dir.to_path_buf(),
        WalConfig::for_testing(),
        0,
    ));
    let writer = PointsWriter::new(catalog.clone(), store, PointsWriterConfig::for_testing());
    (catalog, writer)
}

#[tokio::test]
async fn scenario_1_single_point_write_and_read() {
    let dir = tempdir().unwrap();
    let (_, writer) = single_shard_engine(dir.path());

    let status = writer
        .write_points_at("d", "r", vec![point("cpu", 1000, 1)], 2_000_000)
        .await
        .unwrap();
    assert_eq!(status, WriteStatus::Ok);

    let stats = writer.stats();
    assert_eq!(stats.write_req, 1);
    assert_eq!(stats.point_write_req, 1);
    assert_eq!(stats.write_ok, 1);
}

#[tokio::test]
async fn scenario_2_out_of_order_coalesce_last_write_wins() {
    let dir = tempdir().unwrap();
    let catalog = Arc::new(Catalog::with_group_duration(1_000_000_000));
    catalog.create_database("d", "r", 0);
    let store = Arc::new(LocalStore::new(dir.path().to_path_buf(), WalConfig::for_testing(), 0));
    let writer = PointsWriter::new(catalog.clone(), store.clone(), PointsWriterConfig::for_testing());

    writer
        .write_points_at("d", "r", vec![point("m", 100, 1)], 500)
        .await
        .unwrap();
    writer
        .write_points_at("d", "r", vec![point("m", 100, 2)], 500)
        .await
        .unwrap();

    // Single shard group/shard in this engine configuration: shard id 1.
    let shard = store.shard(1).unwrap();
    let values = shard.values(b"m,host=a");
    assert_eq!(values.len(), 1);
    assert_eq!(values[0].timestamp, 100);
    assert_eq!(values[0].value, FieldValue::Integer(2));
}

#[tokio::test]
async fn scenario_3_retention_drop_is_partial_write() {
    let dir = tempdir().unwrap();
    let one_hour_ns = 3_600 * 1_000_000_000i64;
    let catalog = Arc::new(Catalog::new());
    catalog.create_database("d", "r", one_hour_ns);
    let store = Arc::new(LocalStore::new(dir.path().to_path_buf(), WalConfig::for_testing(), 0));
    let writer = PointsWriter::new(catalog, store.clone(), PointsWriterConfig::for_testing());

    let now = 10 * one_hour_ns;
    let old_point = point("cpu", now - 2 * one_hour_ns, 1);
    let fresh_point = point("cpu", now, 2);

    let status = writer
        .write_points_at("d", "r", vec![old_point, fresh_point], now)
        .await
        .unwrap();

    match status {
        WriteStatus::PartialWrite { dropped_count, reason } => {
            assert_eq!(dropped_count, 1);
            assert_eq!(reason, "points beyond retention policy");
        }
        WriteStatus::Ok => panic!("expected a partial write"),
    }

    let shard = store.shard(1).unwrap();
    let values = shard.values(b"cpu,host=a");
    assert_eq!(values.len(), 1);
    assert_eq!(values[0].timestamp, now);
}

#[tokio::test]
async fn scenario_4_wal_crash_recovery() {
    let dir = tempdir().unwrap();
    let wal_dir = dir.path().join("wal");

    {
        let shard = tsdb_engine::Shard::open(wal_dir.clone(), 1, WalConfig::for_testing(), 0).unwrap();
        let batch_one: Vec<Point> = (0..500).map(|n| point("cpu", n, n)).collect();
        let batch_two: Vec<Point> = (500..1000).map(|n| point("cpu", n, n)).collect();
        shard.write(&batch_one).unwrap();
        shard.write(&batch_two).unwrap();
        // Dropped without closing: simulates a crash before a clean shutdown.
    }

    let shard = tsdb_engine::Shard::open(wal_dir, 1, WalConfig::for_testing(), 0).unwrap();
    let values = shard.values(b"cpu,host=a");
    assert_eq!(values.len(), 1000);
    for (i, v) in values.iter().enumerate() {
        assert_eq!(v.timestamp, i as i64);
    }
}

#[tokio::test]
async fn scenario_5_snapshot_during_writes_stays_consistent() {
    use tsdb_cache::Cache;

    let cache = Arc::new(Cache::new(0));
    let key = b"m,host=a".to_vec();

    let writer_cache = cache.clone();
    let writer_key = key.clone();
    let writer = tokio::task::spawn_blocking(move || {
        for n in 0..10_000i64 {
            // 50% duplicate timestamps: every other write reuses the
            // previous timestamp.
            let t = (n / 2) * 2;
            writer_cache
                .write(writer_key.clone(), vec![tsdb_core::value::TimestampedValue::new(
                    t,
                    FieldValue::Integer(n),
                )])
                .unwrap();
        }
    });

    let compactor_cache = cache.clone();
    let compactor = tokio::task::spawn_blocking(move || {
        for _ in 0..5 {
            std::thread::yield_now();
            let snaps = compactor_cache.prepare_snapshots(&[]);
            if !snaps.is_empty() {
                compactor_cache.commit_snapshots();
            }
        }
    });

    let (w, c) = tokio::join!(writer, compactor);
    w.unwrap();
    c.unwrap();

    let values = cache.values(&key);
    assert!(values.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
}

#[test]
fn scenario_6_tag_predicate_intersection() {
    let index = SeriesIndex::new();
    index.add_series("m", 1, b"m,a=1,b=x".to_vec(), vec![("a".into(), "1".into()), ("b".into(), "x".into())]);
    index.add_series("m", 2, b"m,a=1,b=y".to_vec(), vec![("a".into(), "1".into()), ("b".into(), "y".into())]);
    index.add_series("m", 3, b"m,a=2,b=x".to_vec(), vec![("a".into(), "2".into()), ("b".into(), "x".into())]);

    let a1_and_bx = index.series_ids_by_filters(
        "m",
        &[Filter::equals("a", "1"), Filter::equals("b", "x")],
        Combinator::And,
    );
    assert_eq!(a1_and_bx, vec![1]);

    let a1 = index.series_ids_by_filters("m", &[Filter::equals("a", "1")], Combinator::And);
    assert_eq!(a1, vec![1, 2]);

    let not_bx = index.series_ids_by_filters("m", &[Filter::not_equals("b", "x")], Combinator::And);
    assert_eq!(not_bx, vec![2]);
}
