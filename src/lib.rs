//! # tsdb-engine
//!
//! A write-ingest core for a time-series database: the points writer,
//! write-ahead log, in-memory cache, and series index that sit between a
//! line-protocol-speaking front end and the compaction/query layers.
//!
//! This crate is the *glue*: [`Catalog`] and [`store::LocalStore`] are a
//! minimal, in-process implementation of the `MetaClient`/`TSDBStore`
//! collaborators that [`tsdb_points_writer::PointsWriter`] expects, wired to
//! real [`tsdb_wal`], [`tsdb_cache`], and [`tsdb_index`] crates underneath.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use tsdb_core::{Point, value::FieldValue};
//! use tsdb_engine::{Catalog, LocalStore};
//! use tsdb_points_writer::{Consistency, PointsWriter, PointsWriterConfig};
//! use tsdb_wal::WalConfig;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let catalog = Arc::new(Catalog::new());
//! catalog.create_database("telemetry", "autogen", 0);
//!
//! let store = Arc::new(LocalStore::new(
//!     "./data".into(),
//!     WalConfig::default(),
//!     256 * 1024 * 1024,
//! ));
//!
//! let writer = PointsWriter::new(catalog, store, PointsWriterConfig::default());
//!
//! let points = vec![Point::new("cpu", 1_700_000_000_000_000_000)
//!     .with_tag("host", "a")
//!     .with_field("value", FieldValue::Float(0.42))];
//! writer.write_points("telemetry", "autogen", Consistency::One, points).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Components
//!
//! | Crate | Purpose | Key Types |
//! |-------|---------|-----------|
//! | `tsdb-core` | Shared data model and errors | `Point`, `FieldValue`, `Classify` |
//! | `tsdb-index` | Series/tag cardinality index | `SeriesIndex` |
//! | `tsdb-cache` | Bounded in-memory value store | `Cache`, `Snapshot` |
//! | `tsdb-wal` | Durable append log | `WalWriter`, `recover` |
//! | `tsdb-points-writer` | Fan-out write path | `PointsWriter` |
//! | `tsdb-engine` (this crate) | Catalog, shard storage, cursors | [`Catalog`], [`LocalStore`], [`AnyCursor`] |
//!
//! # Architecture
//!
//! A [`store::Shard`] owns one WAL, one cache, and one series index; a
//! [`LocalStore`] is a registry of shards keyed by shard id. `PointsWriter`
//! asks [`Catalog`] which shard group a write's timestamp belongs to, then
//! fans the write out across the shards in that group concurrently. Reads
//! go through [`AnyCursor`], which merges a shard's cache values with
//! whatever a (currently absent) TSM reader would contribute — compaction
//! and the on-disk columnar format are out of this crate's scope.

pub mod cursor;
pub mod database;
pub mod store;

pub use cursor::{AnyCursor, CursorBatch, CursorStats, SeriesCursor};
pub use database::Catalog;
pub use store::{LocalStore, Shard, ShardError, ShardStats};
