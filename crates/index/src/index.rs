//! The series index: measurement -> series map, tag-key/value inverted
//! index, and the sorted-set algebra that backs tag-predicate queries
//! (spec.md §4.4).
//!
//! Concurrency matches the teacher's `UnifiedStorage`: a `parking_lot::RwLock`
//! around the top-level measurement map, written only when a brand-new
//! measurement name appears, plus one `RwLock` per measurement so concurrent
//! writers to different measurements never contend.

use crate::error::IndexError;
use crate::filter::{Combinator, Filter};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tsdb_core::measurement::{FieldDef, Measurement, SeriesRecord};
use tsdb_core::series_key::SeriesId;
use tsdb_core::setops;
use tsdb_core::value::FieldType;

/// In-memory cardinality index shared by every shard of one engine instance.
pub struct SeriesIndex {
    measurements: RwLock<FxHashMap<String, Arc<RwLock<Measurement>>>>,
    /// Global series-key -> series-id table, used to hand out monotonic ids
    /// on first write and to make `series_id_for` idempotent across
    /// measurements without needing a lock on every measurement to check.
    by_key: RwLock<FxHashMap<Vec<u8>, SeriesId>>,
    next_id: AtomicU32,
}

impl Default for SeriesIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl SeriesIndex {
    pub fn new() -> Self {
        Self {
            measurements: RwLock::new(FxHashMap::default()),
            by_key: RwLock::new(FxHashMap::default()),
            next_id: AtomicU32::new(1),
        }
    }

    fn measurement_handle(&self, name: &str) -> Arc<RwLock<Measurement>> {
        if let Some(existing) = self.measurements.read().get(name) {
            return existing.clone();
        }
        let mut measurements = self.measurements.write();
        measurements
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(Measurement::new(name))))
            .clone()
    }

    fn find_measurement(&self, name: &str) -> Option<Arc<RwLock<Measurement>>> {
        self.measurements.read().get(name).cloned()
    }

    /// Assign a series-id if `key` has never been seen before, and insert it
    /// into `measurement`'s index. Returns the id either way (idempotent).
    pub fn series_id_for(
        &self,
        measurement: &str,
        key: Vec<u8>,
        tags: Vec<(String, String)>,
    ) -> SeriesId {
        if let Some(&id) = self.by_key.read().get(&key) {
            return id;
        }

        let mut by_key = self.by_key.write();
        if let Some(&id) = by_key.get(&key) {
            return id;
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        by_key.insert(key.clone(), id);
        drop(by_key);

        self.add_series(measurement, id, key, tags);
        id
    }

    /// `AddSeries(measurement, seriesID, tags)` — idempotent; used both by
    /// `series_id_for` and directly during WAL/cache-replay recovery, where
    /// the id is already known from a prior run.
    pub fn add_series(
        &self,
        measurement: &str,
        id: SeriesId,
        key: Vec<u8>,
        tags: Vec<(String, String)>,
    ) {
        let handle = self.measurement_handle(measurement);
        handle.write().add_series(id, key, tags);
    }

    /// Index-side bookkeeping for a deleted series: removes it from
    /// `seriesIDs` and every inverted-index bucket it appears in. Does not
    /// touch cache or TSM state.
    pub fn drop_series(&self, measurement: &str, ids: &[SeriesId]) {
        let Some(handle) = self.find_measurement(measurement) else {
            return;
        };
        let mut m = handle.write();
        for &id in ids {
            if let Some(record) = m.series(id) {
                self.by_key.write().remove(&record.key);
            }
            m.drop_series(id);
        }
    }

    pub fn create_field(
        &self,
        measurement: &str,
        name: &str,
        field_type: FieldType,
    ) -> Result<FieldDef, IndexError> {
        let handle = self.measurement_handle(measurement);
        let mut m = handle.write();
        m.create_field(name, field_type)
            .map(Clone::clone)
            .map_err(IndexError::from)
    }

    pub fn series(&self, measurement: &str, id: SeriesId) -> Option<SeriesRecord> {
        self.find_measurement(measurement)?.read().series(id).cloned()
    }

    /// The declared type of `name` on `measurement`, if it has been
    /// created. Used to resolve which of the five typed cursors a query
    /// should open for a given field (spec.md §9 Design Note 2).
    pub fn field(&self, measurement: &str, name: &str) -> Option<FieldDef> {
        self.find_measurement(measurement)?.read().field(name).cloned()
    }

    pub fn series_ids(&self, measurement: &str) -> Vec<SeriesId> {
        self.find_measurement(measurement)
            .map(|h| h.read().series_ids().to_vec())
            .unwrap_or_default()
    }

    /// Evaluate one filter against a measurement's inverted index.
    pub fn series_ids_by_filter(&self, measurement: &str, filter: &Filter) -> Vec<SeriesId> {
        let Some(handle) = self.find_measurement(measurement) else {
            return Vec::new();
        };
        let m = handle.read();
        match filter {
            Filter::Equals { key, value } => m.series_ids_for_tag_value(key, value).to_vec(),
            Filter::NotEquals { key, value } => {
                let matching = m.series_ids_for_tag_value(key, value);
                setops::reject(m.series_ids(), matching)
            }
            Filter::Regex { key, pattern } => m
                .tag_values(key)
                .filter(|v| pattern.is_match(v))
                .map(|v| m.series_ids_for_tag_value(key, v).to_vec())
                .fold(Vec::new(), |acc, ids| setops::union(&acc, &ids)),
            Filter::NotRegex { key, pattern } => {
                let matching: Vec<SeriesId> = m
                    .tag_values(key)
                    .filter(|v| pattern.is_match(v))
                    .map(|v| m.series_ids_for_tag_value(key, v).to_vec())
                    .fold(Vec::new(), |acc, ids| setops::union(&acc, &ids));
                setops::reject(m.series_ids(), &matching)
            }
            Filter::Exists { key } => m.series_ids_with_tag_key(key),
        }
    }

    /// Fold a list of filters into one sorted series-ID set: `And` folds
    /// with `Intersect`, `Or` with `Union` (spec.md §4.4 "Combining filters").
    pub fn series_ids_by_filters(
        &self,
        measurement: &str,
        filters: &[Filter],
        combinator: Combinator,
    ) -> Vec<SeriesId> {
        let mut sets = filters
            .iter()
            .map(|f| self.series_ids_by_filter(measurement, f));

        let Some(first) = sets.next() else {
            return self.series_ids(measurement);
        };

        sets.fold(first, |acc, ids| match combinator {
            Combinator::And => setops::intersect(&acc, &ids),
            Combinator::Or => setops::union(&acc, &ids),
        })
    }

    /// Distinct tag keys across the union of `measurements`.
    pub fn tag_keys(&self, measurements: &[String]) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for name in measurements {
            if let Some(handle) = self.find_measurement(name) {
                for key in handle.read().tag_keys() {
                    if let Err(pos) = out.binary_search_by(|k: &String| k.as_str().cmp(key)) {
                        out.insert(pos, key.to_string());
                    }
                }
            }
        }
        out
    }

    /// Distinct values of `key` across `measurements`, restricted to series
    /// that also satisfy every filter in `filters`.
    pub fn tag_values(&self, measurements: &[String], key: &str, filters: &[Filter]) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for name in measurements {
            let Some(handle) = self.find_measurement(name) else {
                continue;
            };
            let allowed = if filters.is_empty() {
                None
            } else {
                Some(self.series_ids_by_filters(name, filters, Combinator::And))
            };
            let m = handle.read();
            for value in m.tag_values(key) {
                let matches = match &allowed {
                    None => true,
                    Some(ids) => {
                        let value_ids = m.series_ids_for_tag_value(key, value);
                        !setops::intersect(ids, value_ids).is_empty()
                    }
                };
                if matches {
                    if let Err(pos) = out.binary_search_by(|v: &String| v.as_str().cmp(value)) {
                        out.insert(pos, value.to_string());
                    }
                }
            }
        }
        out
    }
}
