//! `Measurement`: a named collection of series sharing the same field
//! schema, plus the inverted tag index used to answer predicate queries.
//!
//! Measurement is kept in `tsdb-core` because it is pure data model (spec.md
//! §3); the algorithms that operate over many measurements — sorted-set
//! algebra, predicate folding, tag-key/value enumeration — live one layer up
//! in `tsdb-index`, which is the layer with "series index" behavior.

use crate::error::{Classify, ErrorKind};
use crate::series_key::SeriesId;
use crate::value::FieldType;
use std::collections::BTreeMap;
use thiserror::Error;

/// Maximum number of distinct fields a measurement may have. Field ids are
/// single bytes in the WAL record payload, so 255 is the hard ceiling
/// (id 0 is reserved as "unassigned").
pub const MAX_FIELDS_PER_MEASUREMENT: usize = 255;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("measurement already has {MAX_FIELDS_PER_MEASUREMENT} fields, cannot add {0:?}")]
    FieldOverflow(String),
    #[error("field {name:?} already exists with type {existing}, cannot redeclare as {requested}")]
    FieldTypeConflict {
        name: String,
        existing: FieldType,
        requested: FieldType,
    },
}

impl Classify for FieldError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Invalid
    }
}

/// One declared field: its measurement-local id, name, and type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub id: u8,
    pub name: String,
    pub field_type: FieldType,
}

/// A single series within a measurement: its key bytes and the sorted tags
/// used to build it (kept alongside the key so tag-key/value enumeration
/// does not need to re-parse the key bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesRecord {
    pub id: SeriesId,
    pub key: Vec<u8>,
    pub tags: Vec<(String, String)>,
}

/// A named collection of series sharing one field schema.
#[derive(Debug, Default)]
pub struct Measurement {
    name: String,
    /// Ordered sequence of `(id, name, type)`; id assigned 1..=255 on first
    /// sight of the field name.
    fields: Vec<FieldDef>,
    /// Fast name -> position-in-`fields` lookup.
    field_by_name: BTreeMap<String, usize>,
    /// series-id -> series record.
    series_by_id: BTreeMap<SeriesId, SeriesRecord>,
    /// All series-ids in this measurement, sorted ascending, no duplicates.
    series_ids: Vec<SeriesId>,
    /// tagKey -> tagValue -> sorted series-ids (the inverted index).
    series_by_tag_kv: BTreeMap<String, BTreeMap<String, Vec<SeriesId>>>,
}

impl Measurement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.field_by_name.get(name).map(|&i| &self.fields[i])
    }

    /// Declare a field with the given type. Idempotent when redeclared with
    /// the same type; fails with `FieldTypeConflict` on a type mismatch, and
    /// `FieldOverflow` if this would be the 256th distinct field.
    pub fn create_field(
        &mut self,
        name: &str,
        field_type: FieldType,
    ) -> Result<&FieldDef, FieldError> {
        if let Some(&idx) = self.field_by_name.get(name) {
            let existing = &self.fields[idx];
            if existing.field_type != field_type {
                return Err(FieldError::FieldTypeConflict {
                    name: name.to_string(),
                    existing: existing.field_type,
                    requested: field_type,
                });
            }
            return Ok(&self.fields[idx]);
        }

        if self.fields.len() >= MAX_FIELDS_PER_MEASUREMENT {
            return Err(FieldError::FieldOverflow(name.to_string()));
        }

        let id = (self.fields.len() + 1) as u8;
        self.fields.push(FieldDef {
            id,
            name: name.to_string(),
            field_type,
        });
        let idx = self.fields.len() - 1;
        self.field_by_name.insert(name.to_string(), idx);
        Ok(&self.fields[idx])
    }

    /// All series-ids in this measurement, sorted ascending.
    pub fn series_ids(&self) -> &[SeriesId] {
        &self.series_ids
    }

    pub fn series(&self, id: SeriesId) -> Option<&SeriesRecord> {
        self.series_by_id.get(&id)
    }

    /// Idempotent insert of a series into `series_by_id`, `series_ids`, and
    /// the inverted tag index. Because ids are assigned monotonically by the
    /// caller (the index layer), the common case is an O(1) append to the
    /// sorted `series_ids` vector rather than a full re-sort.
    pub fn add_series(&mut self, id: SeriesId, key: Vec<u8>, tags: Vec<(String, String)>) {
        if self.series_by_id.contains_key(&id) {
            return;
        }

        match self.series_ids.last() {
            Some(&last) if last < id => self.series_ids.push(id),
            None => self.series_ids.push(id),
            _ => {
                let pos = self.series_ids.partition_point(|&x| x < id);
                if self.series_ids.get(pos) != Some(&id) {
                    self.series_ids.insert(pos, id);
                }
            }
        }

        for (k, v) in &tags {
            let values = self.series_by_tag_kv.entry(k.clone()).or_default();
            let ids = values.entry(v.clone()).or_default();
            insert_sorted(ids, id);
        }

        self.series_by_id.insert(id, SeriesRecord { id, key, tags });
    }

    /// Remove a series from every sequence it appears in: `series_by_id`,
    /// `series_ids`, and each tag-key/value bucket of the inverted index.
    pub fn drop_series(&mut self, id: SeriesId) {
        let Some(record) = self.series_by_id.remove(&id) else {
            return;
        };
        if let Ok(pos) = self.series_ids.binary_search(&id) {
            self.series_ids.remove(pos);
        }
        for (k, v) in &record.tags {
            if let Some(values) = self.series_by_tag_kv.get_mut(k) {
                if let Some(ids) = values.get_mut(v) {
                    if let Ok(pos) = ids.binary_search(&id) {
                        ids.remove(pos);
                    }
                    if ids.is_empty() {
                        values.remove(v);
                    }
                }
                if values.is_empty() {
                    self.series_by_tag_kv.remove(k);
                }
            }
        }
    }

    /// Sorted, deduplicated series-ids whose tag `key` equals `value`.
    pub fn series_ids_for_tag_value(&self, key: &str, value: &str) -> &[SeriesId] {
        self.series_by_tag_kv
            .get(key)
            .and_then(|values| values.get(value))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// All distinct values of `key` across this measurement's series.
    pub fn tag_values(&self, key: &str) -> impl Iterator<Item = &str> {
        self.series_by_tag_kv
            .get(key)
            .into_iter()
            .flat_map(|values| values.keys().map(|s| s.as_str()))
    }

    /// All distinct tag keys in this measurement.
    pub fn tag_keys(&self) -> impl Iterator<Item = &str> {
        self.series_by_tag_kv.keys().map(|s| s.as_str())
    }

    /// Series-ids that carry tag `key` at all, regardless of value. Used by
    /// the `Exists(key)` filter.
    pub fn series_ids_with_tag_key(&self, key: &str) -> Vec<SeriesId> {
        let Some(values) = self.series_by_tag_kv.get(key) else {
            return Vec::new();
        };
        let mut out: Vec<SeriesId> = Vec::new();
        for ids in values.values() {
            out = crate::setops::union(&out, ids);
        }
        out
    }
}

fn insert_sorted(v: &mut Vec<SeriesId>, id: SeriesId) {
    let pos = v.partition_point(|&x| x < id);
    if v.get(pos) != Some(&id) {
        v.insert(pos, id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_overflow_after_255() {
        let mut m = Measurement::new("cpu");
        for i in 0..MAX_FIELDS_PER_MEASUREMENT {
            m.create_field(&format!("f{i}"), FieldType::Float).unwrap();
        }
        let err = m.create_field("f_overflow", FieldType::Float).unwrap_err();
        assert_eq!(err, FieldError::FieldOverflow("f_overflow".to_string()));
        assert_eq!(m.fields().len(), MAX_FIELDS_PER_MEASUREMENT);
    }

    #[test]
    fn redeclare_same_type_is_idempotent() {
        let mut m = Measurement::new("cpu");
        m.create_field("value", FieldType::Float).unwrap();
        let f = m.create_field("value", FieldType::Float).unwrap();
        assert_eq!(f.id, 1);
        assert_eq!(m.fields().len(), 1);
    }

    #[test]
    fn redeclare_different_type_conflicts() {
        let mut m = Measurement::new("cpu");
        m.create_field("value", FieldType::Float).unwrap();
        let err = m.create_field("value", FieldType::Integer).unwrap_err();
        assert!(matches!(err, FieldError::FieldTypeConflict { .. }));
    }

    #[test]
    fn add_series_builds_inverted_index() {
        let mut m = Measurement::new("m");
        m.add_series(1, b"m,a=1,b=x".to_vec(), vec![("a".into(), "1".into()), ("b".into(), "x".into())]);
        m.add_series(2, b"m,a=1,b=y".to_vec(), vec![("a".into(), "1".into()), ("b".into(), "y".into())]);
        m.add_series(3, b"m,a=2,b=x".to_vec(), vec![("a".into(), "2".into()), ("b".into(), "x".into())]);

        assert_eq!(m.series_ids(), &[1, 2, 3]);
        assert_eq!(m.series_ids_for_tag_value("a", "1"), &[1, 2]);
        assert_eq!(m.series_ids_for_tag_value("b", "x"), &[1, 3]);
    }

    #[test]
    fn drop_series_removes_from_all_sequences() {
        let mut m = Measurement::new("m");
        m.add_series(1, b"m,a=1".to_vec(), vec![("a".into(), "1".into())]);
        m.add_series(2, b"m,a=1".to_vec(), vec![("a".into(), "1".into())]);
        m.drop_series(1);
        assert_eq!(m.series_ids(), &[2]);
        assert_eq!(m.series_ids_for_tag_value("a", "1"), &[2]);
    }
}
