//! Typed field values carried by points, the WAL, the cache, and cursors.

use std::fmt;

/// A single field value. Field types are one of these five variants;
/// a measurement's field schema fixes the type for a given field name the
/// first time it is seen (see [`crate::measurement::Measurement`]).
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
    Unsigned(u64),
    Boolean(bool),
    String(String),
}

impl FieldValue {
    /// The [`FieldType`] discriminant for this value.
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::Float(_) => FieldType::Float,
            FieldValue::Integer(_) => FieldType::Integer,
            FieldValue::Unsigned(_) => FieldType::Unsigned,
            FieldValue::Boolean(_) => FieldType::Boolean,
            FieldValue::String(_) => FieldType::String,
        }
    }

    /// Size in bytes this value occupies in the cache's byte accounting.
    /// Fixed-width types charge their wire width (8 bytes, or 1 for bool);
    /// strings charge their UTF-8 length. Matches the WAL wire encoding in
    /// `tsdb_wal::format`, so cache accounting and WAL size track together.
    pub fn encoded_size(&self) -> usize {
        match self {
            FieldValue::Float(_) | FieldValue::Integer(_) | FieldValue::Unsigned(_) => 8,
            FieldValue::Boolean(_) => 1,
            FieldValue::String(s) => 4 + s.len(),
        }
    }
}

/// Field type discriminant, assigned to a field name on first write and
/// frozen thereafter (see `Measurement::create_field`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Float,
    Integer,
    Unsigned,
    Boolean,
    String,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FieldType::Float => "float",
            FieldType::Integer => "integer",
            FieldType::Unsigned => "unsigned",
            FieldType::Boolean => "boolean",
            FieldType::String => "string",
        };
        f.write_str(s)
    }
}

/// A single `(timestamp, value)` pair as stored in the cache and replayed
/// from the WAL.
#[derive(Debug, Clone, PartialEq)]
pub struct TimestampedValue {
    pub timestamp: i64,
    pub value: FieldValue,
}

impl TimestampedValue {
    pub fn new(timestamp: i64, value: FieldValue) -> Self {
        Self { timestamp, value }
    }
}
