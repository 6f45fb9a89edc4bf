//! The `Point` data model: `(measurement, tagset, fieldset, timestamp)`.

use crate::series_key::{series_key, Tag};
use crate::value::FieldValue;

/// A single timestamped measurement as it arrives from a client.
///
/// `tags` is an ordered mapping of tag-key to tag-value with unique keys;
/// `fields` is a mapping of field-name to typed value. Construction does not
/// enforce uniqueness of tag keys or validate field types — that is the
/// responsibility of the series index when the point is first applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub measurement: String,
    pub tags: Vec<Tag>,
    pub fields: Vec<(String, FieldValue)>,
    pub timestamp: i64,
}

impl Point {
    pub fn new(measurement: impl Into<String>, timestamp: i64) -> Self {
        Self {
            measurement: measurement.into(),
            tags: Vec::new(),
            fields: Vec::new(),
            timestamp,
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push(Tag::new(key, value));
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.push((name.into(), value));
        self
    }

    /// The canonical series key bytes for this point's `(measurement, tags)`.
    pub fn series_key(&self) -> Vec<u8> {
        series_key(&self.measurement, &self.tags)
    }
}
