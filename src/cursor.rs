//! The cursor contract the query execution engine consumes (spec.md §1:
//! "core exposes a cursor iterator contract"; §9 Design Note 2: dynamic
//! dispatch over value types replaced by "a tagged-variant value plus five
//! concrete cursor implementations behind a narrow capability set
//! `{Next, Close, Stats}`; no runtime reflection").
//!
//! `AnyCursor` is that tagged variant: it picks one of the five typed
//! cursors below by the field's declared `FieldType` and forwards calls
//! through a `match`, never a trait object.

use tsdb_cache::entry::dedup_last_write_wins;
use tsdb_core::value::{FieldType, FieldValue, TimestampedValue};

/// Narrow capability set every typed cursor exposes.
pub trait SeriesCursor {
    type Item;
    fn next(&mut self) -> Option<Self::Item>;
    fn close(&mut self);
    fn stats(&self) -> CursorStats;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CursorStats {
    pub scanned: u64,
}

/// Merge the cache's in-memory values with the (opaque, out-of-scope per
/// spec.md §1) TSM reader's values for the same series/field, restrict to
/// `[min_time, max_time)`, and resolve any timestamp collision in favor of
/// the cache — the cache always holds strictly newer writes than anything
/// already compacted to a TSM file.
fn merge_cache_and_tsm(
    cache_values: Vec<TimestampedValue>,
    tsm_values: Vec<(i64, FieldValue)>,
    min_time: i64,
    max_time: i64,
) -> Vec<TimestampedValue> {
    let mut merged = Vec::with_capacity(cache_values.len() + tsm_values.len());
    merged.extend(
        tsm_values
            .into_iter()
            .map(|(t, v)| TimestampedValue::new(t, v))
            .filter(|v| v.timestamp >= min_time && v.timestamp < max_time),
    );
    merged.extend(cache_values.into_iter().filter(|v| v.timestamp >= min_time && v.timestamp < max_time));
    dedup_last_write_wins(&mut merged);
    merged
}

macro_rules! typed_cursor {
    ($name:ident, $item:ty, $variant:ident) => {
        /// Typed cursor over one series/field's merged value sequence.
        pub struct $name {
            values: std::vec::IntoIter<TimestampedValue>,
            stats: CursorStats,
        }

        impl $name {
            fn new(values: Vec<TimestampedValue>) -> Self {
                Self { values: values.into_iter(), stats: CursorStats::default() }
            }
        }

        impl SeriesCursor for $name {
            type Item = (i64, $item);

            fn next(&mut self) -> Option<Self::Item> {
                let tv = self.values.next()?;
                self.stats.scanned += 1;
                match tv.value {
                    FieldValue::$variant(v) => Some((tv.timestamp, v)),
                    // A measurement's field schema fixes one type per field
                    // name (`Measurement::create_field`); a cursor is only
                    // ever opened for a field whose declared type matches
                    // this variant, so every value in the merged sequence
                    // decodes here.
                    _ => None,
                }
            }

            fn close(&mut self) {
                self.values = Vec::new().into_iter();
            }

            fn stats(&self) -> CursorStats {
                self.stats
            }
        }
    };
}

typed_cursor!(FloatCursor, f64, Float);
typed_cursor!(IntegerCursor, i64, Integer);
typed_cursor!(UnsignedCursor, u64, Unsigned);
typed_cursor!(BooleanCursor, bool, Boolean);
typed_cursor!(StringCursor, String, String);

/// The tagged-variant cursor handed to callers: picks its concrete typed
/// cursor by `FieldType` at open time, then dispatches every call through
/// a plain `match` rather than a vtable.
pub enum AnyCursor {
    Float(FloatCursor),
    Integer(IntegerCursor),
    Unsigned(UnsignedCursor),
    Boolean(BooleanCursor),
    String(StringCursor),
}

impl AnyCursor {
    pub fn open(
        field_type: FieldType,
        cache_values: Vec<TimestampedValue>,
        tsm_values: Vec<(i64, FieldValue)>,
        min_time: i64,
        max_time: i64,
    ) -> Self {
        let merged = merge_cache_and_tsm(cache_values, tsm_values, min_time, max_time);
        match field_type {
            FieldType::Float => AnyCursor::Float(FloatCursor::new(merged)),
            FieldType::Integer => AnyCursor::Integer(IntegerCursor::new(merged)),
            FieldType::Unsigned => AnyCursor::Unsigned(UnsignedCursor::new(merged)),
            FieldType::Boolean => AnyCursor::Boolean(BooleanCursor::new(merged)),
            FieldType::String => AnyCursor::String(StringCursor::new(merged)),
        }
    }

    /// The next value, re-tagged as a `FieldValue` for callers that don't
    /// want to match on the cursor variant themselves.
    pub fn next_value(&mut self) -> Option<(i64, FieldValue)> {
        match self {
            AnyCursor::Float(c) => c.next().map(|(t, v)| (t, FieldValue::Float(v))),
            AnyCursor::Integer(c) => c.next().map(|(t, v)| (t, FieldValue::Integer(v))),
            AnyCursor::Unsigned(c) => c.next().map(|(t, v)| (t, FieldValue::Unsigned(v))),
            AnyCursor::Boolean(c) => c.next().map(|(t, v)| (t, FieldValue::Boolean(v))),
            AnyCursor::String(c) => c.next().map(|(t, v)| (t, FieldValue::String(v))),
        }
    }

    pub fn close(&mut self) {
        match self {
            AnyCursor::Float(c) => c.close(),
            AnyCursor::Integer(c) => c.close(),
            AnyCursor::Unsigned(c) => c.close(),
            AnyCursor::Boolean(c) => c.close(),
            AnyCursor::String(c) => c.close(),
        }
    }

    pub fn stats(&self) -> CursorStats {
        match self {
            AnyCursor::Float(c) => c.stats(),
            AnyCursor::Integer(c) => c.stats(),
            AnyCursor::Unsigned(c) => c.stats(),
            AnyCursor::Boolean(c) => c.stats(),
            AnyCursor::String(c) => c.stats(),
        }
    }
}

/// A batch of values read from a cursor, or a marker that the read was
/// abandoned because the query was cancelled (spec.md §5 "Cancellation and
/// timeouts": "the shard cursor checks it between batches").
pub enum CursorBatch {
    Values(Vec<(i64, FieldValue)>),
    Cancelled,
}

impl AnyCursor {
    /// Read up to `max` values, checking `cancelled` once per batch rather
    /// than once per value — the granularity spec.md §5 describes.
    pub fn next_batch(&mut self, max: usize, cancelled: &std::sync::atomic::AtomicBool) -> CursorBatch {
        if cancelled.load(std::sync::atomic::Ordering::Relaxed) {
            return CursorBatch::Cancelled;
        }
        let mut out = Vec::with_capacity(max);
        while out.len() < max {
            match self.next_value() {
                Some(v) => out.push(v),
                None => break,
            }
        }
        CursorBatch::Values(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tv(t: i64, v: i64) -> TimestampedValue {
        TimestampedValue::new(t, FieldValue::Integer(v))
    }

    #[test]
    fn merges_cache_over_tsm_with_cache_winning_ties() {
        let cache = vec![tv(100, 2)];
        let tsm = vec![(100, FieldValue::Integer(1)), (50, FieldValue::Integer(0))];
        let merged = merge_cache_and_tsm(cache, tsm, 0, 1000);
        assert_eq!(merged, vec![tv(50, 0), tv(100, 2)]);
    }

    #[test]
    fn time_range_is_half_open() {
        let cache = vec![tv(0, 1), tv(100, 2), tv(200, 3)];
        let merged = merge_cache_and_tsm(cache, Vec::new(), 0, 200);
        assert_eq!(merged, vec![tv(0, 1), tv(100, 2)]);
    }

    #[test]
    fn integer_cursor_yields_typed_values_in_order() {
        let mut cursor = AnyCursor::open(
            FieldType::Integer,
            vec![tv(1, 10), tv(2, 20)],
            Vec::new(),
            0,
            1000,
        );
        assert_eq!(cursor.next_value(), Some((1, FieldValue::Integer(10))));
        assert_eq!(cursor.next_value(), Some((2, FieldValue::Integer(20))));
        assert_eq!(cursor.next_value(), None);
        assert_eq!(cursor.stats().scanned, 2);
    }

    #[test]
    fn next_batch_respects_cancellation() {
        let mut cursor = AnyCursor::open(FieldType::Integer, vec![tv(1, 10)], Vec::new(), 0, 1000);
        let cancelled = std::sync::atomic::AtomicBool::new(true);
        match cursor.next_batch(10, &cancelled) {
            CursorBatch::Cancelled => {}
            CursorBatch::Values(_) => panic!("expected cancellation"),
        }
    }

    #[test]
    fn next_batch_caps_at_max() {
        let mut cursor = AnyCursor::open(
            FieldType::Integer,
            vec![tv(1, 1), tv(2, 2), tv(3, 3)],
            Vec::new(),
            0,
            1000,
        );
        let cancelled = std::sync::atomic::AtomicBool::new(false);
        match cursor.next_batch(2, &cancelled) {
            CursorBatch::Values(v) => assert_eq!(v.len(), 2),
            CursorBatch::Cancelled => panic!("unexpected cancellation"),
        }
    }
}
