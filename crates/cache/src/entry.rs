//! A single series' in-memory value sequence (spec.md §4.3 "Cache Entry").

use std::collections::HashSet;
use tsdb_core::value::TimestampedValue;

/// Per-series-key record held in the cache's hot store. `need_sort` is set
/// whenever an append leaves the sequence out of order, so a later read or
/// an explicit `deduplicate()` call knows it must sort before returning.
#[derive(Debug, Clone, Default)]
pub struct CacheEntry {
    pub values: Vec<TimestampedValue>,
    pub need_sort: bool,
}

impl CacheEntry {
    /// Append `incoming` to this entry, flagging `need_sort` if the new
    /// values are not already in ascending order among themselves or
    /// relative to the entry's existing tail.
    pub fn append(&mut self, mut incoming: Vec<TimestampedValue>) {
        if !is_ascending(&incoming) {
            self.need_sort = true;
        } else if let (Some(tail), Some(head)) = (self.values.last(), incoming.first()) {
            if head.timestamp < tail.timestamp {
                self.need_sort = true;
            }
        }
        self.values.append(&mut incoming);
    }

    /// Sort by timestamp ascending and keep the last write per timestamp
    /// (spec.md §4.3 "Deduplication"). "Last" means the value that was
    /// appended most recently among those sharing a timestamp.
    pub fn deduplicate(&mut self) {
        dedup_last_write_wins(&mut self.values);
        self.need_sort = false;
    }

    pub fn size(&self) -> usize {
        values_size(&self.values)
    }
}

fn is_ascending(values: &[TimestampedValue]) -> bool {
    values.windows(2).all(|w| w[0].timestamp <= w[1].timestamp)
}

/// Byte accounting for a value sequence: 8 bytes per timestamp plus each
/// value's own encoded width, matching the cache's byte-admission check
/// against the WAL wire encoding's sizes.
pub fn values_size(values: &[TimestampedValue]) -> usize {
    values.iter().map(|v| 8 + v.value.encoded_size()).sum()
}

/// Stable-sort by timestamp, then collapse duplicate timestamps keeping the
/// one that appeared last in the pre-sort (append) order.
pub fn dedup_last_write_wins(values: &mut Vec<TimestampedValue>) {
    values.sort_by_key(|v| v.timestamp);
    let mut seen = HashSet::with_capacity(values.len());
    let mut kept = Vec::with_capacity(values.len());
    for v in values.drain(..).rev() {
        if seen.insert(v.timestamp) {
            kept.push(v);
        }
    }
    kept.reverse();
    *values = kept;
}
