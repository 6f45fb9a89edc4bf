//! WAL entry variants and their payload encoding (spec.md §4.2, §3).

use crate::format::RecordError;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use tsdb_core::value::{FieldValue, TimestampedValue};

pub const RECORD_TYPE_WRITE: u8 = 0x01;
pub const RECORD_TYPE_DELETE_BUCKET_RANGE: u8 = 0x04;

const VALUE_TYPE_FLOAT: u8 = 0x00;
const VALUE_TYPE_INTEGER: u8 = 0x01;
const VALUE_TYPE_UNSIGNED: u8 = 0x02;
const VALUE_TYPE_BOOLEAN: u8 = 0x03;
const VALUE_TYPE_STRING: u8 = 0x04;

/// One series' worth of values to write, as carried inside a `Write` entry.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesWrite {
    pub key: Vec<u8>,
    pub values: Vec<TimestampedValue>,
}

/// A decoded WAL record. `Write` carries one or more series' values;
/// `DeleteBucketRange` marks a bucket range for deletion.
#[derive(Debug, Clone, PartialEq)]
pub enum WalEntry {
    Write(Vec<SeriesWrite>),
    DeleteBucketRange {
        org_id: u64,
        bucket_id: u64,
        min_time: i64,
        max_time: i64,
    },
}

impl WalEntry {
    pub fn type_byte(&self) -> u8 {
        match self {
            WalEntry::Write(_) => RECORD_TYPE_WRITE,
            WalEntry::DeleteBucketRange { .. } => RECORD_TYPE_DELETE_BUCKET_RANGE,
        }
    }

    /// Serialize this entry's payload (the part that gets snappy-compressed
    /// by the caller; does not include the 5-byte record header).
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            WalEntry::Write(writes) => encode_write_payload(writes),
            WalEntry::DeleteBucketRange {
                org_id,
                bucket_id,
                min_time,
                max_time,
            } => {
                let mut out = Vec::with_capacity(32);
                out.write_u64::<BigEndian>(*org_id).unwrap();
                out.write_u64::<BigEndian>(*bucket_id).unwrap();
                out.write_i64::<BigEndian>(*min_time).unwrap();
                out.write_i64::<BigEndian>(*max_time).unwrap();
                out
            }
        }
    }

    /// Decode a payload given the record-level `type_byte` that preceded it.
    pub fn from_bytes(type_byte: u8, payload: &[u8]) -> Result<Self, RecordError> {
        match type_byte {
            RECORD_TYPE_WRITE => decode_write_payload(payload).map(WalEntry::Write),
            RECORD_TYPE_DELETE_BUCKET_RANGE => {
                if payload.len() != 32 {
                    return Err(RecordError::Malformed(format!(
                        "DeleteBucketRange payload must be 32 bytes, got {}",
                        payload.len()
                    )));
                }
                let mut cursor = payload;
                let org_id = cursor.read_u64::<BigEndian>()?;
                let bucket_id = cursor.read_u64::<BigEndian>()?;
                let min_time = cursor.read_i64::<BigEndian>()?;
                let max_time = cursor.read_i64::<BigEndian>()?;
                Ok(WalEntry::DeleteBucketRange {
                    org_id,
                    bucket_id,
                    min_time,
                    max_time,
                })
            }
            other => Err(RecordError::UnknownType(other)),
        }
    }
}

fn value_type_byte(v: &FieldValue) -> u8 {
    match v {
        FieldValue::Float(_) => VALUE_TYPE_FLOAT,
        FieldValue::Integer(_) => VALUE_TYPE_INTEGER,
        FieldValue::Unsigned(_) => VALUE_TYPE_UNSIGNED,
        FieldValue::Boolean(_) => VALUE_TYPE_BOOLEAN,
        FieldValue::String(_) => VALUE_TYPE_STRING,
    }
}

fn write_value(out: &mut Vec<u8>, v: &FieldValue) {
    match v {
        FieldValue::Float(f) => out.write_f64::<BigEndian>(*f).unwrap(),
        FieldValue::Integer(i) => out.write_i64::<BigEndian>(*i).unwrap(),
        FieldValue::Unsigned(u) => out.write_u64::<BigEndian>(*u).unwrap(),
        FieldValue::Boolean(b) => out.write_u8(if *b { 1 } else { 0 }).unwrap(),
        FieldValue::String(s) => {
            out.write_u32::<BigEndian>(s.len() as u32).unwrap();
            out.extend_from_slice(s.as_bytes());
        }
    }
}

fn encode_write_payload(writes: &[SeriesWrite]) -> Vec<u8> {
    let mut out = Vec::new();
    for sw in writes {
        // All values for one key share a type: the first value's type is
        // written once, and every value that follows uses that width.
        let value_type = sw
            .values
            .first()
            .map(value_type_byte)
            .unwrap_or(VALUE_TYPE_FLOAT);
        out.write_u8(value_type).unwrap();
        out.write_u16::<BigEndian>(sw.key.len() as u16).unwrap();
        out.extend_from_slice(&sw.key);
        out.write_u32::<BigEndian>(sw.values.len() as u32).unwrap();
        for tv in &sw.values {
            out.write_i64::<BigEndian>(tv.timestamp).unwrap();
            write_value(&mut out, &tv.value);
        }
    }
    out
}

fn read_value(
    cursor: &mut &[u8],
    value_type: u8,
) -> Result<FieldValue, RecordError> {
    Ok(match value_type {
        VALUE_TYPE_FLOAT => FieldValue::Float(cursor.read_f64::<BigEndian>()?),
        VALUE_TYPE_INTEGER => FieldValue::Integer(cursor.read_i64::<BigEndian>()?),
        VALUE_TYPE_UNSIGNED => FieldValue::Unsigned(cursor.read_u64::<BigEndian>()?),
        VALUE_TYPE_BOOLEAN => FieldValue::Boolean(cursor.read_u8()? != 0),
        VALUE_TYPE_STRING => {
            let len = cursor.read_u32::<BigEndian>()? as usize;
            if cursor.len() < len {
                return Err(RecordError::Malformed("truncated string value".into()));
            }
            let s = String::from_utf8(cursor[..len].to_vec())
                .map_err(|e| RecordError::Malformed(e.to_string()))?;
            *cursor = &cursor[len..];
            FieldValue::String(s)
        }
        other => return Err(RecordError::Malformed(format!("unknown value type {other:#04x}"))),
    })
}

fn decode_write_payload(mut payload: &[u8]) -> Result<Vec<SeriesWrite>, RecordError> {
    let mut out = Vec::new();
    while !payload.is_empty() {
        let value_type = payload.read_u8()?;
        if payload.len() < 2 {
            return Err(RecordError::Malformed("truncated key length".into()));
        }
        let key_len = payload.read_u16::<BigEndian>()? as usize;
        if payload.len() < key_len {
            return Err(RecordError::Malformed("truncated key".into()));
        }
        let key = payload[..key_len].to_vec();
        payload = &payload[key_len..];

        let count = payload.read_u32::<BigEndian>()? as usize;
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            let timestamp = payload.read_i64::<BigEndian>()?;
            let value = read_value(&mut payload, value_type)?;
            values.push(TimestampedValue::new(timestamp, value));
        }
        out.push(SeriesWrite { key, values });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sw(key: &str, values: Vec<(i64, FieldValue)>) -> SeriesWrite {
        SeriesWrite {
            key: key.as_bytes().to_vec(),
            values: values
                .into_iter()
                .map(|(t, v)| TimestampedValue::new(t, v))
                .collect(),
        }
    }

    #[test]
    fn round_trips_write_entry_with_mixed_types() {
        let entry = WalEntry::Write(vec![
            sw("cpu,host=a", vec![(100, FieldValue::Integer(1)), (200, FieldValue::Integer(2))]),
            sw("mem,host=a", vec![(100, FieldValue::Float(1.5))]),
            sw("disk,host=a", vec![(100, FieldValue::String("full".into()))]),
            sw("up,host=a", vec![(100, FieldValue::Boolean(true))]),
        ]);
        let bytes = entry.to_bytes();
        let decoded = WalEntry::from_bytes(RECORD_TYPE_WRITE, &bytes).unwrap();
        assert_eq!(decoded, entry);
    }

    #[test]
    fn round_trips_delete_bucket_range() {
        let entry = WalEntry::DeleteBucketRange {
            org_id: 7,
            bucket_id: 42,
            min_time: -100,
            max_time: 9999,
        };
        let bytes = entry.to_bytes();
        let decoded = WalEntry::from_bytes(RECORD_TYPE_DELETE_BUCKET_RANGE, &bytes).unwrap();
        assert_eq!(decoded, entry);
    }

    #[test]
    fn unknown_type_byte_is_rejected() {
        let err = WalEntry::from_bytes(0x99, &[]).unwrap_err();
        assert!(matches!(err, RecordError::UnknownType(0x99)));
    }
}
