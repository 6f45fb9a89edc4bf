//! WAL segment and record wire format (spec.md §4.2).
//!
//! Each record is a concatenation of:
//!
//! ```text
//! +--------+-------------------+----------+--------------------+
//! | type:1 | compressed_len:4  | crc32:4  | snappy(payload):N  |
//! +--------+-------------------+----------+--------------------+
//! ```
//!
//! `compressed_len` and `crc32` are big-endian. `crc32` is the checksum of
//! the compressed bytes, checked before decompression so a flipped bit in
//! the middle of a record is caught without needing a valid snappy frame to
//! decode garbage into. `type` discriminates the entry variant: `0x01`
//! Write, `0x04` DeleteBucketRange (the byte values match the original WAL
//! entry type codes this core's format is modeled on).

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io;
use thiserror::Error;

use crate::entry::WalEntry;

pub const RECORD_HEADER_SIZE: usize = 1 + 4 + 4;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("unknown WAL entry type byte {0:#04x}")]
    UnknownType(u8),
    #[error("snappy decompression failed: {0}")]
    Decompress(String),
    #[error("truncated record: needed {needed} bytes, had {have}")]
    Truncated { needed: usize, have: usize },
    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },
    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// Encode `entry` as a complete on-disk record: header + compressed
/// payload. Returns the bytes ready to append to a segment file.
pub fn encode_record(entry: &WalEntry) -> io::Result<Vec<u8>> {
    let payload = entry.to_bytes();
    let compressed = {
        let mut encoder = snap::raw::Encoder::new();
        encoder
            .compress_vec(&payload)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?
    };
    let checksum = crc32fast::hash(&compressed);

    let mut out = Vec::with_capacity(RECORD_HEADER_SIZE + compressed.len());
    out.write_u8(entry.type_byte())?;
    out.write_u32::<BigEndian>(compressed.len() as u32)?;
    out.write_u32::<BigEndian>(checksum)?;
    out.write_all(&compressed)?;
    Ok(out)
}

/// Decode one record from the front of `buf`. Returns the decoded entry and
/// the number of bytes consumed, or a [`RecordError`] describing why it
/// could not be decoded — the reader uses the distinction between
/// `Truncated` (expected at a crash boundary) and other errors (true
/// corruption) to decide how to recover.
pub fn decode_record(buf: &[u8]) -> Result<(WalEntry, usize), RecordError> {
    if buf.len() < RECORD_HEADER_SIZE {
        return Err(RecordError::Truncated {
            needed: RECORD_HEADER_SIZE,
            have: buf.len(),
        });
    }

    let mut cursor = &buf[..RECORD_HEADER_SIZE];
    let type_byte = cursor.read_u8()?;
    let compressed_len = cursor.read_u32::<BigEndian>()? as usize;
    let expected_checksum = cursor.read_u32::<BigEndian>()?;

    let total = RECORD_HEADER_SIZE + compressed_len;
    if buf.len() < total {
        return Err(RecordError::Truncated {
            needed: total,
            have: buf.len(),
        });
    }

    let compressed = &buf[RECORD_HEADER_SIZE..total];
    let actual_checksum = crc32fast::hash(compressed);
    if actual_checksum != expected_checksum {
        return Err(RecordError::ChecksumMismatch {
            expected: expected_checksum,
            actual: actual_checksum,
        });
    }

    let payload = {
        let mut decoder = snap::raw::Decoder::new();
        decoder
            .decompress_vec(compressed)
            .map_err(|e| RecordError::Decompress(e.to_string()))?
    };

    let entry = WalEntry::from_bytes(type_byte, &payload)?;
    Ok((entry, total))
}
