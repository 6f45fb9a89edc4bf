//! WAL reader: segment replay and recovery-on-open (spec.md §4.2).
//!
//! A segment is read by repeatedly decoding records off the front of its
//! byte buffer. A short or corrupt trailing record is not an error: it
//! marks the point a crash landed mid-write, so the segment is truncated
//! back to the last fully valid record and reading stops there. Corruption
//! earlier in the file is treated the same way — truncate at the last good
//! offset and move on to the next segment, rather than losing everything
//! already replayed.

use crate::entry::WalEntry;
use crate::error::WalError;
use crate::format::decode_record;
use crate::segment::parse_segment_id;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

/// The result of replaying one segment file.
pub struct SegmentRecovery {
    pub entries: Vec<WalEntry>,
    /// Byte offset of the last fully-decoded record. Equals the file length
    /// when every record in the file decoded cleanly.
    pub valid_len: u64,
    /// Set when the file had to be cut short of its on-disk length.
    pub truncated: bool,
}

/// Decode every record in `path` from the front, stopping at the first
/// record that fails to decode (truncated tail or mid-file corruption).
pub fn read_segment_file(path: &Path) -> Result<SegmentRecovery, WalError> {
    let bytes = fs::read(path).map_err(WalError::from_io)?;
    let mut offset = 0usize;
    let mut entries = Vec::new();
    let mut truncated = false;

    while offset < bytes.len() {
        match decode_record(&bytes[offset..]) {
            Ok((entry, consumed)) => {
                entries.push(entry);
                offset += consumed;
            }
            Err(_) => {
                truncated = true;
                break;
            }
        }
    }

    Ok(SegmentRecovery {
        entries,
        valid_len: offset as u64,
        truncated,
    })
}

/// Cut `path` back to `valid_len` bytes, dropping any partial trailing data.
pub fn truncate_segment(path: &Path, valid_len: u64) -> Result<(), WalError> {
    let file = OpenOptions::new().write(true).open(path).map_err(WalError::from_io)?;
    file.set_len(valid_len).map_err(WalError::from_io)
}

/// All entries replayed from every segment in `wal_dir`, in file and
/// within-file order, plus the id of the segment the writer should resume
/// appending to (the highest surviving segment id, if any).
pub struct RecoveryResult {
    pub entries: Vec<WalEntry>,
    pub resume_id: Option<u64>,
}

/// Recovery-on-open (spec.md §4.2):
/// 1. Enumerate `_*.wal` files, sorted lexicographically.
/// 2. If the last file is empty, delete it.
/// 3. Replay every remaining segment, truncating any with a bad tail.
/// 4. Hand the replayed entries to the caller (the cache loader).
pub fn recover(wal_dir: &Path) -> Result<RecoveryResult, WalError> {
    fs::create_dir_all(wal_dir).map_err(WalError::from_io)?;

    let mut files: Vec<(u64, PathBuf)> = Vec::new();
    for entry in fs::read_dir(wal_dir).map_err(WalError::from_io)? {
        let entry = entry.map_err(WalError::from_io)?;
        let name = entry.file_name().to_string_lossy().to_string();
        if let Some(id) = parse_segment_id(&name) {
            files.push((id, entry.path()));
        }
    }
    files.sort_by(|a, b| a.1.file_name().cmp(&b.1.file_name()));

    if let Some((_, last_path)) = files.last() {
        let len = fs::metadata(last_path).map_err(WalError::from_io)?.len();
        if len == 0 {
            fs::remove_file(last_path).map_err(WalError::from_io)?;
            files.pop();
        }
    }

    let mut all_entries = Vec::new();
    let mut resume_id = None;
    for (id, path) in &files {
        let recovered = read_segment_file(path)?;
        if recovered.truncated {
            truncate_segment(path, recovered.valid_len)?;
        }
        all_entries.extend(recovered.entries);
        resume_id = Some(*id);
    }

    Ok(RecoveryResult {
        entries: all_entries,
        resume_id,
    })
}
