//! WAL segment files: `_NNNNN.wal`, zero-padded decimal suffix,
//! monotonically increasing, append-only (spec.md §3, §4.2).

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Width of the zero-padded decimal segment suffix.
const SUFFIX_WIDTH: usize = 5;

pub fn segment_path(dir: &Path, id: u64) -> PathBuf {
    dir.join(format!("_{:0width$}.wal", id, width = SUFFIX_WIDTH))
}

/// Parse a segment id out of a `_NNNNN.wal` file name. Returns `None` for
/// anything that doesn't match the pattern (so unrelated files in the WAL
/// directory are silently skipped during recovery).
pub fn parse_segment_id(file_name: &str) -> Option<u64> {
    let stripped = file_name.strip_prefix('_')?.strip_suffix(".wal")?;
    stripped.parse().ok()
}

/// An open WAL segment file, buffered for writes.
pub struct WalSegment {
    id: u64,
    path: PathBuf,
    writer: BufWriter<File>,
    size: u64,
}

impl WalSegment {
    /// Create a brand-new, empty segment file. Fails if the file already
    /// exists (segment ids are never reused within a WAL directory).
    pub fn create(dir: &Path, id: u64) -> io::Result<Self> {
        let path = segment_path(dir, id);
        let file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&path)?;
        Ok(Self {
            id,
            path,
            writer: BufWriter::new(file),
            size: 0,
        })
    }

    /// Open an existing segment for appending, seeking to its current end.
    pub fn open_append(dir: &Path, id: u64) -> io::Result<Self> {
        let path = segment_path(dir, id);
        let file = OpenOptions::new().append(true).open(&path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            id,
            path,
            writer: BufWriter::new(file),
            size,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Append `bytes` to the segment's buffered writer. Does not fsync —
    /// callers (the fsync scheduler) decide when to flush to disk.
    pub fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes)?;
        self.size += bytes.len() as u64;
        Ok(())
    }

    /// Flush the buffered writer and fsync the underlying file.
    pub fn sync(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()
    }

    /// Flush, fsync, and drop the file handle. Further writes require
    /// reopening the segment.
    pub fn close(mut self) -> io::Result<()> {
        self.sync()
    }

    /// Truncate the underlying file to `len` bytes (used by recovery to cut
    /// a segment back to its last fully-valid record) and reset the
    /// in-memory size tracker to match.
    pub fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().set_len(len)?;
        self.size = len;
        Ok(())
    }
}
