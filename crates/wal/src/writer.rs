//! WAL writer: segment rollover and the fsync scheduler (spec.md §4.2, §5).
//!
//! Every call to [`WalWriter::write_multi`] / [`WalWriter::delete_bucket_range`]
//! appends to the active segment under a short exclusive section, then
//! enqueues a completion slot with the fsync scheduler and blocks on it.
//! The scheduler runs on one background thread: the first write after an
//! idle period arms it, it waits `sync_delay` (zero means "next tick"),
//! then flushes and fsyncs the segment exactly once and wakes every writer
//! that queued up in the meantime — this is the coalescing the concurrency
//! model (spec.md §5) requires.

use crate::config::WalConfig;
use crate::entry::WalEntry;
use crate::error::WalError;
use crate::format::encode_record;
use crate::segment::{parse_segment_id, WalSegment};
use crate::stats::WalStats;
use parking_lot::{Condvar, Mutex};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;

struct SegmentState {
    /// `None` only when the writer is disabled: every public method
    /// short-circuits on `enabled == false` before reaching this field.
    segment: Option<WalSegment>,
}

impl SegmentState {
    fn segment_mut(&mut self) -> &mut WalSegment {
        self.segment.as_mut().expect("segment state accessed while WAL disabled")
    }

    fn segment_ref(&self) -> &WalSegment {
        self.segment.as_ref().expect("segment state accessed while WAL disabled")
    }
}

struct SyncState {
    armed: bool,
    shutdown: bool,
    pending: Vec<mpsc::Sender<Result<(), WalError>>>,
}

struct WriterInner {
    wal_dir: PathBuf,
    config: WalConfig,
    enabled: bool,
    segment: Mutex<SegmentState>,
    sync: Mutex<SyncState>,
    sync_cv: Condvar,
    stats: WalStats,
}

/// Segmented, append-only WAL writer with batched-fsync coalescing.
pub struct WalWriter {
    inner: Arc<WriterInner>,
    sync_thread: Option<JoinHandle<()>>,
    closed: AtomicBool,
}

impl WalWriter {
    /// Open (or create) a WAL writer rooted at `wal_dir`. If the directory
    /// already holds segments, appends to the last one; otherwise starts a
    /// fresh segment 1. Pass `enabled = false` to build a writer that never
    /// touches disk (`write_multi` then always returns segment id `-1`).
    pub fn open(wal_dir: PathBuf, config: WalConfig, enabled: bool) -> Result<Self, WalError> {
        if !enabled {
            let inner = Arc::new(WriterInner {
                wal_dir,
                config,
                enabled: false,
                segment: Mutex::new(SegmentState { segment: None }),
                sync: Mutex::new(SyncState {
                    armed: false,
                    shutdown: true,
                    pending: Vec::new(),
                }),
                sync_cv: Condvar::new(),
                stats: WalStats::default(),
            });
            return Ok(Self {
                inner,
                sync_thread: None,
                closed: AtomicBool::new(false),
            });
        }

        fs::create_dir_all(&wal_dir)?;
        let latest = latest_segment_id(&wal_dir)?;
        let segment = match latest {
            Some(id) => match WalSegment::open_append(&wal_dir, id) {
                Ok(seg) => seg,
                Err(_) => WalSegment::create(&wal_dir, id + 1)?,
            },
            None => WalSegment::create(&wal_dir, 1)?,
        };

        let stats = WalStats::default();
        stats.segments.set(1);
        stats.current_segment_bytes.set(segment.size());

        let inner = Arc::new(WriterInner {
            wal_dir,
            config,
            enabled: true,
            segment: Mutex::new(SegmentState {
                segment: Some(segment),
            }),
            sync: Mutex::new(SyncState {
                armed: false,
                shutdown: false,
                pending: Vec::new(),
            }),
            sync_cv: Condvar::new(),
            stats,
        });

        let sync_thread = spawn_sync_thread(inner.clone());

        Ok(Self {
            inner,
            sync_thread: Some(sync_thread),
            closed: AtomicBool::new(false),
        })
    }

    /// Append a `Write` entry. Returns the segment id the record landed in,
    /// or `-1` if the WAL is disabled.
    pub fn write_multi(&self, writes: Vec<crate::entry::SeriesWrite>) -> Result<i64, WalError> {
        self.append(WalEntry::Write(writes))
    }

    /// Append a `DeleteBucketRange` entry. Returns the segment id, or `-1`
    /// if the WAL is disabled.
    pub fn delete_bucket_range(
        &self,
        org_id: u64,
        bucket_id: u64,
        min_time: i64,
        max_time: i64,
    ) -> Result<i64, WalError> {
        self.append(WalEntry::DeleteBucketRange {
            org_id,
            bucket_id,
            min_time,
            max_time,
        })
    }

    fn append(&self, entry: WalEntry) -> Result<i64, WalError> {
        if !self.inner.enabled {
            return Ok(-1);
        }
        if self.closed.load(Ordering::Acquire) {
            return Err(WalError::Closed);
        }

        let bytes = encode_record(&entry).map_err(WalError::from_io)?;

        let segment_id = {
            let mut state = self.inner.segment.lock();
            if state.segment_ref().size() + bytes.len() as u64 > self.inner.config.segment_size {
                self.rotate_locked(&mut state)?;
            }
            state.segment_mut().write(&bytes).map_err(WalError::from_io)?;
            self.inner
                .stats
                .current_segment_bytes
                .set(state.segment_ref().size());
            state.segment_ref().id()
        };

        let rx = self.enqueue_sync();
        rx.recv()
            .unwrap_or(Err(WalError::Io("fsync scheduler shut down".into())))?;

        Ok(segment_id as i64)
    }

    fn rotate_locked(&self, state: &mut SegmentState) -> Result<(), WalError> {
        let old_size = state.segment_ref().size();
        let next_id = state.segment_ref().id() + 1;
        let new_segment = WalSegment::create(&self.inner.wal_dir, next_id)?;
        let old_segment = state
            .segment
            .replace(new_segment)
            .expect("segment state accessed while WAL disabled");
        old_segment.close().map_err(WalError::from_io)?;
        self.inner.stats.segments.add(1);
        self.inner.stats.old_segment_bytes.add(old_size);
        self.inner.stats.current_segment_bytes.set(0);
        Ok(())
    }

    fn enqueue_sync(&self) -> mpsc::Receiver<Result<(), WalError>> {
        let (tx, rx) = mpsc::channel();
        let mut sync = self.inner.sync.lock();
        sync.pending.push(tx);
        if !sync.armed {
            sync.armed = true;
            self.inner.sync_cv.notify_one();
        }
        rx
    }

    /// Force a rollover even if the current segment is not full.
    pub fn close_segment(&self) -> Result<(), WalError> {
        if !self.inner.enabled {
            return Ok(());
        }
        let mut state = self.inner.segment.lock();
        self.rotate_locked(&mut state)
    }

    /// All segment paths other than the currently active one.
    pub fn closed_segments(&self) -> Result<Vec<PathBuf>, WalError> {
        if !self.inner.enabled {
            return Ok(Vec::new());
        }
        let current_id = self.inner.segment.lock().segment_ref().id();
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.inner.wal_dir).map_err(WalError::from_io)? {
            let entry = entry.map_err(WalError::from_io)?;
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(id) = parse_segment_id(&name) {
                if id != current_id {
                    out.push(entry.path());
                }
            }
        }
        out.sort();
        Ok(out)
    }

    /// Unlink the given segment files and update the on-disk-size gauge.
    pub fn remove(&self, paths: &[PathBuf]) -> Result<(), WalError> {
        for path in paths {
            let len = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
            fs::remove_file(path).map_err(WalError::from_io)?;
            self.inner.stats.old_segment_bytes.sub(len);
            self.inner.stats.segments.sub(1);
        }
        Ok(())
    }

    pub fn current_segment(&self) -> Option<u64> {
        self.inner
            .segment
            .lock()
            .segment
            .as_ref()
            .map(|s| s.id())
    }

    pub fn wal_dir(&self) -> &Path {
        &self.inner.wal_dir
    }

    pub fn stats(&self) -> crate::stats::WalStatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Idempotent: flush, fsync, and stop the background scheduler thread.
    pub fn close(&mut self) -> Result<(), WalError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if self.inner.enabled {
            {
                let mut state = self.inner.segment.lock();
                state.segment_mut().sync().map_err(WalError::from_io)?;
            }
            {
                let mut sync = self.inner.sync.lock();
                sync.shutdown = true;
                self.inner.sync_cv.notify_one();
            }
            if let Some(handle) = self.sync_thread.take() {
                let _ = handle.join();
            }
        }
        Ok(())
    }
}

impl Drop for WalWriter {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

fn spawn_sync_thread(inner: Arc<WriterInner>) -> JoinHandle<()> {
    std::thread::spawn(move || loop {
        let mut sync = inner.sync.lock();
        while !sync.armed && !sync.shutdown {
            inner.sync_cv.wait(&mut sync);
        }
        if sync.shutdown && !sync.armed {
            return;
        }
        drop(sync);

        if !inner.config.sync_delay.is_zero() {
            std::thread::sleep(inner.config.sync_delay);
        }

        let result = {
            let mut state = inner.segment.lock();
            state.segment_mut().sync().map_err(WalError::from_io)
        };

        let mut sync = inner.sync.lock();
        let waiters = std::mem::take(&mut sync.pending);
        sync.armed = false;
        let shutting_down = sync.shutdown;
        drop(sync);

        for waiter in waiters {
            let _ = waiter.send(result.clone());
        }

        if shutting_down {
            return;
        }
    })
}

fn latest_segment_id(dir: &Path) -> Result<Option<u64>, WalError> {
    let mut max_id = None;
    for entry in fs::read_dir(dir).map_err(WalError::from_io)? {
        let entry = entry.map_err(WalError::from_io)?;
        let name = entry.file_name().to_string_lossy().to_string();
        if let Some(id) = parse_segment_id(&name) {
            max_id = Some(max_id.map_or(id, |m: u64| m.max(id)));
        }
    }
    Ok(max_id)
}

