//! The points writer's statistics surface (spec.md §6): `writeReq`,
//! `pointWriteReq` (called `pointReq` in §6's name list), `writeOk`,
//! `writeDropped` (`writeDrop`), `writeTimeout`, `writeErr`, plus subscriber
//! fan-out counters `subWriteOk`/`subWriteDrop`.

use tsdb_core::stats::Counter;

#[derive(Debug, Default)]
pub struct PointsWriterStats {
    pub write_req: Counter,
    pub point_write_req: Counter,
    pub write_ok: Counter,
    pub write_dropped: Counter,
    pub write_timeout: Counter,
    pub write_err: Counter,
    pub sub_write_ok: Counter,
    pub sub_write_drop: Counter,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PointsWriterStatsSnapshot {
    pub write_req: u64,
    pub point_write_req: u64,
    pub write_ok: u64,
    pub write_dropped: u64,
    pub write_timeout: u64,
    pub write_err: u64,
    pub sub_write_ok: u64,
    pub sub_write_drop: u64,
}

impl PointsWriterStats {
    pub fn snapshot(&self) -> PointsWriterStatsSnapshot {
        PointsWriterStatsSnapshot {
            write_req: self.write_req.get(),
            point_write_req: self.point_write_req.get(),
            write_ok: self.write_ok.get(),
            write_dropped: self.write_dropped.get(),
            write_timeout: self.write_timeout.get(),
            write_err: self.write_err.get(),
            sub_write_ok: self.sub_write_ok.get(),
            sub_write_drop: self.sub_write_drop.get(),
        }
    }
}
