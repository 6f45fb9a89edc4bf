//! Write-subscriber fan-out (spec.md §6, §9 Open Questions).
//!
//! The source's subscriber manager has a data race when a subscriber's
//! channel is nil concurrently with fan-out; spec.md's resolution (§9) is
//! to serialize `AddWriteSubscriber` and fan-out under the same lock, which
//! is what `Subscribers` does here with a single `parking_lot::RwLock`
//! around the registry.

use crate::collaborators::WritePointsRequest;
use crate::stats::PointsWriterStats;
use parking_lot::RwLock;
use tokio::sync::mpsc::Sender;

/// Registry of subscriber channels. Fan-out is a non-blocking `try_send`
/// per subscriber: a full channel is a silent drop, counted in
/// `subWriteDrop` rather than backpressuring the write path.
#[derive(Default)]
pub struct Subscribers {
    channels: RwLock<Vec<Sender<WritePointsRequest>>>,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, sender: Sender<WritePointsRequest>) {
        self.channels.write().push(sender);
    }

    /// Forward `request` to every registered subscriber. Never blocks:
    /// a full channel counts as a drop for that subscriber.
    pub fn notify(&self, request: &WritePointsRequest, stats: &PointsWriterStats) {
        let channels = self.channels.read();
        for sender in channels.iter() {
            match sender.try_send(request.clone()) {
                Ok(()) => stats.sub_write_ok.incr(),
                Err(_) => stats.sub_write_drop.incr(),
            }
        }
    }

    pub fn len(&self) -> usize {
        self.channels.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsdb_core::Point;

    #[tokio::test]
    async fn full_channel_counts_as_a_drop_without_blocking() {
        let subs = Subscribers::new();
        let (tx, mut rx) = tokio::sync::mpsc::channel(1);
        subs.add(tx);

        let stats = PointsWriterStats::default();
        let req = WritePointsRequest {
            database: "d".into(),
            retention_policy: "autogen".into(),
            points: vec![Point::new("cpu", 1)],
        };

        subs.notify(&req, &stats);
        subs.notify(&req, &stats);

        assert_eq!(stats.sub_write_ok.get(), 1);
        assert_eq!(stats.sub_write_drop.get(), 1);
        assert!(rx.try_recv().is_ok());
    }
}
