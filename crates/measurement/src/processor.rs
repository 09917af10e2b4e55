//! Start-stop pairing over an ordered tag stream.

use crate::histogram_store::HistogramStore;
use crate::pending::PendingStartTracker;
use serde::Serialize;
use tagstream_domain::{BinWidth, ChannelRoles, HistogramPoint, TagEvent};

/// Counters kept while processing; reset together with the histogram.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingStats {
    /// Tags handed to the processor.
    pub tags: u64,
    /// Start-stop pairs added to the histogram.
    pub pairs: u64,
    /// Anomaly markers seen.
    pub anomalies: u64,
    /// Starts overwritten before any click consumed them.
    pub dropped_starts: u64,
    /// Clicks earlier than their pending start.
    pub out_of_order: u64,
}

/// Consumes tags and maintains the pending start and the histogram.
#[derive(Debug, Clone)]
pub struct TagStreamProcessor {
    roles: ChannelRoles,
    pending: PendingStartTracker,
    histogram: HistogramStore,
    stats: ProcessingStats,
}

impl TagStreamProcessor {
    /// Empty processor for the given roles.
    #[must_use]
    pub fn new(roles: ChannelRoles, bin_width: BinWidth) -> Self {
        Self {
            roles,
            pending: PendingStartTracker::default(),
            histogram: HistogramStore::new(bin_width),
            stats: ProcessingStats::default(),
        }
    }

    /// Resolved channel roles.
    #[must_use]
    pub const fn roles(&self) -> ChannelRoles {
        self.roles
    }

    /// Accumulated histogram.
    #[must_use]
    pub const fn histogram(&self) -> &HistogramStore {
        &self.histogram
    }

    /// Counters since the last clear.
    #[must_use]
    pub const fn stats(&self) -> ProcessingStats {
        self.stats
    }

    /// Histogram snapshot, ascending by time.
    #[must_use]
    pub fn snapshot(&self) -> Vec<HistogramPoint> {
        self.histogram.snapshot()
    }

    /// Consume tags in arrival order.
    pub fn process(&mut self, tags: &[TagEvent]) {
        for tag in tags {
            self.consume(tag);
        }
    }

    /// Forget the open interval without touching the histogram.
    pub fn reset_pending(&mut self) {
        self.pending.reset();
    }

    /// Forget the open interval, the histogram and the counters.
    pub fn clear(&mut self) {
        self.pending.reset();
        self.histogram.clear();
        self.stats = ProcessingStats::default();
    }

    fn consume(&mut self, tag: &TagEvent) {
        self.stats.tags += 1;

        if tag.kind.is_anomaly() {
            self.pending.reset();
            self.stats.anomalies += 1;
            return;
        }

        // Close first: in self-referential mode the same tag re-arms below.
        if tag.channel == self.roles.click() {
            if let Some(start) = self.pending.take() {
                match tag.time.checked_sub(start) {
                    Some(elapsed) if elapsed >= 0 => {
                        self.histogram.record_elapsed(elapsed);
                        self.stats.pairs += 1;
                    },
                    _ => self.stats.out_of_order += 1,
                }
            }
        }

        if tag.channel == self.roles.start() && self.pending.arm(tag.time).is_some() {
            self.stats.dropped_starts += 1;
        }
    }
}
