//! Histogram output records.

use crate::primitives::Timestamp;
use serde::{Deserialize, Serialize};

/// One populated histogram bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramPoint {
    /// Left edge of the bin in ticks (`bin * bin_width`).
    pub time: Timestamp,
    /// Number of start-stop pairs that fell into the bin.
    pub count: u64,
}

impl HistogramPoint {
    /// Build a point.
    #[must_use]
    pub const fn new(time: Timestamp, count: u64) -> Self {
        Self { time, count }
    }
}

/// Sum of all counts.
#[must_use]
pub fn total_counts(points: &[HistogramPoint]) -> u64 {
    points.iter().map(|point| point.count).sum()
}

/// Point with the highest count; the earliest bin wins ties.
#[must_use]
pub fn peak(points: &[HistogramPoint]) -> Option<HistogramPoint> {
    points
        .iter()
        .copied()
        .reduce(|best, point| if point.count > best.count { point } else { best })
}
