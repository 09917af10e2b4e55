//! Sparse bin-index to count map.

use rustc_hash::FxHashMap;
use tagstream_domain::{BinWidth, HistogramPoint};

/// Histogram keyed by bin index; bins are created on first use.
#[derive(Debug, Clone)]
pub struct HistogramStore {
    bin_width: BinWidth,
    bins: FxHashMap<i64, u64>,
}

impl HistogramStore {
    /// Empty store with the given bin width.
    #[must_use]
    pub fn new(bin_width: BinWidth) -> Self {
        Self {
            bin_width,
            bins: FxHashMap::default(),
        }
    }

    /// Configured bin width.
    #[must_use]
    pub const fn bin_width(&self) -> BinWidth {
        self.bin_width
    }

    /// Add one count to `bin`.
    pub fn increment(&mut self, bin: i64) {
        *self.bins.entry(bin).or_insert(0) += 1;
    }

    /// Add one count to the bin containing `elapsed` and return that bin.
    pub fn record_elapsed(&mut self, elapsed: i64) -> i64 {
        let bin = self.bin_width.bin_of(elapsed);
        self.increment(bin);
        bin
    }

    /// Count stored for `bin` (zero when absent).
    #[must_use]
    pub fn count(&self, bin: i64) -> u64 {
        self.bins.get(&bin).copied().unwrap_or(0)
    }

    /// Every populated bin as `(bin * bin_width, count)`, ascending.
    #[must_use]
    pub fn snapshot(&self) -> Vec<HistogramPoint> {
        let mut bins: Vec<(i64, u64)> =
            self.bins.iter().map(|(&bin, &count)| (bin, count)).collect();
        bins.sort_unstable_by_key(|&(bin, _)| bin);
        bins.into_iter()
            .map(|(bin, count)| HistogramPoint::new(self.bin_width.bin_time(bin), count))
            .collect()
    }

    /// Drop every bin.
    pub fn clear(&mut self) {
        self.bins.clear();
    }

    /// Number of populated bins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    /// True when no bin is populated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Sum of all counts.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.bins.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tagstream_domain::PrimitiveError;

    #[test]
    fn snapshot_is_sorted_and_scaled() -> Result<(), PrimitiveError> {
        let mut store = HistogramStore::new(BinWidth::new(10)?);
        store.increment(7);
        store.increment(2);
        store.increment(7);

        assert_eq!(
            store.snapshot(),
            vec![HistogramPoint::new(20, 1), HistogramPoint::new(70, 2)]
        );
        assert_eq!(store.count(7), 2);
        assert_eq!(store.count(3), 0);
        assert_eq!(store.total(), 3);
        Ok(())
    }

    #[test]
    fn record_elapsed_truncates() -> Result<(), PrimitiveError> {
        let mut store = HistogramStore::new(BinWidth::new(50)?);
        assert_eq!(store.record_elapsed(349), 6);
        assert_eq!(store.snapshot(), vec![HistogramPoint::new(300, 1)]);
        Ok(())
    }

    #[test]
    fn clear_empties() -> Result<(), PrimitiveError> {
        let mut store = HistogramStore::new(BinWidth::new(1)?);
        store.increment(0);
        store.clear();
        assert!(store.is_empty());
        assert!(store.snapshot().is_empty());
        Ok(())
    }

    proptest! {
        #[test]
        fn snapshot_preserves_counts(bins in prop::collection::vec(0_i64..500, 0..200)) {
            let mut store = HistogramStore::new(BinWidth::new(3).map_err(|error| TestCaseError::fail(error.to_string()))?);
            for &bin in &bins {
                store.increment(bin);
            }
            let snapshot = store.snapshot();
            prop_assert!(snapshot.windows(2).all(|pair| pair[0].time < pair[1].time));
            prop_assert_eq!(snapshot.iter().map(|point| point.count).sum::<u64>(), bins.len() as u64);
            prop_assert_eq!(snapshot.len(), store.len());
        }
    }
}
