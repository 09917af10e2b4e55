//! # tagstream-measurement
//!
//! Start-stop histogramming of time-tag streams.
//!
//! - `HistogramStore` - sparse bin map with ordered snapshots
//! - `PendingStartTracker` - the single open interval
//! - `TagStreamProcessor` - pairs starts with clicks
//! - `Measurement` - lifecycle under one instance lock
//! - `CustomStartStop` - the measurement consumers use
//! - `StartStopReference` - independent implementation for cross-checks
//!
//! This crate depends on `ports`, `domain`, and `shared`.

pub mod histogram_store;
pub mod lifecycle;
pub mod pending;
pub mod processor;
pub mod reference;
pub mod start_stop;

pub use histogram_store::HistogramStore;
pub use lifecycle::Measurement;
pub use pending::PendingStartTracker;
pub use processor::{ProcessingStats, TagStreamProcessor};
pub use reference::StartStopReference;
pub use start_stop::{CustomStartStop, StartStopHooks};

/// Returns the measurement crate version.
#[must_use]
pub const fn measurement_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
