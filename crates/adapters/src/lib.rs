//! # tagstream-adapters
//!
//! Adapter implementations for ports (in-process backend, synthetic signal,
//! JSON telemetry).
//! This crate depends on `ports`, `domain`, and `shared`.

pub mod backend;
pub mod log_sink;
pub mod source;
pub mod telemetry;

pub use backend::{DeliveryStats, InProcessBackend};
pub use log_sink::{LogSink, MemoryLogSink, StderrLogSink};
pub use source::{SignalSpec, SyntheticSource};
pub use telemetry::JsonTelemetry;

/// Returns the adapters crate version.
#[must_use]
pub const fn adapters_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
