//! Telemetry boundary contract (counters + timings).

use std::collections::BTreeMap;

/// Telemetry tags. Keep tags low-cardinality.
pub type TelemetryTags = BTreeMap<Box<str>, Box<str>>;

/// Build a tag map from string pairs.
#[must_use]
pub fn telemetry_tags(pairs: &[(&str, &str)]) -> TelemetryTags {
    pairs
        .iter()
        .map(|(key, value)| ((*key).into(), (*value).into()))
        .collect()
}

/// Timer handle.
pub trait TelemetryTimer: Send + Sync {
    /// Stop the timer and record its duration. Later calls are ignored.
    fn stop(&self);
}

/// Boundary contract for telemetry.
pub trait TelemetryPort: Send + Sync {
    /// Increment a counter by `value`.
    fn increment_counter(&self, name: &str, value: u64, tags: Option<&TelemetryTags>);

    /// Record a duration (in milliseconds) for an operation.
    fn record_timer_ms(&self, name: &str, duration_ms: u64, tags: Option<&TelemetryTags>);

    /// Start a timer and return a handle that records on `stop()`.
    fn start_timer(&self, name: &str, tags: Option<&TelemetryTags>) -> Box<dyn TelemetryTimer>;
}

/// Telemetry that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

struct NoopTimer;

impl TelemetryTimer for NoopTimer {
    fn stop(&self) {}
}

impl TelemetryPort for NoopTelemetry {
    fn increment_counter(&self, _name: &str, _value: u64, _tags: Option<&TelemetryTags>) {}

    fn record_timer_ms(&self, _name: &str, _duration_ms: u64, _tags: Option<&TelemetryTags>) {}

    fn start_timer(&self, _name: &str, _tags: Option<&TelemetryTags>) -> Box<dyn TelemetryTimer> {
        Box::new(NoopTimer)
    }
}
