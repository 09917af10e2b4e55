//! Telemetry double that keeps every recorded metric.

use std::sync::{Arc, Mutex};
use tagstream_ports::{TelemetryPort, TelemetryTags, TelemetryTimer};

/// One recorded metric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedMetric {
    /// `counter` or `timer`.
    pub kind: &'static str,
    /// Metric name.
    pub name: String,
    /// Counter increment or duration in ms.
    pub value: u64,
    /// Tags passed with the metric.
    pub tags: TelemetryTags,
}

/// Records metrics in memory.
#[derive(Debug, Default, Clone)]
pub struct CaptureTelemetry {
    metrics: Arc<Mutex<Vec<CapturedMetric>>>,
}

impl CaptureTelemetry {
    /// Empty capture.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every metric so far.
    pub fn metrics(&self) -> Vec<CapturedMetric> {
        self.metrics.lock().unwrap().clone()
    }

    /// Sum of all increments of counter `name`.
    pub fn counter(&self, name: &str) -> u64 {
        self.metrics()
            .iter()
            .filter(|metric| metric.kind == "counter" && metric.name == name)
            .map(|metric| metric.value)
            .sum()
    }

    /// True when timer `name` was recorded at least once.
    pub fn has_timer(&self, name: &str) -> bool {
        self.metrics()
            .iter()
            .any(|metric| metric.kind == "timer" && metric.name == name)
    }

    fn push(&self, kind: &'static str, name: &str, value: u64, tags: Option<&TelemetryTags>) {
        self.metrics.lock().unwrap().push(CapturedMetric {
            kind,
            name: name.to_string(),
            value,
            tags: tags.cloned().unwrap_or_default(),
        });
    }
}

struct CaptureTimer {
    owner: CaptureTelemetry,
    name: String,
    tags: Option<TelemetryTags>,
}

impl TelemetryTimer for CaptureTimer {
    fn stop(&self) {
        self.owner.push("timer", &self.name, 0, self.tags.as_ref());
    }
}

impl TelemetryPort for CaptureTelemetry {
    fn increment_counter(&self, name: &str, value: u64, tags: Option<&TelemetryTags>) {
        self.push("counter", name, value, tags);
    }

    fn record_timer_ms(&self, name: &str, duration_ms: u64, tags: Option<&TelemetryTags>) {
        self.push("timer", name, duration_ms, tags);
    }

    fn start_timer(&self, name: &str, tags: Option<&TelemetryTags>) -> Box<dyn TelemetryTimer> {
        Box::new(CaptureTimer {
            owner: self.clone(),
            name: name.to_string(),
            tags: tags.cloned(),
        })
    }
}
