//! JSON telemetry adapter (counters and timers).

use crate::log_sink::LogSink;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tagstream_ports::{TelemetryPort, TelemetryTags, TelemetryTimer};

/// Telemetry adapter that emits one JSON line per metric.
#[derive(Clone)]
pub struct JsonTelemetry {
    sink: Arc<dyn LogSink>,
    base_tags: TelemetryTags,
}

impl JsonTelemetry {
    /// Create a telemetry adapter backed by the provided sink.
    #[must_use]
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            sink,
            base_tags: TelemetryTags::new(),
        }
    }

    /// Set base tags applied to every metric.
    #[must_use]
    pub fn with_base_tags(mut self, tags: TelemetryTags) -> Self {
        self.base_tags = tags;
        self
    }
}

impl TelemetryPort for JsonTelemetry {
    fn increment_counter(&self, name: &str, value: u64, tags: Option<&TelemetryTags>) {
        let tags = merge_tags(&self.base_tags, tags);
        self.sink
            .write_line(&metric_payload("counter", name, value, None, &tags));
    }

    fn record_timer_ms(&self, name: &str, duration_ms: u64, tags: Option<&TelemetryTags>) {
        let tags = merge_tags(&self.base_tags, tags);
        self.sink
            .write_line(&metric_payload("timer", name, duration_ms, Some("ms"), &tags));
    }

    fn start_timer(&self, name: &str, tags: Option<&TelemetryTags>) -> Box<dyn TelemetryTimer> {
        Box::new(JsonTelemetryTimer {
            sink: Arc::clone(&self.sink),
            name: name.into(),
            tags: merge_tags(&self.base_tags, tags),
            started_at: Instant::now(),
            stopped: AtomicBool::new(false),
        })
    }
}

struct JsonTelemetryTimer {
    sink: Arc<dyn LogSink>,
    name: Box<str>,
    tags: TelemetryTags,
    started_at: Instant,
    stopped: AtomicBool,
}

impl TelemetryTimer for JsonTelemetryTimer {
    fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        let duration_ms = u64::try_from(self.started_at.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.sink.write_line(&metric_payload(
            "timer",
            &self.name,
            duration_ms,
            Some("ms"),
            &self.tags,
        ));
    }
}

fn metric_payload(
    metric_type: &str,
    name: &str,
    value: u64,
    unit: Option<&str>,
    tags: &TelemetryTags,
) -> String {
    let mut payload = serde_json::Map::new();
    payload.insert("type".to_string(), Value::from("metric"));
    payload.insert("timestampMs".to_string(), Value::from(now_epoch_ms()));
    payload.insert("metricType".to_string(), Value::from(metric_type));
    payload.insert("name".to_string(), Value::from(name));
    payload.insert("value".to_string(), Value::from(value));
    if let Some(unit) = unit {
        payload.insert("unit".to_string(), Value::from(unit));
    }
    if !tags.is_empty() {
        let tags = tags
            .iter()
            .map(|(key, value)| (key.to_string(), Value::from(value.as_ref())))
            .collect();
        payload.insert("tags".to_string(), Value::Object(tags));
    }

    serde_json::to_string(&Value::Object(payload)).map_or_else(
        |_| {
            "{\"type\":\"metric\",\"metricType\":\"error\",\"name\":\"telemetry.serialize_failed\",\"value\":1}\n"
                .to_string()
        },
        |mut encoded| {
            encoded.push('\n');
            encoded
        },
    )
}

fn merge_tags(base: &TelemetryTags, extra: Option<&TelemetryTags>) -> TelemetryTags {
    let mut merged = base.clone();
    if let Some(extra) = extra {
        merged.extend(extra.iter().map(|(key, value)| (key.clone(), value.clone())));
    }
    merged
}

fn now_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|duration| u64::try_from(duration.as_millis()).ok())
        .unwrap_or_default()
}
