//! Telemetry wiring for CLI surfaces.

use std::sync::Arc;
use tagstream_adapters::{JsonTelemetry, LogSink, StderrLogSink};
use tagstream_config::LoggingConfig;
use tagstream_ports::{NoopTelemetry, TelemetryPort, telemetry_tags};

/// Build the telemetry port selected by `logging.metrics`.
///
/// Metrics go to stderr as JSON lines so stdout stays reserved for command
/// output.
pub fn telemetry_from_config(logging: &LoggingConfig) -> Arc<dyn TelemetryPort> {
    if logging.metrics {
        build_json_telemetry(Arc::new(StderrLogSink))
    } else {
        Arc::new(NoopTelemetry)
    }
}

/// JSON telemetry writing to `sink`, tagged with the service name.
pub fn build_json_telemetry(sink: Arc<dyn LogSink>) -> Arc<dyn TelemetryPort> {
    Arc::new(JsonTelemetry::new(sink).with_base_tags(telemetry_tags(&[("service", "tagstream")])))
}
