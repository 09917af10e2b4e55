//! Acquisition runner: wires backend, synthetic source and measurements,
//! streams blocks on a worker thread and reports the outcome.

use crate::InfraResult;
use serde::Serialize;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tagstream_adapters::{InProcessBackend, SignalSpec, SyntheticSource};
use tagstream_config::{AppConfig, SourceConfig, ValidatedAppConfig};
use tagstream_domain::{CaptureDuration, ChannelId, HistogramPoint, total_counts};
use tagstream_measurement::{CustomStartStop, Measurement, ProcessingStats, StartStopReference};
use tagstream_ports::{TaggerBackend, TelemetryPort, telemetry_tags};
use tagstream_shared::{ErrorClass, ErrorCode, ErrorEnvelope};

/// Outcome of one acquisition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcquisitionReport {
    /// Final histogram, ascending by time.
    pub histogram: Vec<HistogramPoint>,
    /// Histogram of the reference measurement when verification ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<Vec<HistogramPoint>>,
    /// Whether both histograms agree; `None` without verification.
    pub matches_reference: Option<bool>,
    /// Processor counters.
    pub stats: ProcessingStats,
    /// Sum of all bin counts.
    pub total_counts: u64,
    /// Blocks pushed by the backend.
    pub blocks: u64,
    /// Tags delivered to measurements after channel filtering.
    pub tags: u64,
    /// True when the capture window closed before the source ran out.
    pub completed: bool,
}

impl AcquisitionReport {
    /// False only when verification ran and found a difference.
    #[must_use]
    pub fn verified(&self) -> bool {
        self.matches_reference.unwrap_or(true)
    }
}

/// Run one capture window as described by `config`.
///
/// `observer` is called from the calling thread with a consistent histogram
/// snapshot every `pollIntervalMs` and once more when the window closes.
pub fn run_acquisition(
    config: &ValidatedAppConfig,
    telemetry: &dyn TelemetryPort,
    mut observer: impl FnMut(&[HistogramPoint]),
) -> InfraResult<AcquisitionReport> {
    let config: &AppConfig = config.as_ref();
    let timer = telemetry.start_timer("acquisition.total", None);

    let backend = Arc::new(InProcessBackend::new(config.acquisition.max_channel));
    let source = SyntheticSource::new(signal_spec(&config.source)?)?;
    let shared: Arc<dyn TaggerBackend> = backend.clone();

    let measurement = CustomStartStop::new(
        Arc::clone(&shared),
        config.measurement.click_channel_id(),
        config.measurement.start_channel_id(),
        ticks("binWidthPs", config.measurement.bin_width_ps)?,
    )?;
    let reference = if config.acquisition.verify {
        Some(StartStopReference::attach(
            Arc::clone(&shared),
            measurement.roles(),
            measurement.bin_width(),
        )?)
    } else {
        None
    };

    let duration = CaptureDuration::new(ticks("durationPs", config.acquisition.duration_ps)?)?;
    let block_cap = block_cap(duration, source.spec().block_duration);
    let poll = Duration::from_millis(config.acquisition.poll_interval_ms);

    tracing::info!(
        click = %measurement.roles().click(),
        start = %measurement.roles().start(),
        bin_width = measurement.bin_width().get(),
        duration = duration.get(),
        verify = reference.is_some(),
        "acquisition starting"
    );

    measurement.start_for(duration, true)?;
    if let Some(reference) = &reference {
        reference.start_for(duration, true)?;
    }

    let completed = thread::scope(|scope| -> InfraResult<bool> {
        let worker = scope.spawn(|| {
            stream_blocks(&backend, source, block_cap, &measurement, reference.as_ref())
        });

        loop {
            let finished = measurement.wait_until_finished(poll)?;
            let drained = worker.is_finished();
            observer(&measurement.get_data()?);
            if finished || drained {
                break;
            }
        }

        worker.join().map_err(|_| {
            ErrorEnvelope::unexpected(
                ErrorCode::internal(),
                "acquisition worker panicked",
                ErrorClass::NonRetriable,
            )
        })??;
        Ok(!measurement.is_running()?)
    })?;

    measurement.stop()?;
    if let Some(reference) = &reference {
        reference.stop()?;
    }

    let (histogram, stats) = measurement.snapshot()?;
    let reference_histogram = reference
        .as_ref()
        .map(|reference| reference.with_hooks(StartStopReference::histogram))
        .transpose()?;
    let matches_reference = reference_histogram
        .as_ref()
        .map(|expected| expected == &histogram);
    let delivery = backend.stats();

    let report = AcquisitionReport {
        total_counts: total_counts(&histogram),
        histogram,
        reference: reference_histogram,
        matches_reference,
        stats,
        blocks: delivery.blocks,
        tags: delivery.tags,
        completed,
    };

    publish(telemetry, &report, measurement.roles().click());
    timer.stop();

    if report.verified() {
        tracing::info!(
            pairs = report.stats.pairs,
            bins = report.histogram.len(),
            blocks = report.blocks,
            completed,
            "acquisition finished"
        );
    } else {
        tracing::warn!(
            pairs = report.stats.pairs,
            bins = report.histogram.len(),
            "histogram differs from reference measurement"
        );
    }
    Ok(report)
}

fn stream_blocks(
    backend: &InProcessBackend,
    source: SyntheticSource,
    block_cap: u64,
    measurement: &CustomStartStop,
    reference: Option<&Measurement<StartStopReference>>,
) -> InfraResult<()> {
    for block in source.take(usize::try_from(block_cap).unwrap_or(usize::MAX)) {
        let reference_running = match reference {
            Some(reference) => reference.is_running()?,
            None => false,
        };
        if !measurement.is_running()? && !reference_running {
            break;
        }
        backend.deliver(&block)?;
    }
    Ok(())
}

/// Blocks needed to cover `duration` plus one block of slack on each side.
fn block_cap(duration: CaptureDuration, block_duration: i64) -> u64 {
    let duration = u64::try_from(duration.get()).unwrap_or(0);
    let block_duration = u64::try_from(block_duration).unwrap_or(1).max(1);
    duration.div_ceil(block_duration).saturating_add(2)
}

fn publish(telemetry: &dyn TelemetryPort, report: &AcquisitionReport, click: ChannelId) {
    let click = click.to_string();
    let tags = telemetry_tags(&[("click", click.as_str())]);
    let tags = Some(&tags);

    let stats = &report.stats;
    telemetry.increment_counter("measurement.tags", stats.tags, tags);
    telemetry.increment_counter("measurement.pairs", stats.pairs, tags);
    telemetry.increment_counter("measurement.anomalies", stats.anomalies, tags);
    telemetry.increment_counter("measurement.dropped_starts", stats.dropped_starts, tags);
    telemetry.increment_counter("measurement.out_of_order", stats.out_of_order, tags);
    telemetry.increment_counter("backend.blocks", report.blocks, tags);
    telemetry.increment_counter("backend.tags", report.tags, tags);
    if report.matches_reference == Some(false) {
        telemetry.increment_counter("acquisition.verify_mismatch", 1, tags);
    }
}

/// Translate the `source` config section into a signal shape.
pub fn signal_spec(source: &SourceConfig) -> InfraResult<SignalSpec> {
    Ok(SignalSpec {
        start_channel: ChannelId::new(source.start_channel),
        stop_channel: ChannelId::new(source.stop_channel),
        period: ticks("periodPs", source.period_ps)?,
        stop_delay: ticks("stopDelayPs", source.stop_delay_ps)?,
        jitter: ticks("jitterPs", source.jitter_ps)?,
        block_duration: ticks("blockDurationPs", source.block_duration_ps)?,
        overflow_every_blocks: source.overflow_every_blocks,
        noise_channel: source.noise_channel.map(ChannelId::new),
    })
}

fn ticks(field: &str, value: u64) -> InfraResult<i64> {
    i64::try_from(value).map_err(|_| {
        ErrorEnvelope::expected(
            ErrorCode::invalid_input(),
            format!("{field} does not fit in a timestamp"),
        )
        .with_metadata("field", field)
        .with_metadata("value", value.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagstream_testkit::CaptureTelemetry;

    fn small_config(verify: bool) -> Result<ValidatedAppConfig, ErrorEnvelope> {
        let mut config = AppConfig::default();
        config.measurement.bin_width_ps = 10;
        config.source.period_ps = 10_000;
        config.source.stop_delay_ps = 1_000;
        config.source.jitter_ps = 50;
        config.source.block_duration_ps = 100_000;
        config.acquisition.duration_ps = 1_000_000;
        config.acquisition.poll_interval_ms = 5;
        config.acquisition.verify = verify;
        Ok(config.validate_and_normalize()?)
    }

    #[test]
    fn acquisition_matches_reference() -> Result<(), Box<dyn std::error::Error>> {
        let config = small_config(true)?;
        let telemetry = CaptureTelemetry::new();
        let mut snapshots = 0;

        let report = run_acquisition(&config, &telemetry, |_| snapshots += 1)?;

        assert!(report.completed);
        assert_eq!(report.matches_reference, Some(true));
        assert!(report.verified());
        assert_eq!(report.stats.pairs, 100);
        assert_eq!(report.total_counts, 100);
        assert!(report.histogram.iter().all(|point| (950..=1_050).contains(&point.time)));
        assert!(snapshots >= 1);
        assert_eq!(telemetry.counter("measurement.pairs"), 100);
        assert_eq!(telemetry.counter("backend.blocks"), report.blocks);
        assert_eq!(telemetry.counter("acquisition.verify_mismatch"), 0);
        assert!(telemetry.has_timer("acquisition.total"));
        Ok(())
    }

    #[test]
    fn acquisition_without_verification_skips_reference()
    -> Result<(), Box<dyn std::error::Error>> {
        let config = small_config(false)?;
        let report = run_acquisition(&config, &CaptureTelemetry::new(), |_| {})?;

        assert_eq!(report.matches_reference, None);
        assert!(report.reference.is_none());
        assert!(report.verified());
        assert_eq!(report.stats.pairs, 100);
        Ok(())
    }

    #[test]
    fn overflow_blocks_reset_pending_starts() -> Result<(), Box<dyn std::error::Error>> {
        let mut config = small_config(true)?.into_inner();
        config.source.overflow_every_blocks = Some(2);
        let config = config.validate_and_normalize()?;

        let report = run_acquisition(&config, &CaptureTelemetry::new(), |_| {})?;

        assert_eq!(report.matches_reference, Some(true));
        assert!(report.stats.anomalies > 0);
        assert!(report.stats.pairs < 100);
        Ok(())
    }

    #[test]
    fn invalid_source_is_rejected_before_streaming() -> Result<(), Box<dyn std::error::Error>> {
        let mut config = AppConfig::default();
        config.source.stop_channel = config.source.start_channel;
        let config = config.validate_and_normalize()?;

        let error = run_acquisition(&config, &CaptureTelemetry::new(), |_| {})
            .err()
            .ok_or("expected error")?;
        assert_eq!(error.code, ErrorCode::new("source", "invalid_signal"));
        Ok(())
    }

    #[test]
    fn block_cap_covers_window() -> Result<(), Box<dyn std::error::Error>> {
        let duration = CaptureDuration::new(1_000)?;
        assert_eq!(block_cap(duration, 100), 12);
        assert_eq!(block_cap(duration, 300), 6);
        Ok(())
    }
}
