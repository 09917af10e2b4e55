//! Run command handler.

use crate::error::{CliError, ExitCode};
use crate::format::OutputMode;
use crate::logging::init_tracing;
use crate::{CliOutput, format_error_output, format_ndjson_summary, infra_exit_code, log_info};
use clap::Args;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tagstream_config::{StartChannelOverride, ValidatedAppConfig};
use tagstream_domain::{HistogramPoint, peak, total_counts};
use tagstream_infra::{
    AcquisitionReport, InfraResult, load_effective_config, run_acquisition, telemetry_from_config,
};
use tagstream_shared::ErrorEnvelope;

/// Bins printed by the text output before the summary.
const TEXT_PREVIEW_BINS: usize = 10;

/// Flags of the `run` command. Flags win over env, overrides and file.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Optional config file path (JSON/TOML).
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// JSON object merged over the config file.
    #[arg(long)]
    pub overrides_json: Option<String>,
    /// Channel whose tags close an interval (negative for falling edge).
    #[arg(long, allow_negative_numbers = true)]
    pub click_channel: Option<i32>,
    /// Channel whose tags open an interval, or `unused`.
    #[arg(long, value_parser = parse_start_channel, allow_hyphen_values = true)]
    pub start_channel: Option<StartChannelOverride>,
    /// Histogram bin width in ps.
    #[arg(long)]
    pub bin_width_ps: Option<u64>,
    /// Capture window in ps of stream time.
    #[arg(long)]
    pub duration_ps: Option<u64>,
    /// Skip the reference cross-check.
    #[arg(long)]
    pub no_verify: bool,
    /// Print a progress line on stderr for every live snapshot.
    #[arg(long)]
    pub watch: bool,
}

/// Run one acquisition and print the histogram.
pub fn run_acquire(
    mode: OutputMode,
    env: &BTreeMap<String, String>,
    args: &RunArgs,
) -> Result<CliOutput, CliError> {
    let loaded = load_effective_config(env, args.config.as_deref(), args.overrides_json.as_deref())
        .and_then(|config| apply_flags(config, args));
    let config = match loaded {
        Ok(config) => config,
        Err(error) => return Ok(format_error_output(mode, &error, infra_exit_code(&error))),
    };

    init_tracing(&config.logging);
    let telemetry = telemetry_from_config(&config.logging);

    let mut stderr = String::new();
    let report = match run_acquisition(&config, telemetry.as_ref(), |points| {
        if args.watch {
            eprintln!("{}", format_watch_line(points.len(), total_counts(points)));
        }
    }) {
        Ok(report) => report,
        Err(error) => return Ok(format_error_output(mode, &error, infra_exit_code(&error))),
    };
    log_info(&mut stderr, "acquisition completed", mode.no_progress);

    let (status, exit_code) = if report.verified() {
        ("ok", ExitCode::Ok)
    } else {
        ("mismatch", ExitCode::VerificationFailed)
    };

    let stdout = if mode.is_ndjson() {
        format_report_ndjson(status, &report)?
    } else if mode.is_json() {
        let payload = serde_json::json!({
            "status": status,
            "report": report,
        });
        let mut output = serde_json::to_string_pretty(&payload)?;
        output.push('\n');
        output
    } else {
        format_report_text(status, &report)
    };

    Ok(CliOutput {
        stdout,
        stderr,
        exit_code,
    })
}

fn apply_flags(config: ValidatedAppConfig, args: &RunArgs) -> InfraResult<ValidatedAppConfig> {
    let mut config = config.into_inner();
    if let Some(click) = args.click_channel {
        config.measurement.click_channel = click;
    }
    if let Some(start) = args.start_channel {
        config.measurement.start_channel = start.as_config();
    }
    if let Some(width) = args.bin_width_ps {
        config.measurement.bin_width_ps = width;
    }
    if let Some(duration) = args.duration_ps {
        config.acquisition.duration_ps = duration;
    }
    if args.no_verify {
        config.acquisition.verify = false;
    }
    config.validate_and_normalize().map_err(ErrorEnvelope::from)
}

fn parse_start_channel(value: &str) -> Result<StartChannelOverride, String> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("unused") {
        return Ok(StartChannelOverride::Unused);
    }
    value
        .parse::<i32>()
        .map(StartChannelOverride::Channel)
        .map_err(|_| format!("expected a channel number or `unused`, got `{value}`"))
}

fn format_watch_line(bins: usize, counts: u64) -> String {
    format!("watch: {bins} bins, {counts} counts")
}

fn verification_label(report: &AcquisitionReport) -> &'static str {
    match report.matches_reference {
        Some(true) => "passed",
        Some(false) => "failed",
        None => "skipped",
    }
}

fn format_report_text(status: &str, report: &AcquisitionReport) -> String {
    let mut out = format!("status: {status}\n");
    for point in report.histogram.iter().take(TEXT_PREVIEW_BINS) {
        out.push_str(&format_point(point));
    }
    let hidden = report.histogram.len().saturating_sub(TEXT_PREVIEW_BINS);
    if hidden > 0 {
        out.push_str(&format!("... {hidden} more bins\n"));
    }
    if let Some(peak) = peak(&report.histogram) {
        out.push_str(&format!("peak: {} ps ({} counts)\n", peak.time, peak.count));
    }
    out.push_str(&format!(
        "bins: {}\ntotal: {}\npairs: {}\nanomalies: {}\nblocks: {}\nverification: {}\n",
        report.histogram.len(),
        report.total_counts,
        report.stats.pairs,
        report.stats.anomalies,
        report.blocks,
        verification_label(report),
    ));
    out
}

fn format_point(point: &HistogramPoint) -> String {
    format!("{} ps: {} counts\n", point.time, point.count)
}

fn format_report_ndjson(status: &str, report: &AcquisitionReport) -> Result<String, CliError> {
    let mut out = String::new();
    for point in &report.histogram {
        out.push_str(&serde_json::to_string(&serde_json::json!({
            "type": "bin",
            "time": point.time,
            "count": point.count,
        }))?);
        out.push('\n');
    }
    out.push_str(&format_ndjson_summary(
        status,
        "run",
        Some(serde_json::json!({
            "bins": report.histogram.len(),
            "totalCounts": report.total_counts,
            "stats": report.stats,
            "blocks": report.blocks,
            "tags": report.tags,
            "completed": report.completed,
            "verification": verification_label(report),
        })),
    ));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagstream_config::AppConfig;
    use tagstream_infra::{InfraError, ProcessingStats};

    fn args() -> RunArgs {
        RunArgs {
            config: None,
            overrides_json: None,
            click_channel: None,
            start_channel: None,
            bin_width_ps: None,
            duration_ps: None,
            no_verify: false,
            watch: false,
        }
    }

    #[test]
    fn start_channel_parser_accepts_unused_and_negatives() {
        assert_eq!(
            parse_start_channel(" Unused "),
            Ok(StartChannelOverride::Unused)
        );
        assert_eq!(
            parse_start_channel("-3"),
            Ok(StartChannelOverride::Channel(-3))
        );
        assert!(parse_start_channel("three").is_err());
    }

    #[test]
    fn flags_override_loaded_config() -> Result<(), InfraError> {
        let config = AppConfig::default().validate_and_normalize()?;
        let flags = RunArgs {
            click_channel: Some(-4),
            start_channel: Some(StartChannelOverride::Unused),
            bin_width_ps: Some(7),
            no_verify: true,
            ..args()
        };

        let config = apply_flags(config, &flags)?;
        assert_eq!(config.measurement.click_channel, -4);
        assert_eq!(config.measurement.start_channel, None);
        assert_eq!(config.measurement.bin_width_ps, 7);
        assert!(!config.acquisition.verify);
        Ok(())
    }

    #[test]
    fn invalid_flag_values_are_rejected() -> Result<(), InfraError> {
        let config = AppConfig::default().validate_and_normalize()?;
        let flags = RunArgs {
            bin_width_ps: Some(0),
            ..args()
        };
        assert!(apply_flags(config, &flags).is_err());
        Ok(())
    }

    #[test]
    fn watch_line_reports_bins_and_counts() {
        assert_eq!(format_watch_line(3, 42), "watch: 3 bins, 42 counts");
    }

    #[test]
    fn text_output_previews_first_bins() {
        let histogram: Vec<HistogramPoint> = (0..12)
            .map(|bin| HistogramPoint::new(bin * 50, 1))
            .collect();
        let report = AcquisitionReport {
            total_counts: 12,
            histogram,
            reference: None,
            matches_reference: None,
            stats: ProcessingStats {
                pairs: 12,
                ..ProcessingStats::default()
            },
            blocks: 3,
            tags: 24,
            completed: true,
        };

        let text = format_report_text("ok", &report);
        assert!(text.starts_with("status: ok\n0 ps: 1 counts\n"));
        assert!(text.contains("450 ps: 1 counts\n"));
        assert!(!text.contains("500 ps: 1 counts\n"));
        assert!(text.contains("... 2 more bins\n"));
        assert!(text.contains("verification: skipped\n"));
    }
}
