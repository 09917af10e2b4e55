//! Config loading helpers (env + file + overrides).
//!
//! The loader is responsible for deterministic merge order and surfacing
//! user-facing errors as typed `ErrorEnvelope`s.

use crate::{
    AppConfig, LogFormat, StartChannelOverride, TagstreamEnv, ValidatedAppConfig,
    apply_env_overrides,
};
use serde::Deserialize;
use std::path::Path;
use tagstream_shared::{ErrorClass, ErrorCode, ErrorEnvelope};

/// Serialization format of a config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.json` (or no extension).
    Json,
    /// `.toml`.
    Toml,
}

/// Load the app config from sources using a deterministic precedence order.
///
/// Precedence (highest wins):
/// - env overrides (`TagstreamEnv`)
/// - overrides JSON (partial config)
/// - config text (file content in `format`)
/// - defaults (`AppConfig::default()`)
pub fn load_app_config_from_sources(
    config_text: Option<(&str, ConfigFormat)>,
    overrides_json: Option<&str>,
    env: &TagstreamEnv,
) -> Result<ValidatedAppConfig, ErrorEnvelope> {
    let mut config = match config_text {
        None => AppConfig::default(),
        Some((input, format)) => parse_config_unvalidated(input, format)?,
    };

    if let Some(input) = overrides_json {
        let overrides = parse_overrides_json(input)?;
        apply_overrides(&mut config, &overrides);
    }

    // env is applied last and also validates/normalizes the resulting config.
    apply_env_overrides(config, env)
}

/// Load the app config from an optional file path.
pub fn load_app_config_from_path(
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
    env: &TagstreamEnv,
) -> Result<ValidatedAppConfig, ErrorEnvelope> {
    match config_path {
        None => load_app_config_from_sources(None, overrides_json, env),
        Some(path) => {
            let format = detect_config_format(path)?;
            let config_text = read_config_file(path)?;
            load_app_config_from_sources(Some((config_text.as_str(), format)), overrides_json, env)
        },
    }
}

/// Load the app config from std env and an optional file path.
pub fn load_app_config_std_env(
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
) -> Result<ValidatedAppConfig, ErrorEnvelope> {
    let env = TagstreamEnv::from_std_env().map_err(ErrorEnvelope::from)?;
    load_app_config_from_path(config_path, overrides_json, &env)
}

/// Serialize the config as deterministic pretty JSON (with trailing newline).
pub fn to_pretty_json(config: &AppConfig) -> Result<String, ErrorEnvelope> {
    let mut output = serde_json::to_string_pretty(config).map_err(|error| {
        ErrorEnvelope::unexpected(
            ErrorCode::internal(),
            format!("failed to serialize config: {error}"),
            ErrorClass::NonRetriable,
        )
    })?;
    output.push('\n');
    Ok(output)
}

/// Serialize the config as deterministic pretty TOML (with trailing newline).
pub fn to_pretty_toml(config: &AppConfig) -> Result<String, ErrorEnvelope> {
    let mut output = toml::to_string_pretty(config).map_err(|error| {
        ErrorEnvelope::unexpected(
            ErrorCode::new("config", "serialize_toml"),
            format!("failed to serialize config TOML: {error}"),
            ErrorClass::NonRetriable,
        )
    })?;
    if !output.ends_with('\n') {
        output.push('\n');
    }
    Ok(output)
}

/// Detect the config format from a file extension.
pub fn detect_config_format(path: &Path) -> Result<ConfigFormat, ErrorEnvelope> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        None | Some("json") => Ok(ConfigFormat::Json),
        Some("toml") => Ok(ConfigFormat::Toml),
        Some(other) => Err(ErrorEnvelope::expected(
            ErrorCode::new("config", "unsupported_format"),
            "unsupported config format; use .json or .toml",
        )
        .with_metadata("extension", other.to_string())),
    }
}

fn parse_config_unvalidated(input: &str, format: ConfigFormat) -> Result<AppConfig, ErrorEnvelope> {
    match format {
        ConfigFormat::Json => serde_json::from_str(input).map_err(|error| {
            ErrorEnvelope::expected(
                ErrorCode::new("config", "invalid_json"),
                format!("invalid config JSON: {error}"),
            )
            .with_metadata("source", "config")
        }),
        ConfigFormat::Toml => toml::from_str(input).map_err(|error| {
            ErrorEnvelope::expected(
                ErrorCode::new("config", "invalid_toml"),
                format!("invalid config TOML: {error}"),
            )
            .with_metadata("source", "config")
        }),
    }
}

fn parse_overrides_json(input: &str) -> Result<AppConfigOverrides, ErrorEnvelope> {
    serde_json::from_str(input).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::new("config", "invalid_json"),
            format!("invalid overrides JSON: {error}"),
        )
        .with_metadata("source", "overrides")
    })
}

fn read_config_file(path: &Path) -> Result<String, ErrorEnvelope> {
    std::fs::read_to_string(path).map_err(|error| {
        let code = match error.kind() {
            std::io::ErrorKind::NotFound => ErrorCode::new("config", "config_file_not_found"),
            std::io::ErrorKind::PermissionDenied => {
                ErrorCode::new("config", "config_file_permission_denied")
            },
            _ => ErrorCode::new("config", "config_file_io"),
        };

        ErrorEnvelope::expected(code, format!("failed to read config file: {error}"))
            .with_metadata("path", path.to_string_lossy().to_string())
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct AppConfigOverrides {
    version: Option<u32>,
    measurement: MeasurementOverrides,
    source: SourceOverrides,
    acquisition: AcquisitionOverrides,
    logging: LoggingOverrides,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct MeasurementOverrides {
    click_channel: Option<i32>,
    // absent keeps the base value, `null` clears it
    #[serde(deserialize_with = "deserialize_start_channel")]
    start_channel: Option<StartChannelOverride>,
    bin_width_ps: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct SourceOverrides {
    start_channel: Option<i32>,
    stop_channel: Option<i32>,
    period_ps: Option<u64>,
    stop_delay_ps: Option<u64>,
    jitter_ps: Option<u64>,
    block_duration_ps: Option<u64>,
    overflow_every_blocks: Option<u32>,
    noise_channel: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct AcquisitionOverrides {
    duration_ps: Option<u64>,
    verify: Option<bool>,
    poll_interval_ms: Option<u64>,
    max_channel: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct LoggingOverrides {
    level: Option<Box<str>>,
    format: Option<LogFormat>,
    metrics: Option<bool>,
}

fn deserialize_start_channel<'de, D>(
    deserializer: D,
) -> Result<Option<StartChannelOverride>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let channel = Option::<i32>::deserialize(deserializer)?;
    Ok(Some(
        channel.map_or(StartChannelOverride::Unused, StartChannelOverride::Channel),
    ))
}

fn apply_overrides(config: &mut AppConfig, overrides: &AppConfigOverrides) {
    set(&mut config.version, overrides.version);

    let measurement = &overrides.measurement;
    set(&mut config.measurement.click_channel, measurement.click_channel);
    if let Some(start) = measurement.start_channel {
        config.measurement.start_channel = start.as_config();
    }
    set(&mut config.measurement.bin_width_ps, measurement.bin_width_ps);

    let source = &overrides.source;
    set(&mut config.source.start_channel, source.start_channel);
    set(&mut config.source.stop_channel, source.stop_channel);
    set(&mut config.source.period_ps, source.period_ps);
    set(&mut config.source.stop_delay_ps, source.stop_delay_ps);
    set(&mut config.source.jitter_ps, source.jitter_ps);
    set(&mut config.source.block_duration_ps, source.block_duration_ps);
    if source.overflow_every_blocks.is_some() {
        config.source.overflow_every_blocks = source.overflow_every_blocks;
    }
    if source.noise_channel.is_some() {
        config.source.noise_channel = source.noise_channel;
    }

    let acquisition = &overrides.acquisition;
    set(&mut config.acquisition.duration_ps, acquisition.duration_ps);
    set(&mut config.acquisition.verify, acquisition.verify);
    set(
        &mut config.acquisition.poll_interval_ms,
        acquisition.poll_interval_ms,
    );
    set(&mut config.acquisition.max_channel, acquisition.max_channel);

    let logging = &overrides.logging;
    if let Some(level) = &logging.level {
        config.logging.level = level.clone();
    }
    set(&mut config.logging.format, logging.format);
    set(&mut config.logging.metrics, logging.metrics);
}

fn set<T: Copy>(field: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *field = value;
    }
}
