//! Application configuration schema, defaults, validation, and normalization.
//!
//! - Deserialization uses `serde` (JSON or TOML).
//! - Validation is manual and returns typed errors mapped to `ErrorEnvelope`.
//! - Normalization lowercases free-form enum-like strings.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use tagstream_domain::ChannelId;
use tagstream_shared::{ErrorCode, ErrorEnvelope};
use thiserror::Error;

/// Current supported configuration schema version.
pub const CURRENT_CONFIG_VERSION: u32 = 1;

const BIN_WIDTH_MIN_PS: u64 = 1;
const BIN_WIDTH_MAX_PS: u64 = 1_000_000_000_000;

const PERIOD_MIN_PS: u64 = 2;
const PERIOD_MAX_PS: u64 = 1_000_000_000_000;
const BLOCK_DURATION_MIN_PS: u64 = 1_000;
const BLOCK_DURATION_MAX_PS: u64 = 10_000_000_000_000;
const OVERFLOW_EVERY_MIN: u32 = 1;
const OVERFLOW_EVERY_MAX: u32 = 1_000_000;

const DURATION_MIN_PS: u64 = 1;
const DURATION_MAX_PS: u64 = 1_000_000_000_000_000;
const POLL_INTERVAL_MIN_MS: u64 = 1;
const POLL_INTERVAL_MAX_MS: u64 = 60_000;
const MAX_CHANNEL_MIN: u32 = 1;
const MAX_CHANNEL_MAX: u32 = 64;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Top-level application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct AppConfig {
    /// Schema version for forward-compatible migrations.
    pub version: u32,
    /// Start-stop measurement settings.
    pub measurement: MeasurementConfig,
    /// Synthetic test signal settings.
    pub source: SourceConfig,
    /// Acquisition run settings.
    pub acquisition: AcquisitionConfig,
    /// Logging and metrics settings.
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: CURRENT_CONFIG_VERSION,
            measurement: MeasurementConfig::default(),
            source: SourceConfig::default(),
            acquisition: AcquisitionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Validate and normalize the config.
    pub fn validate_and_normalize(mut self) -> Result<ValidatedAppConfig, ConfigSchemaError> {
        self.validate_version()?;

        self.acquisition.validate()?;
        let max_channel = self.acquisition.max_channel;
        self.measurement.validate(max_channel)?;
        self.source.validate(max_channel)?;
        self.logging.normalize_and_validate()?;

        Ok(ValidatedAppConfig { raw: self })
    }

    const fn validate_version(&self) -> Result<(), ConfigSchemaError> {
        if self.version != CURRENT_CONFIG_VERSION {
            return Err(ConfigSchemaError::UnsupportedVersion {
                found: self.version,
                supported: CURRENT_CONFIG_VERSION,
            });
        }
        Ok(())
    }
}

/// Config that passed `validate_and_normalize`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedAppConfig {
    raw: AppConfig,
}

impl ValidatedAppConfig {
    /// Borrow the raw config.
    #[must_use]
    pub const fn as_ref(&self) -> &AppConfig {
        &self.raw
    }

    /// Consume the wrapper and return the raw config.
    #[must_use]
    pub fn into_inner(self) -> AppConfig {
        self.raw
    }
}

impl AsRef<AppConfig> for ValidatedAppConfig {
    fn as_ref(&self) -> &AppConfig {
        &self.raw
    }
}

impl std::ops::Deref for ValidatedAppConfig {
    type Target = AppConfig;

    fn deref(&self) -> &Self::Target {
        &self.raw
    }
}

/// Parse an app config from a JSON string, applying validation and normalization.
pub fn parse_app_config_json(input: &str) -> Result<ValidatedAppConfig, ErrorEnvelope> {
    let config: AppConfig = serde_json::from_str(input).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::new("config", "invalid_json"),
            format!("invalid config JSON: {error}"),
        )
    })?;

    config.validate_and_normalize().map_err(Into::into)
}

/// Parse an app config from a TOML string, applying validation and normalization.
pub fn parse_app_config_toml(input: &str) -> Result<ValidatedAppConfig, ErrorEnvelope> {
    let config: AppConfig = toml::from_str(input).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::new("config", "invalid_toml"),
            format!("invalid config TOML: {error}"),
        )
    })?;

    config.validate_and_normalize().map_err(Into::into)
}

/// Start-stop measurement settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct MeasurementConfig {
    /// Channel whose tags close an interval.
    pub click_channel: i32,
    /// Channel whose tags open an interval. `null` leaves it unused, so the
    /// click channel also opens intervals.
    pub start_channel: Option<i32>,
    /// Histogram bin width in picoseconds.
    pub bin_width_ps: u64,
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self {
            click_channel: 2,
            start_channel: Some(1),
            bin_width_ps: 50,
        }
    }
}

impl MeasurementConfig {
    /// Start channel as a [`ChannelId`], mapping `None` to the unused sentinel.
    #[must_use]
    pub const fn start_channel_id(&self) -> ChannelId {
        match self.start_channel {
            Some(raw) => ChannelId::new(raw),
            None => ChannelId::UNUSED,
        }
    }

    /// Click channel as a [`ChannelId`].
    #[must_use]
    pub const fn click_channel_id(&self) -> ChannelId {
        ChannelId::new(self.click_channel)
    }

    fn validate(&self, max_channel: u32) -> Result<(), ConfigSchemaError> {
        validate_channel("measurement", "clickChannel", self.click_channel, max_channel)?;
        if let Some(start) = self.start_channel {
            validate_channel("measurement", "startChannel", start, max_channel)?;
        }
        validate_limit_u64(
            "measurement",
            "binWidthPs",
            self.bin_width_ps,
            BIN_WIDTH_MIN_PS,
            BIN_WIDTH_MAX_PS,
        )
    }
}

/// Synthetic test signal settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct SourceConfig {
    /// Channel receiving the start pulse of every period.
    pub start_channel: i32,
    /// Channel receiving the delayed stop pulse.
    pub stop_channel: i32,
    /// Pulse period in picoseconds.
    pub period_ps: u64,
    /// Nominal delay between start and stop pulses in picoseconds.
    pub stop_delay_ps: u64,
    /// Half-width of the deterministic stop jitter in picoseconds.
    pub jitter_ps: u64,
    /// Stream time covered by one delivered block in picoseconds.
    pub block_duration_ps: u64,
    /// Inject an overflow interval every N blocks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overflow_every_blocks: Option<u32>,
    /// Extra channel receiving one pulse per period, outside the measurement.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub noise_channel: Option<i32>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            start_channel: 1,
            stop_channel: 2,
            period_ps: 1_250_000,
            stop_delay_ps: 2_000,
            jitter_ps: 100,
            block_duration_ps: 1_000_000_000,
            overflow_every_blocks: None,
            noise_channel: None,
        }
    }
}

impl SourceConfig {
    fn validate(&self, max_channel: u32) -> Result<(), ConfigSchemaError> {
        validate_channel("source", "startChannel", self.start_channel, max_channel)?;
        validate_channel("source", "stopChannel", self.stop_channel, max_channel)?;
        if let Some(noise) = self.noise_channel {
            validate_channel("source", "noiseChannel", noise, max_channel)?;
        }
        validate_limit_u64(
            "source",
            "periodPs",
            self.period_ps,
            PERIOD_MIN_PS,
            PERIOD_MAX_PS,
        )?;
        validate_limit_u64(
            "source",
            "blockDurationPs",
            self.block_duration_ps,
            BLOCK_DURATION_MIN_PS,
            BLOCK_DURATION_MAX_PS,
        )?;
        if let Some(every) = self.overflow_every_blocks {
            validate_limit_u64(
                "source",
                "overflowEveryBlocks",
                u64::from(every),
                u64::from(OVERFLOW_EVERY_MIN),
                u64::from(OVERFLOW_EVERY_MAX),
            )?;
        }

        let latest_stop = self.stop_delay_ps.saturating_add(self.jitter_ps);
        if latest_stop >= self.period_ps {
            return Err(ConfigSchemaError::InvalidSignal {
                field: "stopDelayPs",
                reason: format!(
                    "stopDelayPs + jitterPs ({latest_stop}) must be below periodPs ({})",
                    self.period_ps
                ),
            });
        }
        if self.jitter_ps > self.stop_delay_ps {
            return Err(ConfigSchemaError::InvalidSignal {
                field: "jitterPs",
                reason: format!(
                    "jitterPs ({}) must not exceed stopDelayPs ({})",
                    self.jitter_ps, self.stop_delay_ps
                ),
            });
        }
        Ok(())
    }
}

/// Acquisition run settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct AcquisitionConfig {
    /// Stream time to capture in picoseconds.
    pub duration_ps: u64,
    /// Cross-check the histogram against the reference measurement.
    pub verify: bool,
    /// How often the runner samples live snapshots, in milliseconds.
    pub poll_interval_ms: u64,
    /// Highest input channel of the simulated device.
    pub max_channel: u32,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            duration_ps: 1_000_000_000_000,
            verify: true,
            poll_interval_ms: 100,
            max_channel: 18,
        }
    }
}

impl AcquisitionConfig {
    fn validate(&self) -> Result<(), ConfigSchemaError> {
        validate_limit_u64(
            "acquisition",
            "durationPs",
            self.duration_ps,
            DURATION_MIN_PS,
            DURATION_MAX_PS,
        )?;
        validate_limit_u64(
            "acquisition",
            "pollIntervalMs",
            self.poll_interval_ms,
            POLL_INTERVAL_MIN_MS,
            POLL_INTERVAL_MAX_MS,
        )?;
        validate_limit_u64(
            "acquisition",
            "maxChannel",
            u64::from(self.max_channel),
            u64::from(MAX_CHANNEL_MIN),
            u64::from(MAX_CHANNEL_MAX),
        )
    }
}

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Stable string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
        }
    }

    /// Parse a format name (case-insensitive).
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Logging and metrics settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct LoggingConfig {
    /// Default level filter (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: Box<str>,
    /// Subscriber output format.
    pub format: LogFormat,
    /// Emit metrics as JSON lines on stderr.
    pub metrics: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Text,
            metrics: false,
        }
    }
}

impl LoggingConfig {
    fn normalize_and_validate(&mut self) -> Result<(), ConfigSchemaError> {
        let normalized = self.level.trim().to_ascii_lowercase();
        if !LOG_LEVELS.contains(&normalized.as_str()) {
            return Err(ConfigSchemaError::InvalidLogLevel {
                value: self.level.to_string(),
            });
        }
        self.level = normalized.into_boxed_str();
        Ok(())
    }
}

/// Typed validation errors for the configuration schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigSchemaError {
    /// The config version is not supported by this binary.
    #[error("unsupported config version: {found} (supported: {supported})")]
    UnsupportedVersion {
        /// Version found in the config.
        found: u32,
        /// Version supported by this crate.
        supported: u32,
    },
    /// A numeric limit is out of bounds.
    #[error("{section}.{field} must be within [{min}, {max}] (got {value})")]
    LimitOutOfRange {
        /// Schema section (e.g. `acquisition`).
        section: &'static str,
        /// Field name in the config file (e.g. `durationPs`).
        field: &'static str,
        /// Value provided.
        value: u64,
        /// Minimum allowed value.
        min: u64,
        /// Maximum allowed value.
        max: u64,
    },
    /// A channel number is zero or beyond the device's channel count.
    #[error("{section}.{field} must be a channel in [-{max}, -1] or [1, {max}] (got {value})")]
    InvalidChannel {
        /// Schema section.
        section: &'static str,
        /// Field name in the config file.
        field: &'static str,
        /// Channel provided.
        value: i32,
        /// Highest channel number.
        max: u32,
    },
    /// The synthetic signal settings contradict each other.
    #[error("invalid source signal: {reason}")]
    InvalidSignal {
        /// Field that has to change.
        field: &'static str,
        /// Human readable reason.
        reason: String,
    },
    /// Unknown log level.
    #[error("logging.level must be one of trace, debug, info, warn, error (got {value})")]
    InvalidLogLevel {
        /// Level provided.
        value: String,
    },
}

impl ConfigSchemaError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::UnsupportedVersion { .. } => ErrorCode::new("config", "unsupported_version"),
            Self::LimitOutOfRange { .. } => ErrorCode::new("config", "invalid_limit"),
            Self::InvalidChannel { .. } => ErrorCode::new("config", "invalid_channel"),
            Self::InvalidSignal { .. } => ErrorCode::new("config", "invalid_signal"),
            Self::InvalidLogLevel { .. } => ErrorCode::new("config", "invalid_log_level"),
        }
    }
}

impl From<ConfigSchemaError> for ErrorEnvelope {
    fn from(error: ConfigSchemaError) -> Self {
        let code = error.error_code();
        let message = error.to_string();
        let envelope = Self::expected(code, message);

        match error {
            ConfigSchemaError::UnsupportedVersion { found, supported } => envelope
                .with_metadata("found", found.to_string())
                .with_metadata("supported", supported.to_string()),
            ConfigSchemaError::LimitOutOfRange {
                section,
                field,
                value,
                min,
                max,
            } => envelope
                .with_metadata("section", section)
                .with_metadata("field", field)
                .with_metadata("value", value.to_string())
                .with_metadata("min", min.to_string())
                .with_metadata("max", max.to_string()),
            ConfigSchemaError::InvalidChannel {
                section,
                field,
                value,
                max,
            } => envelope
                .with_metadata("section", section)
                .with_metadata("field", field)
                .with_metadata("value", value.to_string())
                .with_metadata("max", max.to_string()),
            ConfigSchemaError::InvalidSignal { field, reason } => envelope
                .with_metadata("section", "source")
                .with_metadata("field", field)
                .with_metadata("reason", reason),
            ConfigSchemaError::InvalidLogLevel { value } => envelope
                .with_metadata("section", "logging")
                .with_metadata("field", "level")
                .with_metadata("value", value),
        }
    }
}

fn validate_channel(
    section: &'static str,
    field: &'static str,
    value: i32,
    max_channel: u32,
) -> Result<(), ConfigSchemaError> {
    if value == 0 || value.unsigned_abs() > max_channel {
        return Err(ConfigSchemaError::InvalidChannel {
            section,
            field,
            value,
            max: max_channel,
        });
    }
    Ok(())
}

const fn validate_limit_u64(
    section: &'static str,
    field: &'static str,
    value: u64,
    min: u64,
    max: u64,
) -> Result<(), ConfigSchemaError> {
    if value < min || value > max {
        return Err(ConfigSchemaError::LimitOutOfRange {
            section,
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}
