//! Environment variable parsing and env-to-config merging.
//!
//! Env parsing is strict: a variable that is present but empty or malformed
//! fails fast instead of being ignored.

use crate::schema::{AppConfig, LogFormat, ValidatedAppConfig};
use std::collections::BTreeMap;
use tagstream_shared::{ErrorCode, ErrorEnvelope};
use thiserror::Error;

/// Env var: click channel.
pub const ENV_CLICK_CHANNEL: &str = "TAGSTREAM_CLICK_CHANNEL";
/// Env var: start channel (`unused` selects self-referential mode).
pub const ENV_START_CHANNEL: &str = "TAGSTREAM_START_CHANNEL";
/// Env var: histogram bin width in picoseconds.
pub const ENV_BIN_WIDTH_PS: &str = "TAGSTREAM_BIN_WIDTH_PS";
/// Env var: acquisition duration in picoseconds.
pub const ENV_DURATION_PS: &str = "TAGSTREAM_DURATION_PS";
/// Env var: cross-check against the reference measurement.
pub const ENV_VERIFY: &str = "TAGSTREAM_VERIFY";
/// Env var: log level.
pub const ENV_LOG_LEVEL: &str = "TAGSTREAM_LOG_LEVEL";
/// Env var: log format (`text` | `json`).
pub const ENV_LOG_FORMAT: &str = "TAGSTREAM_LOG_FORMAT";
/// Env var: emit metrics.
pub const ENV_METRICS: &str = "TAGSTREAM_METRICS";

const ALL_VARS: [&str; 8] = [
    ENV_CLICK_CHANNEL,
    ENV_START_CHANNEL,
    ENV_BIN_WIDTH_PS,
    ENV_DURATION_PS,
    ENV_VERIFY,
    ENV_LOG_LEVEL,
    ENV_LOG_FORMAT,
    ENV_METRICS,
];

/// Start channel override, which may explicitly disable the start role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartChannelOverride {
    /// Use this channel.
    Channel(i32),
    /// Leave the start role unused.
    Unused,
}

impl StartChannelOverride {
    /// Value stored in `measurement.startChannel`.
    #[must_use]
    pub const fn as_config(self) -> Option<i32> {
        match self {
            Self::Channel(channel) => Some(channel),
            Self::Unused => None,
        }
    }
}

/// Typed env-derived overrides for `AppConfig`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagstreamEnv {
    /// Override for `measurement.clickChannel`.
    pub click_channel: Option<i32>,
    /// Override for `measurement.startChannel`.
    pub start_channel: Option<StartChannelOverride>,
    /// Override for `measurement.binWidthPs`.
    pub bin_width_ps: Option<u64>,
    /// Override for `acquisition.durationPs`.
    pub duration_ps: Option<u64>,
    /// Override for `acquisition.verify`.
    pub verify: Option<bool>,
    /// Override for `logging.level`.
    pub log_level: Option<Box<str>>,
    /// Override for `logging.format`.
    pub log_format: Option<LogFormat>,
    /// Override for `logging.metrics`.
    pub metrics: Option<bool>,
}

impl TagstreamEnv {
    /// Parse env overrides from a key/value map (useful for tests and fixtures).
    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self, EnvParseError> {
        Ok(Self {
            click_channel: parse_optional_i32(map, ENV_CLICK_CHANNEL)?,
            start_channel: parse_optional_start_channel(map)?,
            bin_width_ps: parse_optional_u64(map, ENV_BIN_WIDTH_PS)?,
            duration_ps: parse_optional_u64(map, ENV_DURATION_PS)?,
            verify: parse_optional_bool(map, ENV_VERIFY)?,
            log_level: parse_optional_trimmed_string(map, ENV_LOG_LEVEL)?,
            log_format: parse_optional_log_format(map)?,
            metrics: parse_optional_bool(map, ENV_METRICS)?,
        })
    }

    /// Parse env overrides from the current process environment.
    pub fn from_std_env() -> Result<Self, EnvParseError> {
        let mut map = BTreeMap::new();
        for name in ALL_VARS {
            if let Ok(value) = std::env::var(name) {
                map.insert(name.to_string(), value);
            }
        }

        Self::from_map(&map)
    }

    /// True when no variable was set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Apply env overrides to a base config (env wins over file/default values).
pub fn apply_env_overrides(
    base: AppConfig,
    env: &TagstreamEnv,
) -> Result<ValidatedAppConfig, ErrorEnvelope> {
    let mut config = base;

    if let Some(channel) = env.click_channel {
        config.measurement.click_channel = channel;
    }
    if let Some(start) = env.start_channel {
        config.measurement.start_channel = start.as_config();
    }
    if let Some(width) = env.bin_width_ps {
        config.measurement.bin_width_ps = width;
    }
    if let Some(duration) = env.duration_ps {
        config.acquisition.duration_ps = duration;
    }
    if let Some(verify) = env.verify {
        config.acquisition.verify = verify;
    }
    if let Some(level) = &env.log_level {
        config.logging.level = level.clone();
    }
    if let Some(format) = env.log_format {
        config.logging.format = format;
    }
    if let Some(metrics) = env.metrics {
        config.logging.metrics = metrics;
    }

    config.validate_and_normalize().map_err(Into::into)
}

/// Validation failures when parsing env variables.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvParseError {
    /// An env var was present but empty after trimming.
    #[error("{var} must be non-empty")]
    EmptyValue {
        /// Env var name.
        var: &'static str,
    },
    /// Boolean env var had an invalid value.
    #[error("{var} must be a boolean")]
    InvalidBool {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
    /// Integer env var had an invalid value.
    #[error("{var} must be an integer")]
    InvalidInt {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
    /// Enum env var had an invalid value.
    #[error("{var} has an unsupported value")]
    InvalidEnum {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
}

impl EnvParseError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::EmptyValue { .. } => ErrorCode::new("config", "empty_env_var"),
            Self::InvalidBool { .. } => ErrorCode::new("config", "invalid_env_bool"),
            Self::InvalidInt { .. } => ErrorCode::new("config", "invalid_env_int"),
            Self::InvalidEnum { .. } => ErrorCode::new("config", "invalid_env_enum"),
        }
    }
}

impl From<EnvParseError> for ErrorEnvelope {
    fn from(error: EnvParseError) -> Self {
        let code = error.error_code();
        let message = error.to_string();
        let envelope = Self::expected(code, message);

        match error {
            EnvParseError::EmptyValue { var } => envelope.with_metadata("env_var", var),
            EnvParseError::InvalidBool { var, value }
            | EnvParseError::InvalidInt { var, value }
            | EnvParseError::InvalidEnum { var, value } => envelope
                .with_metadata("env_var", var)
                .with_metadata("value", value),
        }
    }
}

fn parse_optional_trimmed<'a>(
    map: &'a BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<&'a str>, EnvParseError> {
    let Some(raw) = map.get(var) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EnvParseError::EmptyValue { var });
    }
    Ok(Some(trimmed))
}

fn parse_optional_trimmed_string(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<Box<str>>, EnvParseError> {
    Ok(parse_optional_trimmed(map, var)?.map(Box::from))
}

fn parse_optional_u64(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<u64>, EnvParseError> {
    let Some(trimmed) = parse_optional_trimmed(map, var)? else {
        return Ok(None);
    };
    trimmed
        .parse::<u64>()
        .map(Some)
        .map_err(|_| EnvParseError::InvalidInt {
            var,
            value: trimmed.to_string(),
        })
}

fn parse_optional_i32(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<i32>, EnvParseError> {
    let Some(trimmed) = parse_optional_trimmed(map, var)? else {
        return Ok(None);
    };
    trimmed
        .parse::<i32>()
        .map(Some)
        .map_err(|_| EnvParseError::InvalidInt {
            var,
            value: trimmed.to_string(),
        })
}

fn parse_optional_start_channel(
    map: &BTreeMap<String, String>,
) -> Result<Option<StartChannelOverride>, EnvParseError> {
    let Some(trimmed) = parse_optional_trimmed(map, ENV_START_CHANNEL)? else {
        return Ok(None);
    };
    if trimmed.eq_ignore_ascii_case("unused") {
        return Ok(Some(StartChannelOverride::Unused));
    }
    trimmed
        .parse::<i32>()
        .map(|channel| Some(StartChannelOverride::Channel(channel)))
        .map_err(|_| EnvParseError::InvalidInt {
            var: ENV_START_CHANNEL,
            value: trimmed.to_string(),
        })
}

fn parse_optional_bool(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<bool>, EnvParseError> {
    let Some(trimmed) = parse_optional_trimmed(map, var)? else {
        return Ok(None);
    };
    match trimmed.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(Some(true)),
        "false" | "0" | "no" | "off" => Ok(Some(false)),
        _ => Err(EnvParseError::InvalidBool {
            var,
            value: trimmed.to_string(),
        }),
    }
}

fn parse_optional_log_format(
    map: &BTreeMap<String, String>,
) -> Result<Option<LogFormat>, EnvParseError> {
    let Some(trimmed) = parse_optional_trimmed(map, ENV_LOG_FORMAT)? else {
        return Ok(None);
    };
    LogFormat::parse(trimmed)
        .map(Some)
        .ok_or_else(|| EnvParseError::InvalidEnum {
            var: ENV_LOG_FORMAT,
            value: trimmed.to_string(),
        })
}
