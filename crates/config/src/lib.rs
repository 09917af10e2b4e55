//! # tagstream-config
//!
//! Configuration schema, validation, and loading for the acquisition CLI.
//! This crate depends on `domain` and `shared` only.

/// JSON Schema export.
pub mod config_schema;
/// Environment variable parsing and merging.
pub mod env;
/// Config loading helpers (env + file + overrides).
pub mod load;
/// Configuration schema types and helpers.
pub mod schema;

pub use config_schema::app_config_schema;
pub use env::{EnvParseError, StartChannelOverride, TagstreamEnv, apply_env_overrides};
pub use load::{
    ConfigFormat, detect_config_format, load_app_config_from_path, load_app_config_from_sources,
    load_app_config_std_env, to_pretty_json, to_pretty_toml,
};
pub use schema::{
    AcquisitionConfig, AppConfig, CURRENT_CONFIG_VERSION, ConfigSchemaError, LogFormat,
    LoggingConfig, MeasurementConfig, SourceConfig, ValidatedAppConfig, parse_app_config_json,
    parse_app_config_toml,
};

/// Returns the config crate version.
#[must_use]
pub const fn config_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
