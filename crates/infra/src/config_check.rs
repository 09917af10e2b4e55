//! Config loading helpers for CLI surfaces.

use crate::InfraResult;
use tagstream_config::{
    TagstreamEnv, ValidatedAppConfig, load_app_config_from_path, to_pretty_json,
};
use std::collections::BTreeMap;
use std::path::Path;

/// Load and validate the effective config from an explicit env map.
pub fn load_effective_config(
    env: &BTreeMap<String, String>,
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
) -> InfraResult<ValidatedAppConfig> {
    let env = TagstreamEnv::from_map(env).map_err(tagstream_shared::ErrorEnvelope::from)?;
    load_app_config_from_path(config_path, overrides_json, &env)
}

/// Load and validate the effective config, returning deterministic pretty JSON.
pub fn load_effective_config_json(
    env: &BTreeMap<String, String>,
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
) -> InfraResult<String> {
    let config = load_effective_config(env, config_path, overrides_json)?;
    to_pretty_json(&config)
}
