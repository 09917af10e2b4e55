//! Config command handlers.

use crate::error::{CliError, ExitCode};
use crate::format::OutputMode;
use crate::{CliOutput, format_error_output, format_ndjson_summary, infra_exit_code, log_info};
use std::collections::BTreeMap;
use std::path::Path;
use tagstream_config::{app_config_schema, to_pretty_json, to_pretty_toml};
use tagstream_infra::load_effective_config;

/// Validate the effective config.
pub fn run_config_check(
    mode: OutputMode,
    env: &BTreeMap<String, String>,
    path: Option<&Path>,
    overrides_json: Option<&str>,
) -> Result<CliOutput, CliError> {
    let config = match load_effective_config(env, path, overrides_json) {
        Ok(config) => config,
        Err(error) => return Ok(format_error_output(mode, &error, infra_exit_code(&error))),
    };

    let mut stderr = String::new();
    log_info(&mut stderr, "config check completed", mode.no_progress);

    let stdout = if mode.is_ndjson() {
        format_ndjson_summary("ok", "config", None)
    } else if mode.is_json() {
        let config_json = match to_pretty_json(&config) {
            Ok(json) => json,
            Err(error) => return Ok(format_error_output(mode, &error, ExitCode::Internal)),
        };
        let config_value: serde_json::Value = serde_json::from_str(config_json.trim())?;
        let payload = serde_json::json!({
            "status": "ok",
            "configPath": path.map(|value| value.to_string_lossy().to_string()),
            "effectiveConfig": config_value,
        });
        let mut output = serde_json::to_string_pretty(&payload)?;
        output.push('\n');
        output
    } else {
        path.map_or_else(
            || "status: ok\nconfig: ok\n".to_string(),
            |path| format!("status: ok\nconfig: ok\npath: {}\n", path.to_string_lossy()),
        )
    };

    Ok(CliOutput {
        stdout,
        stderr,
        exit_code: ExitCode::Ok,
    })
}

/// Print the effective config (JSON by default, TOML on request).
pub fn run_config_show(
    mode: OutputMode,
    env: &BTreeMap<String, String>,
    path: Option<&Path>,
    overrides_json: Option<&str>,
    as_toml: bool,
) -> Result<CliOutput, CliError> {
    let rendered = load_effective_config(env, path, overrides_json).and_then(|config| {
        let json = to_pretty_json(&config)?;
        let text = if as_toml { to_pretty_toml(&config)? } else { json.clone() };
        Ok((json, text))
    });
    let (config_json, text) = match rendered {
        Ok(rendered) => rendered,
        Err(error) => return Ok(format_error_output(mode, &error, infra_exit_code(&error))),
    };

    let mut stderr = String::new();
    log_info(&mut stderr, "config show completed", mode.no_progress);

    let stdout = if mode.is_ndjson() || mode.is_json() {
        let config_value: serde_json::Value = serde_json::from_str(config_json.trim())?;
        if mode.is_ndjson() {
            format_ndjson_summary(
                "ok",
                "config",
                Some(serde_json::json!({ "effectiveConfig": config_value })),
            )
        } else {
            let payload = serde_json::json!({
                "status": "ok",
                "configPath": path.map(|value| value.to_string_lossy().to_string()),
                "effectiveConfig": config_value,
            });
            let mut output = serde_json::to_string_pretty(&payload)?;
            output.push('\n');
            output
        }
    } else {
        text
    };

    Ok(CliOutput {
        stdout,
        stderr,
        exit_code: ExitCode::Ok,
    })
}

/// Print the JSON schema of the config file.
pub fn run_config_schema(mode: OutputMode) -> Result<CliOutput, CliError> {
    let schema = serde_json::to_value(app_config_schema())?;
    let stdout = if mode.is_ndjson() {
        format_ndjson_summary("ok", "schema", Some(serde_json::json!({ "schema": schema })))
    } else {
        let mut output = serde_json::to_string_pretty(&schema)?;
        output.push('\n');
        output
    };

    Ok(CliOutput {
        stdout,
        stderr: String::new(),
        exit_code: ExitCode::Ok,
    })
}
