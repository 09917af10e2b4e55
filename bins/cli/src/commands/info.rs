//! Info command handler.

use crate::CliOutput;
use crate::error::{CliError, ExitCode};
use crate::format::OutputMode;
use tagstream_config::{CURRENT_CONFIG_VERSION, config_crate_version};
use tagstream_infra::infra_crate_version;

/// Run the info command.
pub fn run_info(mode: OutputMode) -> Result<CliOutput, CliError> {
    let payload = serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "infraVersion": infra_crate_version(),
        "configVersion": config_crate_version(),
        "configSchemaVersion": CURRENT_CONFIG_VERSION,
    });

    let stdout = if mode.is_ndjson() {
        let mut output = serde_json::to_string(&serde_json::json!({
            "type": "summary",
            "status": "ok",
            "kind": "info",
            "build": payload,
        }))?;
        output.push('\n');
        output
    } else if mode.is_json() {
        let mut output = serde_json::to_string_pretty(&serde_json::json!({
            "status": "ok",
            "build": payload,
        }))?;
        output.push('\n');
        output
    } else {
        format!(
            "status: ok\nname: {}\nversion: {}\ninfra: {}\nconfig: {}\nconfig schema: v{}\n",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            infra_crate_version(),
            config_crate_version(),
            CURRENT_CONFIG_VERSION,
        )
    };

    Ok(CliOutput {
        stdout,
        stderr: String::new(),
        exit_code: ExitCode::Ok,
    })
}
