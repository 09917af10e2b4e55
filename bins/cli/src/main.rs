//! CLI binary entrypoint.

mod commands;
mod error;
mod format;
mod logging;

use clap::{Parser, Subcommand};
use commands::{
    RunArgs, run_acquire, run_config_check, run_config_schema, run_config_show, run_info,
};
use error::{CliError, ExitCode};
use format::{OutputArgs, OutputMode};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;
use tagstream_infra::InfraError;
use tagstream_shared::{ErrorCode, ErrorKind};

#[derive(Debug, Parser)]
#[command(
    name = "tagstream",
    version,
    about = "Start-stop histogram acquisition over time-tag streams",
    long_about = None
)]
struct Cli {
    #[command(flatten)]
    output: OutputArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show build and version details.
    Info,
    /// Config-related commands.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Run one acquisition against the synthetic signal and print the histogram.
    Run(RunArgs),
}

#[derive(Debug, Subcommand)]
enum ConfigCommands {
    /// Validate the effective config (defaults + file + overrides + env).
    Check {
        /// Optional config file path (JSON/TOML).
        #[arg(long)]
        path: Option<PathBuf>,
        /// JSON object merged over the config file.
        #[arg(long)]
        overrides_json: Option<String>,
    },
    /// Print the effective config.
    Show {
        /// Optional config file path (JSON/TOML).
        #[arg(long)]
        path: Option<PathBuf>,
        /// JSON object merged over the config file.
        #[arg(long)]
        overrides_json: Option<String>,
        /// Render as TOML instead of JSON (text output only).
        #[arg(long)]
        toml: bool,
    },
    /// Print the JSON schema of the config file.
    Schema,
}

pub(crate) struct CliOutput {
    stdout: String,
    stderr: String,
    exit_code: ExitCode,
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let mode = OutputMode::from_args(&cli.output);

    match run(&cli.command, mode) {
        Ok(output) => match write_output(&output) {
            Ok(()) => std::process::ExitCode::from(output.exit_code.as_u8()),
            Err(error) => exit_with_error(&error),
        },
        Err(error) => exit_with_error(&error),
    }
}

fn exit_with_error(error: &CliError) -> std::process::ExitCode {
    let _ = writeln!(io::stderr(), "error: {error}");
    std::process::ExitCode::from(error.exit_code().as_u8())
}

fn run(command: &Commands, mode: OutputMode) -> Result<CliOutput, CliError> {
    let env = collect_scoped_env("TAGSTREAM_");
    match command {
        Commands::Info => run_info(mode),
        Commands::Config { command } => match command {
            ConfigCommands::Check {
                path,
                overrides_json,
            } => run_config_check(mode, &env, path.as_deref(), overrides_json.as_deref()),
            ConfigCommands::Show {
                path,
                overrides_json,
                toml,
            } => run_config_show(
                mode,
                &env,
                path.as_deref(),
                overrides_json.as_deref(),
                *toml,
            ),
            ConfigCommands::Schema => run_config_schema(mode),
        },
        Commands::Run(args) => run_acquire(mode, &env, args),
    }
}

pub(crate) fn format_error_output(
    mode: OutputMode,
    error: &InfraError,
    exit_code: ExitCode,
) -> CliOutput {
    let mut stderr = String::new();
    log_info(&mut stderr, "command failed", mode.no_progress);

    let stdout = if mode.is_ndjson() || mode.is_json() {
        let dto = serde_json::json!({
            "code": error.code.to_string(),
            "message": error.message,
            "kind": error.kind.to_string(),
            "meta": error.metadata,
        });
        let payload = if mode.is_ndjson() {
            serde_json::json!({ "type": "error", "status": "error", "error": dto })
        } else {
            serde_json::json!({ "status": "error", "error": dto })
        };

        // This is a CLI boundary, so JSON serialization errors are internal.
        let encoded = if mode.is_ndjson() {
            serde_json::to_string(&payload)
        } else {
            serde_json::to_string_pretty(&payload)
        };
        let mut output = encoded.unwrap_or_else(|_| {
            "{\"status\":\"error\",\"error\":{\"code\":\"core:internal\",\"message\":\"internal error\",\"kind\":\"invariant\"}}".to_string()
        });
        output.push('\n');
        output
    } else {
        format_error_text(error)
    };

    CliOutput {
        stdout,
        stderr,
        exit_code,
    }
}

fn format_error_text(error: &InfraError) -> String {
    let mut out = format!(
        "status: error\ncode: {}\nmessage: {}\n",
        error.code, error.message
    );
    for (key, value) in &error.metadata {
        out.push_str("meta.");
        out.push_str(key);
        out.push_str(": ");
        out.push_str(value);
        out.push('\n');
    }
    out
}

pub(crate) fn infra_exit_code(error: &InfraError) -> ExitCode {
    match error.kind {
        ErrorKind::Expected => ExitCode::InvalidInput,
        ErrorKind::Unexpected if error.code == ErrorCode::io() => ExitCode::Io,
        ErrorKind::Invariant | ErrorKind::Unexpected => ExitCode::Internal,
    }
}

pub(crate) fn log_info(stderr: &mut String, message: &str, no_progress: bool) {
    if no_progress {
        return;
    }
    stderr.push_str("info: ");
    stderr.push_str(message);
    stderr.push('\n');
}

pub(crate) fn format_ndjson_summary(
    status: &str,
    kind: &str,
    extra: Option<serde_json::Value>,
) -> String {
    let mut payload = serde_json::Map::new();
    payload.insert(
        "type".to_string(),
        serde_json::Value::String("summary".to_string()),
    );
    payload.insert(
        "status".to_string(),
        serde_json::Value::String(status.to_string()),
    );
    payload.insert(
        "kind".to_string(),
        serde_json::Value::String(kind.to_string()),
    );
    if let Some(serde_json::Value::Object(map)) = extra {
        for (key, value) in map {
            payload.insert(key, value);
        }
    }
    let mut out = serde_json::to_string(&serde_json::Value::Object(payload)).unwrap_or_else(|_| {
        "{\"type\":\"summary\",\"status\":\"error\",\"kind\":\"internal\"}".to_string()
    });
    out.push('\n');
    out
}

fn write_output(output: &CliOutput) -> Result<(), CliError> {
    let mut stdout = io::stdout();
    stdout.write_all(output.stdout.as_bytes())?;

    if !output.stderr.is_empty() {
        let mut stderr = io::stderr();
        stderr.write_all(output.stderr.as_bytes())?;
        stderr.flush()?;
    }

    Ok(())
}

fn collect_scoped_env(prefix: &str) -> BTreeMap<String, String> {
    std::env::vars()
        .filter(|(key, _)| key.starts_with(prefix))
        .collect()
}
