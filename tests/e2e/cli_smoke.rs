//! CLI smoke tests: info and config commands.

use std::io;
use std::process::{Command, Output};
use tagstream_testkit::config_fixture;

fn run_cli(args: &[&str]) -> io::Result<Output> {
    Command::new(env!("CARGO_BIN_EXE_tagstream"))
        .env_clear()
        .args(args)
        .output()
}

fn stdout_json(output: &Output) -> io::Result<serde_json::Value> {
    serde_json::from_slice(&output.stdout).map_err(io::Error::other)
}

#[test]
fn info_is_deterministic() -> io::Result<()> {
    let first = run_cli(&["--output", "json", "info"])?;
    let second = run_cli(&["--output", "json", "info"])?;

    assert!(first.status.success());
    assert_eq!(first.stdout, second.stdout, "info output should be deterministic");
    let value = stdout_json(&first)?;
    assert_eq!(
        value.pointer("/build/name"),
        Some(&serde_json::Value::from("tagstream-cli"))
    );
    Ok(())
}

#[test]
fn config_check_accepts_fixture() -> io::Result<()> {
    let path = config_fixture("app-config.valid.json");
    let path = path.to_string_lossy();
    let output = run_cli(&["--no-progress", "config", "check", "--path", &path])?;

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("status: ok\n"), "{stdout}");
    assert!(output.stderr.is_empty());
    Ok(())
}

#[test]
fn config_check_rejects_invalid_fixture() -> io::Result<()> {
    let path = config_fixture("app-config.invalid.json");
    let path = path.to_string_lossy();
    let output = run_cli(&["--output", "json", "config", "check", "--path", &path])?;

    assert_eq!(output.status.code(), Some(2));
    let value = stdout_json(&output)?;
    assert_eq!(
        value.pointer("/error/code"),
        Some(&serde_json::Value::from("config:invalid_limit"))
    );
    Ok(())
}

#[test]
fn env_overrides_reach_the_effective_config() -> io::Result<()> {
    let output = Command::new(env!("CARGO_BIN_EXE_tagstream"))
        .env_clear()
        .env("TAGSTREAM_START_CHANNEL", "unused")
        .env("TAGSTREAM_BIN_WIDTH_PS", "125")
        .args(["--output", "json", "config", "show"])
        .output()?;

    assert!(output.status.success());
    let value = stdout_json(&output)?;
    assert_eq!(
        value.pointer("/effectiveConfig/measurement/startChannel"),
        Some(&serde_json::Value::Null)
    );
    assert_eq!(
        value.pointer("/effectiveConfig/measurement/binWidthPs"),
        Some(&serde_json::Value::from(125))
    );
    Ok(())
}

#[test]
fn config_schema_describes_sections() -> io::Result<()> {
    let output = run_cli(&["config", "schema"])?;

    assert!(output.status.success());
    let schema = stdout_json(&output)?;
    for section in ["measurement", "source", "acquisition", "logging"] {
        assert!(
            schema.pointer(&format!("/properties/{section}")).is_some(),
            "schema misses {section}"
        );
    }
    Ok(())
}
