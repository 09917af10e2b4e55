//! CLI acquisition tests against the synthetic signal.

use std::io;
use std::process::{Command, Output};

/// One default block of stream time: 800 start pulses.
const ONE_BLOCK_PS: &str = "1000000000";

fn run_cli(args: &[&str]) -> io::Result<Output> {
    Command::new(env!("CARGO_BIN_EXE_tagstream"))
        .env_clear()
        .env("TAGSTREAM_LOG_LEVEL", "error")
        .args(args)
        .output()
}

fn stdout_json(output: &Output) -> io::Result<serde_json::Value> {
    serde_json::from_slice(&output.stdout).map_err(io::Error::other)
}

fn as_u64(value: &serde_json::Value, pointer: &str) -> io::Result<u64> {
    value
        .pointer(pointer)
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| io::Error::other(format!("missing {pointer}")))
}

#[test]
fn run_reports_verified_histogram() -> io::Result<()> {
    let output = run_cli(&["--output", "json", "run", "--duration-ps", ONE_BLOCK_PS])?;

    assert_eq!(
        output.status.code(),
        Some(0),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    let value = stdout_json(&output)?;
    assert_eq!(value.get("status"), Some(&serde_json::Value::from("ok")));
    assert_eq!(
        value.pointer("/report/matchesReference"),
        Some(&serde_json::Value::Bool(true))
    );
    assert_eq!(as_u64(&value, "/report/stats/pairs")?, 800);
    assert_eq!(as_u64(&value, "/report/totalCounts")?, 800);

    let bins = value
        .pointer("/report/histogram")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| io::Error::other("missing histogram"))?;
    for bin in bins {
        let time = bin
            .get("time")
            .and_then(serde_json::Value::as_i64)
            .ok_or_else(|| io::Error::other("bin without time"))?;
        assert!((1_900..=2_100).contains(&time), "bin at {time}");
    }
    Ok(())
}

#[test]
fn run_streams_ndjson_bins_and_summary() -> io::Result<()> {
    let output = run_cli(&[
        "--output",
        "ndjson",
        "run",
        "--duration-ps",
        ONE_BLOCK_PS,
        "--no-verify",
    ])?;

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()
        .map_err(io::Error::other)?;
    let (summary, bins) = lines
        .split_last()
        .ok_or_else(|| io::Error::other("empty output"))?;

    assert!(!bins.is_empty());
    assert!(
        bins.iter()
            .all(|line| line.get("type") == Some(&serde_json::Value::from("bin")))
    );
    assert_eq!(summary.get("type"), Some(&serde_json::Value::from("summary")));
    assert_eq!(
        summary.get("verification"),
        Some(&serde_json::Value::from("skipped"))
    );
    Ok(())
}

#[test]
fn unused_start_channel_measures_click_to_click() -> io::Result<()> {
    let output = run_cli(&[
        "--output",
        "json",
        "run",
        "--duration-ps",
        ONE_BLOCK_PS,
        "--start-channel",
        "unused",
    ])?;

    assert_eq!(output.status.code(), Some(0));
    let value = stdout_json(&output)?;
    assert_eq!(as_u64(&value, "/report/stats/pairs")?, 799);
    let bins = value
        .pointer("/report/histogram")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| io::Error::other("missing histogram"))?;
    let first = bins
        .first()
        .and_then(|bin| bin.get("time"))
        .and_then(serde_json::Value::as_i64)
        .ok_or_else(|| io::Error::other("empty histogram"))?;
    assert!(first >= 1_249_800, "first bin at {first}");
    Ok(())
}

#[test]
fn invalid_bin_width_exits_with_invalid_input() -> io::Result<()> {
    let output = run_cli(&["run", "--bin-width-ps", "0"])?;

    assert_eq!(output.status.code(), Some(2));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("status: error"), "{stdout}");
    assert!(stdout.contains("code: config:invalid_limit"), "{stdout}");
    Ok(())
}
