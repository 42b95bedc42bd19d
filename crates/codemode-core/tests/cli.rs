//! `codemode` binary

use serde_json::Value;
use std::path::Path;
use std::process::{Command, Output};

fn codemode(args: &[&str], dir: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_codemode"))
        .args(args)
        .current_dir(dir)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap()
}

fn stdout_json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn run_prints_success_and_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let script = "const xs = [1, 2, 3];\nreturn xs.reduce((a, b) => a + b, 0);\n";
    std::fs::write(dir.path().join("script.js"), script).unwrap();

    let output = codemode(&["run", "--script", "script.js"], dir.path());

    assert_eq!(output.status.code(), Some(0));
    let result = stdout_json(&output);
    assert_eq!(result["success"], Value::Bool(true));
    assert_eq!(result["result"], "6");
    assert_eq!(result["type"], "number");
}

#[test]
fn run_reports_timeout_and_exits_one() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("loop.js"), "while (true) {}").unwrap();
    std::fs::write(dir.path().join("codemode.toml"), "[executor]\ntimeout_ms = 10000\n").unwrap();

    let output = codemode(
        &["run", "--script", "loop.js", "--config", "codemode.toml", "--timeout-ms", "50"],
        dir.path(),
    );

    assert_eq!(output.status.code(), Some(1));
    let result = stdout_json(&output);
    assert_eq!(result["success"], Value::Bool(false));
    assert_eq!(result["type"], "timeout");
    assert_eq!(result["error"], "Execution timed out after 50ms");
}

#[test]
fn invalid_config_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("bad.toml"), "[cache]\ncapacity = 0\n").unwrap();

    let output = codemode(&["describe", "--config", "bad.toml"], dir.path());

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("cache.capacity"));
}

#[test]
fn describe_prints_definition() {
    let dir = tempfile::tempdir().unwrap();
    let output = codemode(&["describe", "--json"], dir.path());

    assert_eq!(output.status.code(), Some(0));
    let definition = stdout_json(&output);
    assert_eq!(definition["name"], "execute_code");
    assert!(definition["description"].as_str().unwrap().contains("Available capabilities"));
    assert_eq!(definition["input_schema"]["required"][0], "script");
}
