//! Basic CLI E2E tests.
//!
//! Each test runs the built binary with HOME pointed at a fresh temp
//! directory, so config and database never touch the real user's files.

use std::path::Path;
use std::process::Command;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(home: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_studytimer-cli"))
        .args(args)
        .env("HOME", home)
        .env_remove("STUDYTIMER_ENV")
        .env("STUDYTIMER_LOG", "off")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_ok(home: &Path, args: &[&str]) -> serde_json::Value {
    let (stdout, stderr, code) = run_cli(home, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    serde_json::from_str(&stdout).unwrap_or_else(|e| panic!("{args:?} printed non-JSON ({e}): {stdout}"))
}

fn signed_in() -> tempfile::TempDir {
    let home = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(home.path(), &["config", "set", "identity.user_id", "student"]);
    assert_eq!(code, 0, "config set failed: {stderr}");
    home
}

#[test]
fn test_status_when_idle() {
    let home = tempfile::tempdir().unwrap();
    let json = run_ok(home.path(), &["timer", "status"]);
    assert_eq!(json["status"], "idle");
    assert_eq!(json["elapsed_secs"], 0);
}

#[test]
fn test_start_requires_identity() {
    let home = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(home.path(), &["timer", "start"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("identity.user_id"), "stderr: {stderr}");
}

#[test]
fn test_session_lifecycle() {
    let home = signed_in();

    let started = run_ok(home.path(), &["timer", "start"]);
    assert_eq!(started["type"], "SessionStarted");
    let id = started["session_id"].as_str().unwrap().to_string();

    let status = run_ok(home.path(), &["timer", "status"]);
    assert_eq!(status["status"], "running");
    assert_eq!(status["session_id"], id.as_str());

    let paused = run_ok(home.path(), &["timer", "pause"]);
    assert_eq!(paused["type"], "SessionPaused");

    let resumed = run_ok(home.path(), &["timer", "resume"]);
    assert_eq!(resumed["type"], "SessionResumed");

    let finished = run_ok(
        home.path(),
        &["timer", "finish", "--productivity", "8", "--note", "chapter 3"],
    );
    assert_eq!(finished["type"], "SessionFinished");
    assert_eq!(finished["productivity"], 8);

    let status = run_ok(home.path(), &["timer", "status"]);
    assert_eq!(status["status"], "idle");

    let history = run_ok(home.path(), &["history", "--json"]);
    let sessions = history.as_array().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["id"], id.as_str());
    assert_eq!(sessions[0]["productivity"], 8);
    assert_eq!(sessions[0]["note"], "chapter 3");
}

#[test]
fn test_discard_leaves_record_open() {
    let home = signed_in();
    run_ok(home.path(), &["timer", "start"]);
    let discarded = run_ok(home.path(), &["timer", "discard"]);
    assert_eq!(discarded["type"], "SessionDiscarded");

    let history = run_ok(home.path(), &["history", "--json"]);
    assert!(history[0]["ended_at"].is_null());

    // The open record is picked up by the next start.
    let started = run_ok(home.path(), &["timer", "start"]);
    assert_eq!(started["adopted"], true);
    assert_eq!(started["session_id"], history[0]["id"]);
}

#[test]
fn test_finish_rejects_out_of_range_productivity() {
    let home = signed_in();
    run_ok(home.path(), &["timer", "start"]);
    let (_, stderr, code) = run_cli(home.path(), &["timer", "finish", "--productivity", "11"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("between 1 and 10"), "stderr: {stderr}");

    let status = run_ok(home.path(), &["timer", "status"]);
    assert_eq!(status["status"], "running");
}

#[test]
fn test_sleep_log_replaces_same_day() {
    let home = signed_in();
    run_ok(home.path(), &["log", "sleep", "4", "--date", "2026-03-01"]);
    run_ok(home.path(), &["log", "sleep", "9", "--date", "2026-03-01", "--note", "slept in"]);
    run_ok(home.path(), &["log", "mood", "6"]);

    let logs = run_ok(home.path(), &["log", "list", "--json"]);
    let sleep = logs["sleep"].as_array().unwrap();
    assert_eq!(sleep.len(), 1);
    assert_eq!(sleep[0]["score"], 9);
    assert_eq!(logs["mood"].as_array().unwrap().len(), 1);
}

#[test]
fn test_config_get_and_reject_unknown() {
    let home = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(home.path(), &["config", "get", "timer.tick_interval_ms"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "1000");

    let (_, _, code) = run_cli(home.path(), &["config", "set", "timer.nope", "1"]);
    assert_ne!(code, 0);
}

#[test]
fn test_watch_idle_prints_single_tick() {
    let home = tempfile::tempdir().unwrap();
    let json = run_ok(home.path(), &["timer", "watch", "--ticks", "1"]);
    assert_eq!(json["type"], "Tick");
    assert_eq!(json["snapshot"]["status"], "idle");
}

#[test]
fn test_config_get_unset_prints_nothing() {
    let home = tempfile::tempdir().unwrap();
    let (stdout, stderr, code) = run_cli(home.path(), &["config", "get", "identity.user_id"]);
    assert_eq!(code, 0, "stderr: {stderr}");
    assert!(stdout.is_empty(), "stdout: {stdout}");

    run_cli(home.path(), &["config", "set", "identity.user_id", "student"]);
    let (stdout, _, _) = run_cli(home.path(), &["config", "get", "identity.user_id"]);
    assert_eq!(stdout.trim(), "student");

    let (_, _, code) = run_cli(home.path(), &["config", "unset", "identity.user_id"]);
    assert_eq!(code, 0);
    let (stdout, _, _) = run_cli(home.path(), &["config", "get", "identity.user_id"]);
    assert!(stdout.is_empty());
}

#[test]
fn test_invalid_config_file_is_reported() {
    let home = signed_in();
    let path = home.path().join(".config/studytimer/config.toml");
    std::fs::write(
        &path,
        "[identity]\nuser_id = \"student\"\n\n[timer]\ntick_interval_ms = 0\n",
    )
    .unwrap();

    let (stdout, stderr, code) = run_cli(home.path(), &["timer", "start"]);
    assert_ne!(code, 0);
    assert!(stdout.is_empty(), "stdout: {stdout}");
    assert!(stderr.contains("timer.tick_interval_ms"), "stderr: {stderr}");

    // The config command still works so the file can be repaired.
    let (_, stderr, code) = run_cli(home.path(), &["config", "reset"]);
    assert_eq!(code, 0, "stderr: {stderr}");
    let json = run_ok(home.path(), &["timer", "status"]);
    assert_eq!(json["status"], "idle");
}
