//! Basic CLI E2E tests.
//!
//! Each test runs the compiled binary against its own temporary home
//! directory (TIMEBANK_ENV=dev), so tests never touch real user data
//! and can run in parallel.

use std::path::Path;
use std::process::Command;

/// Run the CLI with an isolated home directory and return output.
fn run_cli(home: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_timebank"))
        .args(args)
        .env("HOME", home)
        .env("TIMEBANK_ENV", "dev")
        .output()
        .expect("failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn init_schedule(home: &Path) {
    let (_, stderr, code) = run_cli(
        home,
        &[
            "schedule", "init", "--anchor", "2025-06-02", "--start", "09:00", "--end", "17:00",
        ],
    );
    assert_eq!(code, 0, "schedule init failed: {stderr}");
}

#[test]
fn test_help() {
    let home = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(home.path(), &["--help"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Timebank CLI"));
}

#[test]
fn test_completions_bash() {
    let home = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(home.path(), &["completions", "bash"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("timebank"));
}

#[test]
fn test_config_path_and_show() {
    let home = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(home.path(), &["config", "path"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("config.toml"));

    let (stdout, _, code) = run_cli(home.path(), &["config", "show"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("toil_job_number"));
}

#[test]
fn test_config_set_then_get() {
    let home = tempfile::tempdir().unwrap();
    let (stdout, stderr, code) = run_cli(home.path(), &["config", "set", "coordinator.max_batch", "4"]);
    assert_eq!(code, 0, "config set failed: {stderr}");
    assert_eq!(stdout.trim(), "ok");

    let (stdout, _, code) = run_cli(home.path(), &["config", "get", "coordinator.max_batch"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "4");
}

#[test]
fn test_config_get_unknown_key_fails() {
    let home = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(home.path(), &["config", "get", "coordinator.nope"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("unknown key"));
}

#[test]
fn test_schedule_init_and_show() {
    let home = tempfile::tempdir().unwrap();
    init_schedule(home.path());

    let (stdout, _, code) = run_cli(home.path(), &["schedule", "show"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("anchor_monday"));
    assert!(stdout.contains("2025-06-02"));
}

#[test]
fn test_schedule_mutation_requires_init() {
    let home = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(home.path(), &["schedule", "set-rdo", "1", "4"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("no schedule configured"));
}

#[test]
fn test_entry_add_then_summary_accrues_overtime() {
    let home = tempfile::tempdir().unwrap();
    init_schedule(home.path());

    // 10 h on an 8 h Monday accrues 2.
    let (stdout, stderr, code) = run_cli(
        home.path(),
        &[
            "entry", "add", "--user", "u1", "--date", "2025-06-02", "--hours", "10",
        ],
    );
    assert_eq!(code, 0, "entry add failed: {stderr}");
    assert!(stdout.contains("Entry created:"));

    let (stdout, _, code) = run_cli(
        home.path(),
        &["toil", "summary", "--user", "u1", "--month", "2025-06"],
    );
    assert_eq!(code, 0);
    assert!(stdout.contains("\"accrued\": 2.0"));
    assert!(stdout.contains("\"remaining\": 2.0"));
}

#[test]
fn test_toil_entry_draws_balance_down() {
    let home = tempfile::tempdir().unwrap();
    init_schedule(home.path());

    let (_, stderr, code) = run_cli(
        home.path(),
        &[
            "entry", "add", "--user", "u1", "--date", "2025-06-02", "--hours", "10",
        ],
    );
    assert_eq!(code, 0, "entry add failed: {stderr}");

    let (_, stderr, code) = run_cli(
        home.path(),
        &[
            "entry", "add", "--user", "u1", "--date", "2025-06-03", "--hours", "4", "--job",
            "TOIL",
        ],
    );
    assert_eq!(code, 0, "usage entry add failed: {stderr}");

    let (stdout, _, code) = run_cli(
        home.path(),
        &["toil", "summary", "--user", "u1", "--month", "2025-06"],
    );
    assert_eq!(code, 0);
    assert!(stdout.contains("\"accrued\": 2.0"));
    assert!(stdout.contains("\"used\": 4.0"));
    assert!(stdout.contains("\"remaining\": -2.0"));
}

#[test]
fn test_entry_list_month_filter() {
    let home = tempfile::tempdir().unwrap();
    init_schedule(home.path());

    for (date, hours) in [("2025-06-02", "8"), ("2025-07-01", "8")] {
        let (_, stderr, code) = run_cli(
            home.path(),
            &["entry", "add", "--user", "u1", "--date", date, "--hours", hours],
        );
        assert_eq!(code, 0, "entry add failed: {stderr}");
    }

    let (stdout, _, code) = run_cli(
        home.path(),
        &["entry", "list", "--user", "u1", "--month", "2025-06"],
    );
    assert_eq!(code, 0);
    let entries: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(entries.as_array().unwrap().len(), 1);
    assert_eq!(entries[0]["date"], "2025-06-02");
}

#[test]
fn test_entry_update_not_found() {
    let home = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(
        home.path(),
        &["entry", "update", "missing-id", "--hours", "5"],
    );
    assert_ne!(code, 0);
    assert!(stderr.contains("entry not found"));
}

#[test]
fn test_purge_then_summary_is_zero() {
    let home = tempfile::tempdir().unwrap();
    init_schedule(home.path());

    for date in ["2025-06-02", "2025-06-03"] {
        let (_, stderr, code) = run_cli(
            home.path(),
            &["entry", "add", "--user", "u1", "--date", date, "--hours", "10"],
        );
        assert_eq!(code, 0, "entry add failed: {stderr}");
    }

    let (stdout, stderr, code) = run_cli(home.path(), &["entry", "purge", "--user", "u1"]);
    assert_eq!(code, 0, "purge failed: {stderr}");
    assert!(stdout.contains("Deleted 2 entries"));

    let (stdout, _, code) = run_cli(
        home.path(),
        &["toil", "summary", "--user", "u1", "--month", "2025-06"],
    );
    assert_eq!(code, 0);
    assert!(stdout.contains("\"accrued\": 0.0"));
}

#[test]
fn test_holiday_add_list_remove() {
    let home = tempfile::tempdir().unwrap();

    let (stdout, stderr, code) = run_cli(
        home.path(),
        &["holiday", "add", "2025-06-09", "WA", "--name", "WA Day"],
    );
    assert_eq!(code, 0, "holiday add failed: {stderr}");
    assert!(stdout.contains("holiday added"));

    let (stdout, _, code) = run_cli(home.path(), &["holiday", "list"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("WA Day"));

    let (stdout, _, code) = run_cli(home.path(), &["holiday", "remove", "2025-06-09", "WA"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("holiday removed"));

    let (_, stderr, code) = run_cli(home.path(), &["holiday", "remove", "2025-06-09", "WA"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("no holiday"));
}

#[test]
fn test_breaker_status() {
    let home = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(home.path(), &["breaker", "status"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("globallyDisabled"));
    assert!(stdout.contains("inProgress"));
}

#[test]
fn test_toil_trigger_flushes() {
    let home = tempfile::tempdir().unwrap();
    init_schedule(home.path());

    let (stdout, stderr, code) = run_cli(
        home.path(),
        &["toil", "trigger", "--user", "u1", "--month", "2025-06"],
    );
    assert_eq!(code, 0, "trigger failed: {stderr}");
    assert!(stdout.contains("queued: u1 2025-06"));
    assert!(stdout.contains("flushed"));
}
