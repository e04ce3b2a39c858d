//! The `fanlog` binary.

use assert_cmd::Command;
use helpers::mock_telegram::{accept_all, reject_chat, sent_messages, start_bot};
use predicates::prelude::*;
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::tempdir;
use wiremock::MockServer;

#[path = "../helpers/mod.rs"]
mod helpers;

const TOKEN: &str = "123456:ABC";

/// A command isolated from the caller's `FANLOG_` environment.
fn fanlog(workdir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("fanlog").unwrap();
    cmd.current_dir(workdir)
        .env_remove("FANLOG_ENV")
        .env_remove("FANLOG_DIRNAME")
        .env_remove("FANLOG_EXIT_ON_ERROR")
        .env_remove("FANLOG_TELEGRAM__TOKEN")
        .env_remove("FANLOG_TELEGRAM__CHATS")
        .env_remove("RUST_LOG");
    cmd
}

fn read_error_logs(dir: &Path) -> String {
    fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| n.starts_with("error.") && n.ends_with(".log"))
        })
        .map(|p| fs::read_to_string(p).unwrap())
        .collect()
}

#[test]
fn test_warning_goes_to_console_and_file() {
    let dir = tempdir().unwrap();
    let logs = dir.path().join("logs");

    fanlog(dir.path())
        .arg("--dirname")
        .arg(&logs)
        .args(["--label", "api", "--level", "warning", "disk low"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[api] warning: \tdisk low"));

    assert!(read_error_logs(&logs).contains("[api] warning: disk low"));
}

#[test]
fn test_default_log_dir_is_relative_to_workdir() {
    let dir = tempdir().unwrap();

    fanlog(dir.path())
        .args(["--level", "error", "boom"])
        .assert()
        .success();

    assert!(read_error_logs(&dir.path().join("logs")).contains("error: boom"));
}

#[test]
fn test_production_mode_silences_console() {
    let dir = tempdir().unwrap();

    fanlog(dir.path())
        .env("FANLOG_ENV", "production")
        .args(["--level", "info", "quiet"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_unknown_level_is_rejected() {
    let dir = tempdir().unwrap();

    fanlog(dir.path())
        .args(["--level", "loud", "hello"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("loud"));
}

#[test]
fn test_config_file_is_applied() {
    let dir = tempdir().unwrap();
    let logs = dir.path().join("from-file");
    let config = dir.path().join("fanlog.toml");
    fs::write(&config, format!("dirname = {:?}\n", logs.to_str().unwrap())).unwrap();

    fanlog(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["--level", "emerg", "configured"])
        .assert()
        .success();

    assert!(read_error_logs(&logs).contains("emerg: configured"));
}

#[tokio::test]
async fn test_emergency_is_sent_to_every_chat() {
    let dir = tempdir().unwrap();
    let server = start_bot(TOKEN).await;

    fanlog(dir.path())
        .env("FANLOG_ENV", "production")
        .args(["--token", TOKEN, "--chat", "11", "--chat", "@ops"])
        .args(["--api-base", server.uri().as_str()])
        .args(["--level", "emerg", "db down"])
        .assert()
        .success();

    let sent = sent_messages(&server).await;
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().any(|b| b["chat_id"] == json!(11)));
    assert!(sent.iter().any(|b| b["chat_id"] == json!("@ops")));
}

#[tokio::test]
async fn test_delivery_failure_exits_non_zero() {
    let dir = tempdir().unwrap();
    let server = MockServer::start().await;
    reject_chat(&server, TOKEN, json!(11), "Forbidden: bot was kicked").await;
    accept_all(&server, TOKEN).await;

    fanlog(dir.path())
        .env("FANLOG_ENV", "production")
        .args(["--token", TOKEN, "--chat", "11", "--chat", "12"])
        .args(["--api-base", server.uri().as_str()])
        .args(["--no-exit-on-error", "--level", "emerg", "db down"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Forbidden: bot was kicked"));

    assert_eq!(sent_messages(&server).await.len(), 2);
}

#[test]
fn test_uncaught_panic_is_recorded_and_exits_one() {
    let dir = tempdir().unwrap();
    let logs = dir.path().join("logs");

    fanlog(dir.path())
        .arg("--dirname")
        .arg(&logs)
        .args(["--simulate-panic", "before crash"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("uncaughtException: simulated panic"));

    let exceptions = fs::read_to_string(logs.join("exception.log")).unwrap();
    assert!(exceptions.contains("uncaughtException: simulated panic"));
}

#[test]
fn test_uncaught_panic_without_exit_keeps_default_panic_status() {
    let dir = tempdir().unwrap();
    let logs = dir.path().join("logs");

    // The hook does not exit, so the panic unwinds out of main.
    fanlog(dir.path())
        .arg("--dirname")
        .arg(&logs)
        .args(["--no-exit-on-error", "--simulate-panic", "before crash"])
        .assert()
        .code(101)
        .stderr(predicate::str::contains("simulated panic"));

    let exceptions = fs::read_to_string(logs.join("exception.log")).unwrap();
    assert!(exceptions.contains("uncaughtException: simulated panic"));
}

#[tokio::test]
async fn test_propagated_failure_exits_before_flush_completes() {
    let dir = tempdir().unwrap();
    let server = MockServer::start().await;
    reject_chat(&server, TOKEN, json!(11), "Forbidden: bot was kicked").await;
    accept_all(&server, TOKEN).await;

    fanlog(dir.path())
        .env("FANLOG_ENV", "production")
        .args(["--token", TOKEN, "--chat", "11"])
        .args(["--api-base", server.uri().as_str()])
        .args(["--propagate-errors", "--level", "emerg", "db down"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Log sink failed"))
        .stderr(predicate::str::contains("Forbidden: bot was kicked"))
        .stderr(predicate::str::contains("Delivery failed").not());
}

#[tokio::test]
async fn test_propagated_failure_without_exit_is_reported_after_flush() {
    let dir = tempdir().unwrap();
    let server = MockServer::start().await;
    reject_chat(&server, TOKEN, json!(11), "Forbidden: bot was kicked").await;
    accept_all(&server, TOKEN).await;

    fanlog(dir.path())
        .env("FANLOG_ENV", "production")
        .args(["--token", TOKEN, "--chat", "11"])
        .args(["--api-base", server.uri().as_str()])
        .args(["--propagate-errors", "--no-exit-on-error"])
        .args(["--level", "emerg", "db down"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Log sink failed"))
        .stderr(predicate::str::contains("Delivery failed"));
}
