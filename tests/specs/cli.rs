// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Binary CLI contracts.

use assert_cmd::Command;
use serial_test::serial;

#[test]
#[serial]
fn worker_without_broker_url_exits_1() {
    let dir = tempfile::tempdir().unwrap();
    Command::cargo_bin("muninn-worker")
        .unwrap()
        .env_remove("BROKER_URL")
        .env("DATA_PATH", dir.path())
        .assert()
        .code(1);
}

#[test]
fn worker_help_lists_queue_and_concurrency() {
    let assert = Command::cargo_bin("muninn-worker").unwrap().arg("--help").assert().success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    assert!(stdout.contains("--queue"), "{stdout}");
    assert!(stdout.contains("--concurrency"), "{stdout}");
}

#[test]
fn worker_rejects_unknown_queue() {
    Command::cargo_bin("muninn-worker")
        .unwrap()
        .args(["--queue", "medium"])
        .assert()
        .failure();
}

#[test]
fn server_help_lists_correlate_subcommand() {
    let assert = Command::cargo_bin("muninnd").unwrap().arg("--help").assert().success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    assert!(stdout.contains("correlate"), "{stdout}");
}

#[test]
#[serial]
fn correlate_child_with_no_rules_dir_exits_clean() {
    let dir = tempfile::tempdir().unwrap();
    Command::cargo_bin("muninnd")
        .unwrap()
        .env("DATA_PATH", dir.path())
        .args(["correlate", "--scan", "feedface01", "--rules"])
        .arg(dir.path().join("no-such-rules"))
        .assert()
        .success();
}
