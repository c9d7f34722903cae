// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;

#[test]
#[serial]
fn data_path_env_override() {
    std::env::set_var("DATA_PATH", "/tmp/muninnd-test");
    assert_eq!(data_path(), PathBuf::from("/tmp/muninnd-test"));
    std::env::remove_var("DATA_PATH");
}

#[test]
#[serial]
fn cleanup_timeout_parses_seconds() {
    std::env::set_var("WORKER_CLEANUP_TIMEOUT", "120");
    assert_eq!(worker_cleanup_timeout(), Duration::from_secs(120));
    std::env::remove_var("WORKER_CLEANUP_TIMEOUT");
}

#[test]
#[serial]
fn cleanup_timeout_default() {
    std::env::remove_var("WORKER_CLEANUP_TIMEOUT");
    assert_eq!(worker_cleanup_timeout(), Duration::from_secs(300));
}

#[test]
#[serial]
fn listen_addr_default() {
    std::env::remove_var("API_LISTEN");
    assert_eq!(listen_addr(), "0.0.0.0:5001");
}
