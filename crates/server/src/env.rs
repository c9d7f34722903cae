// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the control plane.

use std::path::PathBuf;
use std::time::Duration;

/// Root data directory: `DATA_PATH`, else the platform data dir, else
/// `/var/lib/muninn` (the container layout).
pub fn data_path() -> PathBuf {
    if let Ok(dir) = std::env::var("DATA_PATH") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::data_local_dir()
        .map(|d| d.join("muninn"))
        .unwrap_or_else(|| PathBuf::from("/var/lib/muninn"))
}

/// Shared control-plane store file under the data path.
pub fn shared_store_path() -> PathBuf {
    data_path().join("muninn.db")
}

/// HTTP listen address: `API_LISTEN`, default `0.0.0.0:5001`.
pub fn listen_addr() -> String {
    std::env::var("API_LISTEN")
        .ok()
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| "0.0.0.0:5001".to_string())
}

/// Offline-worker cleanup timeout: `WORKER_CLEANUP_TIMEOUT` (seconds),
/// default 300.
pub fn worker_cleanup_timeout() -> Duration {
    std::env::var("WORKER_CLEANUP_TIMEOUT")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(300))
}

/// Base URL workers should heartbeat to, as advertised in task messages:
/// `API_URL`, default `http://localhost:5001`.
pub fn api_url() -> String {
    std::env::var("API_URL")
        .ok()
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| "http://localhost:5001".to_string())
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
