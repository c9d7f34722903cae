// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the worker.

use std::path::PathBuf;

/// Root for the shared store and per-scan task-local stores.
/// `DATA_PATH`, default `/var/lib/muninn`.
pub fn data_path() -> PathBuf {
    std::env::var("DATA_PATH")
        .ok()
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/var/lib/muninn"))
}

/// Shared control-plane store file under the data path.
pub fn shared_store_path() -> PathBuf {
    data_path().join("muninn.db")
}

/// Base URL of the control-plane API for heartbeats.
/// `API_URL`, default `http://localhost:5001`.
pub fn api_url() -> String {
    std::env::var("API_URL")
        .ok()
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| "http://localhost:5001".to_string())
}

/// Human-readable worker name shown in the UI.
/// `WORKER_NAME`, default: hostname.
pub fn worker_name() -> String {
    std::env::var("WORKER_NAME").ok().filter(|n| !n.is_empty()).unwrap_or_else(hostname)
}

/// Best-effort hostname; workers are identified by UUID, the hostname is
/// display metadata only.
pub fn hostname() -> String {
    nix::unistd::gethostname()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "unknown-host".to_string())
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
