// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for workspace specs.

use muninn_core::{ScanId, ScanStatus};
use muninn_server::correlation::Correlator;
use muninn_server::ServerConfig;
use muninn_storage::Store;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Locates a workspace binary by name.
///
/// `assert_cmd::Command::cargo_bin` only resolves binaries owned by the
/// crate under test (via `CARGO_BIN_EXE_<name>`), which this workspace-level
/// spec crate is not. All workspace members share the same `target/<profile>`
/// directory, so the test binary's own location is used to find it instead.
pub fn workspace_bin(name: &str) -> PathBuf {
    let mut path = std::env::current_exe().expect("current test executable path");
    path.pop(); // deps/
    path.pop(); // <profile>/
    path.push(name);
    path
}

/// Counts correlation dispatches instead of forking processes.
#[derive(Default)]
pub struct RecordingCorrelator {
    runs: AtomicU32,
}

impl RecordingCorrelator {
    pub fn runs(&self) -> u32 {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Correlator for RecordingCorrelator {
    async fn run(&self, _scan_id: &ScanId) {
        self.runs.fetch_add(1, Ordering::SeqCst);
    }
}

/// Control-plane config rooted in a temp dir, broker-free defaults.
pub fn server_config(dir: &tempfile::TempDir) -> ServerConfig {
    ServerConfig {
        data_dir: dir.path().to_path_buf(),
        listen_addr: "127.0.0.1:0".into(),
        api_url: "http://localhost:5001".into(),
        slow_modules: ["m_portscan_tcp".to_string()].into_iter().collect(),
        worker_stale: Duration::from_secs(60),
        worker_cleanup: Duration::from_secs(300),
        rules_dir: dir.path().join("rules"),
        correlation_timeout: Duration::from_secs(900),
    }
}

/// Poll the store until the scan settles (or fail loudly).
pub async fn wait_for_terminal(store: &Store, scan_id: &ScanId) -> ScanStatus {
    // Generous: the abort bridge alone polls on a 3 s interval.
    for _ in 0..600 {
        let scan = store.scan_get(scan_id).unwrap().unwrap();
        if scan.status.is_terminal() {
            return scan.status;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("scan {scan_id} never reached a terminal status");
}
