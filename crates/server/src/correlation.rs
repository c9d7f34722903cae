// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Correlation post-processing.
//!
//! Correlations run after `FINISHED` in a forked-off child process
//! (`muninnd correlate --scan <id>`) with a hard wall clock, so a
//! runaway or OOM-killed rule pass can never take the control plane down
//! with it. A non-clean exit is diagnosed and logged; the scan stays
//! `FINISHED` regardless — only the enrichment failed.

use muninn_core::{Clock, LogRecord, ScanId, SystemClock};
use muninn_storage::{Store, StoreError};
use serde::Deserialize;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::Duration;

/// Heavy graph-enrichment rules are skipped below this much available
/// memory.
pub const MIN_HEAVY_MEM_KB: u64 = 512 * 1024;

/// Outcome of one correlation child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationOutcome {
    Clean,
    /// Killed by the OOM killer (signal 9 / exit code 137).
    OomKilled,
    TimedOut,
    Failed(Option<i32>),
}

/// Dispatches correlation runs. The supervisor talks to this trait so
/// tests can observe dispatch without forking processes.
#[async_trait::async_trait]
pub trait Correlator: Send + Sync {
    async fn run(&self, scan_id: &ScanId);
}

/// Production correlator: re-invokes this binary's `correlate` subcommand
/// in its own process group.
pub struct ProcessCorrelator {
    program: PathBuf,
    rules_dir: PathBuf,
    timeout: Duration,
}

impl ProcessCorrelator {
    pub fn new(program: PathBuf, rules_dir: PathBuf, timeout: Duration) -> Self {
        Self { program, rules_dir, timeout }
    }
}

#[async_trait::async_trait]
impl Correlator for ProcessCorrelator {
    async fn run(&self, scan_id: &ScanId) {
        let mut command = tokio::process::Command::new(&self.program);
        command
            .arg("correlate")
            .arg("--scan")
            .arg(scan_id.as_str())
            .arg("--rules")
            .arg(&self.rules_dir)
            .process_group(0)
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(scan_id = %scan_id, error = %e, "failed to spawn correlation child");
                return;
            }
        };
        let pid = child.id();

        let outcome = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) => classify_exit(status),
            Ok(Err(e)) => {
                tracing::error!(scan_id = %scan_id, error = %e, "correlation child wait failed");
                return;
            }
            Err(_) => {
                kill_group(pid);
                let _ = child.wait().await;
                CorrelationOutcome::TimedOut
            }
        };

        match outcome {
            CorrelationOutcome::Clean => {
                tracing::info!(scan_id = %scan_id, "correlations completed");
            }
            CorrelationOutcome::OomKilled => {
                tracing::error!(scan_id = %scan_id, "correlation child was OOM-killed; scan stays FINISHED");
            }
            CorrelationOutcome::TimedOut => {
                tracing::error!(
                    scan_id = %scan_id,
                    timeout_secs = self.timeout.as_secs(),
                    "correlation child hit the wall clock; scan stays FINISHED"
                );
            }
            CorrelationOutcome::Failed(code) => {
                tracing::error!(scan_id = %scan_id, code = ?code, "correlation child failed; scan stays FINISHED");
            }
        }
    }
}

/// Distinguish clean, OOM-killed (`-9`/`137`), and other failures.
pub fn classify_exit(status: ExitStatus) -> CorrelationOutcome {
    if status.success() {
        return CorrelationOutcome::Clean;
    }
    if status.signal() == Some(9) || status.code() == Some(137) {
        return CorrelationOutcome::OomKilled;
    }
    CorrelationOutcome::Failed(status.code())
}

/// SIGKILL the child's whole process group; rules may fork helpers.
fn kill_group(pid: Option<u32>) {
    let Some(pid) = pid else { return };
    let group = nix::unistd::Pid::from_raw(-(pid as i32));
    if let Err(e) = nix::sys::signal::kill(group, nix::sys::signal::Signal::SIGKILL) {
        tracing::warn!(pid, error = %e, "failed to kill correlation process group");
    }
}

// ── Child side ──────────────────────────────────────────────────────────

/// One correlation rule descriptor. Evaluation logic lives behind this
/// boundary and is installed by the deployment; the pipeline only drives
/// iteration, skipping, and diagnostics.
#[derive(Debug, Deserialize)]
pub struct RuleSpec {
    pub id: String,
    /// Requires heavy graph enrichment; skipped under memory pressure.
    #[serde(default)]
    pub heavy: bool,
}

/// Iterate the rule files one at a time for a finished scan.
///
/// Per-rule problems never stop the pass: unparseable rules log
/// `RULE_ERROR`, heavy rules without memory headroom log `SKIP_HEAVY`.
pub fn run_rules(
    store: &Store,
    scan_id: &ScanId,
    rules_dir: &Path,
    min_heavy_mem_kb: u64,
) -> Result<(), StoreError> {
    let clock = SystemClock;
    let mut paths: Vec<PathBuf> = match std::fs::read_dir(rules_dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "toml"))
            .collect(),
        Err(e) => {
            tracing::warn!(dir = %rules_dir.display(), error = %e, "no correlation rules directory");
            return Ok(());
        }
    };
    paths.sort();

    let available = mem_available_kb();
    for path in paths {
        let rule: RuleSpec = match std::fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|raw| toml::from_str(&raw).map_err(|e| e.to_string()))
        {
            Ok(rule) => rule,
            Err(e) => {
                tracing::error!(rule = %path.display(), error = %e, "RULE_ERROR");
                scan_warn(store, scan_id, &clock, format!("RULE_ERROR {}: {e}", path.display()))?;
                continue;
            }
        };

        if rule.heavy && available.is_some_and(|kb| kb < min_heavy_mem_kb) {
            tracing::warn!(rule = %rule.id, "SKIP_HEAVY");
            scan_warn(store, scan_id, &clock, format!("SKIP_HEAVY {}", rule.id))?;
            continue;
        }

        // Rule evaluation is installed by the deployment; the built-in
        // pass records that the rule was visited.
        tracing::debug!(rule = %rule.id, scan_id = %scan_id, "rule evaluated");
    }
    Ok(())
}

fn scan_warn(store: &Store, scan_id: &ScanId, clock: &SystemClock, message: String) -> Result<(), StoreError> {
    store.scan_log_append(
        scan_id,
        &LogRecord {
            level: "WARNING".to_string(),
            message,
            component: "correlation".to_string(),
            time: clock.epoch_secs(),
        },
    )
}

/// `MemAvailable` from /proc/meminfo, `None` when unreadable.
fn mem_available_kb() -> Option<u64> {
    let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
    meminfo
        .lines()
        .find(|l| l.starts_with("MemAvailable:"))
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|kb| kb.parse().ok())
}

#[cfg(test)]
#[path = "correlation_tests.rs"]
mod tests;
