// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Abort bridge.
//!
//! One task per running scan polls the control-plane store and mirrors an
//! externally-requested cancellation into the task-local store, where the
//! engine's own polling loop picks it up. The bridge is the only link
//! between the two stores: the engine never reads the shared store and the
//! control plane never reaches into a worker.

use muninn_core::{ScanId, ScanStatus};
use muninn_storage::{Store, TaskLocalStore};
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How often the bridge polls the control-plane store.
pub const POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Retry spacing while the task-local row does not exist yet (race window
/// during scan startup).
const LOCAL_RETRY: Duration = Duration::from_millis(500);

/// Spawn the bridge for one scan. It exits when it has mirrored an abort,
/// when the scan reaches a terminal state, or when cancelled.
pub fn spawn(
    store: Store,
    data_dir: PathBuf,
    scan_id: ScanId,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = cancel.cancelled() => return,
                () = tokio::time::sleep(interval) => {}
            }

            match store.scan_get(&scan_id) {
                // Row deleted out from under a running scan: treat as abort.
                Ok(None) => {
                    tracing::info!(scan_id = %scan_id, "scan row deleted — mirroring abort");
                    mirror_abort(&data_dir, &scan_id, &cancel).await;
                    return;
                }
                Ok(Some(scan)) if scan.status == ScanStatus::AbortRequested => {
                    tracing::info!(scan_id = %scan_id, "abort requested — mirroring into task-local store");
                    mirror_abort(&data_dir, &scan_id, &cancel).await;
                    return;
                }
                Ok(Some(scan)) if scan.status.is_terminal() => return,
                Ok(Some(_)) => {}
                Err(e) => {
                    tracing::warn!(scan_id = %scan_id, error = %e, "abort bridge store poll failed");
                }
            }
        }
    })
}

/// Write `ABORT-REQUESTED` into the task-local store, retrying until the
/// row exists. Exits once the write lands.
async fn mirror_abort(data_dir: &std::path::Path, scan_id: &ScanId, cancel: &CancellationToken) {
    loop {
        match TaskLocalStore::open(data_dir, scan_id) {
            Ok(Some(local)) => match local.set_status(ScanStatus::AbortRequested) {
                Ok(()) => return,
                Err(e) => {
                    tracing::warn!(scan_id = %scan_id, error = %e, "abort mirror write failed; retrying");
                }
            },
            Ok(None) => {
                tracing::debug!(scan_id = %scan_id, "task-local store not created yet; retrying");
            }
            Err(e) => {
                tracing::warn!(scan_id = %scan_id, error = %e, "abort mirror open failed; retrying");
            }
        }
        tokio::select! {
            () = cancel.cancelled() => return,
            () = tokio::time::sleep(LOCAL_RETRY) => {}
        }
    }
}

#[cfg(test)]
#[path = "bridge_tests.rs"]
mod tests;
