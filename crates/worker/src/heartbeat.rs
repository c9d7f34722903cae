// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker heartbeats.
//!
//! One background task POSTs the worker's identity and current status to
//! the control plane every ~15 s. Failures are logged at debug level and
//! otherwise ignored: the registry marks us offline if we go quiet, and a
//! deleted worker simply re-registers on the next beat. A final `offline`
//! heartbeat is sent on shutdown.

use muninn_core::{Heartbeat, QueueType, ScanId, WorkerId, WorkerStatus};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const INTERVAL: Duration = Duration::from_secs(15);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    pub api_url: String,
    pub worker_id: WorkerId,
    pub name: String,
    pub host: String,
    pub queue_type: QueueType,
    pub interval: Duration,
}

impl HeartbeatConfig {
    pub fn endpoint(&self) -> String {
        format!("{}/workers/heartbeat", self.api_url.trim_end_matches('/'))
    }

    fn body(&self, current_scan: &Option<ScanId>) -> Heartbeat {
        let status = if current_scan.is_some() { WorkerStatus::Busy } else { WorkerStatus::Idle };
        Heartbeat {
            worker_id: self.worker_id,
            name: self.name.clone(),
            host: self.host.clone(),
            queue_type: self.queue_type,
            status,
            current_scan: current_scan.map(|id| id.to_string()).unwrap_or_default(),
        }
    }

    fn offline_body(&self) -> Heartbeat {
        Heartbeat {
            worker_id: self.worker_id,
            name: self.name.clone(),
            host: self.host.clone(),
            queue_type: self.queue_type,
            status: WorkerStatus::Offline,
            current_scan: String::new(),
        }
    }
}

/// Spawn the heartbeat task.
pub fn spawn(
    config: HeartbeatConfig,
    current_scan: watch::Receiver<Option<ScanId>>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let client = match reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build() {
            Ok(client) => client,
            Err(e) => {
                tracing::error!(error = %e, "failed to build heartbeat HTTP client");
                return;
            }
        };
        let endpoint = config.endpoint();

        loop {
            let body = config.body(&current_scan.borrow().clone());
            if let Err(e) = client.post(&endpoint).json(&body).send().await {
                tracing::debug!(error = %e, "heartbeat failed (API unreachable?)");
            }

            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(config.interval) => {}
            }
        }

        // Final offline heartbeat, best-effort.
        let _ = client.post(&endpoint).json(&config.offline_body()).send().await;
    })
}

#[cfg(test)]
#[path = "heartbeat_tests.rs"]
mod tests;
