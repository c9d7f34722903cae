// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker registry records and heartbeats.

use crate::id::{ScanId, WorkerId};
use crate::task::QueueType;
use serde::{Deserialize, Serialize};

/// Worker status as tracked by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    Idle,
    Busy,
    Offline,
}

crate::simple_display! {
    WorkerStatus {
        Idle => "idle",
        Busy => "busy",
        Offline => "offline",
    }
}

impl WorkerStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(Self::Idle),
            "busy" => Some(Self::Busy),
            "offline" => Some(Self::Offline),
            _ => None,
        }
    }
}

/// Heartbeat body a worker POSTs every ~15 s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub worker_id: WorkerId,
    pub name: String,
    pub host: String,
    pub queue_type: QueueType,
    pub status: WorkerStatus,
    /// Scan the worker is currently executing, if any. Empty string on the
    /// wire when idle (the worker fleet predates `null` here).
    #[serde(default)]
    pub current_scan: String,
}

impl Heartbeat {
    pub fn current_scan_id(&self) -> Option<ScanId> {
        if self.current_scan.is_empty() {
            None
        } else {
            Some(ScanId::new(&self.current_scan))
        }
    }
}

/// Registry row for one worker.
///
/// Created on first heartbeat; marked offline when heartbeats stop; deleted
/// by the sweep after the cleanup timeout. Workers are stateless — a
/// deleted worker simply re-registers on its next heartbeat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerRecord {
    pub id: WorkerId,
    pub name: String,
    pub host: String,
    pub queue_type: QueueType,
    pub status: WorkerStatus,
    pub current_scan: String,
    /// Epoch ms of the most recent heartbeat.
    pub last_seen_ms: u64,
    /// Epoch ms of first registration.
    pub registered_ms: u64,
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
