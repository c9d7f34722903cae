// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scan record and status state machine.

use crate::id::ScanId;
use serde::{Deserialize, Serialize};

/// Server-side status of one scan.
///
/// Transitions are monotonic toward a terminal state; only the supervisor
/// (or the dispatcher's local fallback path) writes terminal states.
///
/// ```text
/// CREATED ─▶ RUNNING ─┬─▶ FINISHED
///                     ├─▶ ERROR-FAILED
///                     ├─▶ ABORTED
///                     └─▶ ABORT-REQUESTED ─┬─▶ ABORTED
///                                          ├─▶ FINISHED
///                                          └─▶ ERROR-FAILED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanStatus {
    #[serde(rename = "CREATED")]
    Created,
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "ABORT-REQUESTED")]
    AbortRequested,
    #[serde(rename = "ABORTED")]
    Aborted,
    #[serde(rename = "FINISHED")]
    Finished,
    #[serde(rename = "ERROR-FAILED")]
    ErrorFailed,
}

crate::simple_display! {
    ScanStatus {
        Created => "CREATED",
        Running => "RUNNING",
        AbortRequested => "ABORT-REQUESTED",
        Aborted => "ABORTED",
        Finished => "FINISHED",
        ErrorFailed => "ERROR-FAILED",
    }
}

impl ScanStatus {
    /// Parse the wire/store form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CREATED" => Some(Self::Created),
            "RUNNING" => Some(Self::Running),
            "ABORT-REQUESTED" => Some(Self::AbortRequested),
            "ABORTED" => Some(Self::Aborted),
            "FINISHED" => Some(Self::Finished),
            "ERROR-FAILED" => Some(Self::ErrorFailed),
            _ => None,
        }
    }

    /// Terminal states never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Aborted | Self::Finished | Self::ErrorFailed)
    }

    /// Active scans are the ones the supervisor keeps a consumer for.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::AbortRequested)
    }

    /// Whether the state machine admits `self → to`.
    ///
    /// `ABORT-REQUESTED → FINISHED` is admitted: a scan that completes just
    /// as the abort lands is a benign race, not an error.
    pub fn may_transition(self, to: Self) -> bool {
        match self {
            Self::Created => matches!(to, Self::Running),
            Self::Running => {
                matches!(to, Self::AbortRequested | Self::Aborted | Self::Finished | Self::ErrorFailed)
            }
            Self::AbortRequested => matches!(to, Self::Aborted | Self::Finished | Self::ErrorFailed),
            Self::Aborted | Self::Finished | Self::ErrorFailed => false,
        }
    }
}

/// One scan instance as persisted in the control-plane store.
///
/// The row is created by the dispatcher *before* the task is published and
/// destroyed only by explicit deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scan {
    pub id: ScanId,
    pub name: String,
    pub target: String,
    pub target_type: String,
    pub status: ScanStatus,
    /// Epoch ms when the row was created.
    pub created_ms: u64,
    /// Epoch ms when execution started (set at dispatch).
    pub started_ms: Option<u64>,
    /// Epoch ms when a terminal status was recorded.
    pub ended_ms: Option<u64>,
}

#[cfg(test)]
#[path = "scan_tests.rs"]
mod tests;
