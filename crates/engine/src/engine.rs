// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The engine contract.

use crate::sink::{EventSink, SinkError};
use muninn_storage::{StoreError, TaskLocalStore};
use muninn_core::ScanTask;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    /// The scan itself raised. The worker publishes `FAILED` and nacks
    /// without requeue.
    #[error("scan failed: {0}")]
    Failed(String),
}

/// One scan engine.
///
/// Contract, enforced by the worker runtime around every implementation:
///
/// - The engine emits events and scan logs through `sink` while running.
/// - It polls `local` for `ABORT-REQUESTED` at its own tick and honors it
///   by writing `ABORTED` into `local` and returning `Ok`.
/// - On normal completion it writes `FINISHED` into `local` and publishes
///   the `FINISHED` lifecycle itself (through `sink`).
/// - On abort or error it publishes no lifecycle: the worker inspects
///   `local` afterwards and publishes `ABORTED` or `FAILED`, so the
///   terminal state on the wire is exactly the one that occurred.
#[async_trait::async_trait]
pub trait ScanEngine: Send + Sync {
    async fn run(
        &self,
        task: &ScanTask,
        local: &TaskLocalStore,
        sink: &dyn EventSink,
    ) -> Result<(), EngineError>;
}
