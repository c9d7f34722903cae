// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One task, end to end.
//!
//! Wipes and recreates the scan's task-local store (idempotence under
//! at-least-once delivery), wires up the result sink and the abort bridge,
//! runs the engine, and afterwards publishes whichever terminal lifecycle
//! actually happened. All durable output leaves through the sink; the
//! task-local store is removed on the way out.

use crate::sink::BrokerSink;
use muninn_broker::Broker;
use muninn_core::{Lifecycle, ResultMode, ScanStatus, ScanTask};
use muninn_engine::bridge;
use muninn_engine::{EventSink, ScanEngine, StoreSink};
use muninn_storage::{Store, StoreError, TaskLocalStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("scan failed: {0}")]
    Engine(String),
}

/// Everything a task execution needs from the worker process.
pub struct TaskContext {
    pub broker: Arc<Broker>,
    pub shared_store: Store,
    pub data_dir: PathBuf,
    pub engine: Arc<dyn ScanEngine>,
    /// Abort-bridge poll interval (≈ 3 s in production, short in tests).
    pub abort_poll: Duration,
}

/// Run one delivered task to completion. `Ok` means the delivery should be
/// acked — including a clean abort; `Err` means nack-without-requeue.
pub async fn run_scan_task(ctx: &TaskContext, task: &ScanTask) -> Result<(), TaskError> {
    tracing::info!(
        scan_id = %task.scan_id,
        target = %task.scan_target,
        modules = %task.module_list,
        "starting scan"
    );

    // Fresh store per delivery: a leftover from an earlier delivery of the
    // same scan is deleted first.
    let local = TaskLocalStore::create_fresh(
        &ctx.data_dir,
        &task.scan_id,
        &task.scan_name,
        &task.scan_target,
    )?;

    let result = match task.result_mode {
        ResultMode::Broker => {
            let sink = BrokerSink::new(ctx.broker.clone(), task.scan_id);
            let result = drive(ctx, task, &local, &sink).await;
            sink.shutdown().await;
            result
        }
        ResultMode::Direct => {
            let sink = StoreSink::new(ctx.shared_store.clone(), task.scan_id);
            drive(ctx, task, &local, &sink).await
        }
    };

    if let Err(e) = local.remove() {
        tracing::warn!(scan_id = %task.scan_id, error = %e, "failed to remove task-local store");
    }

    match &result {
        Ok(()) => tracing::info!(scan_id = %task.scan_id, "scan completed"),
        Err(e) => tracing::error!(scan_id = %task.scan_id, error = %e, "scan failed"),
    }
    result
}

/// Run the engine with the abort bridge alive, then settle the terminal
/// lifecycle from the task-local store's final status.
async fn drive(
    ctx: &TaskContext,
    task: &ScanTask,
    local: &TaskLocalStore,
    sink: &dyn EventSink,
) -> Result<(), TaskError> {
    let bridge_cancel = CancellationToken::new();
    let bridge = bridge::spawn(
        ctx.shared_store.clone(),
        ctx.data_dir.clone(),
        task.scan_id,
        ctx.abort_poll,
        bridge_cancel.clone(),
    );

    let outcome = ctx.engine.run(task, local, sink).await;

    bridge_cancel.cancel();
    let _ = bridge.await;

    // The engine publishes FINISHED itself on normal completion. For every
    // other ending the engine stays silent and we publish the terminal
    // state that truly occurred.
    match outcome {
        Ok(()) => match local.status()? {
            Some(ScanStatus::Finished) => Ok(()),
            Some(ScanStatus::Aborted) => {
                emit_terminal(sink, task, Lifecycle::Aborted).await;
                Ok(())
            }
            status => {
                emit_terminal(sink, task, Lifecycle::Failed).await;
                Err(TaskError::Engine(format!(
                    "engine returned without a terminal status (saw {status:?})"
                )))
            }
        },
        Err(e) => {
            emit_terminal(sink, task, Lifecycle::Failed).await;
            Err(TaskError::Engine(e.to_string()))
        }
    }
}

async fn emit_terminal(sink: &dyn EventSink, task: &ScanTask, lifecycle: Lifecycle) {
    if let Err(e) = sink.emit_lifecycle(lifecycle).await {
        tracing::warn!(scan_id = %task.scan_id, %lifecycle, error = %e, "terminal lifecycle emit failed");
    }
}

#[cfg(test)]
#[path = "task_run_tests.rs"]
mod tests;
