// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scan dispatcher.
//!
//! Normalizes a submission, creates the scan row, and routes the task to a
//! worker queue — or, when the broker is unreachable, runs the scan
//! in-process with results stored directly. Ordering is load-bearing: the
//! row exists before anything is published (so the supervisor can monitor
//! immediately), and the per-scan result queue is bound before the task
//! message goes out (the topic exchange is lossy while unbound).

use crate::config::ServerConfig;
use crate::correlation::Correlator;
use muninn_broker::{topology, Broker, BrokerError};
use muninn_core::{
    normalize_module_list, Clock, Lifecycle, QueueType, ResultMode, Scan, ScanId, ScanStatus,
    ScanTask, SystemClock, TargetKind,
};
use muninn_engine::bridge;
use muninn_engine::{EventSink, ScanEngine, StoreSink};
use muninn_storage::{Store, StoreError, TaskLocalStore};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Caller-facing submission.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ScanRequest {
    pub name: String,
    pub target: String,
    /// CSV of module identifiers.
    pub module_list: String,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("scan name was not specified")]
    MissingName,

    #[error("scan target was not specified")]
    MissingTarget,

    #[error("no modules specified for scan")]
    NoModules,

    #[error("unrecognized target type: {0:?}")]
    UnrecognizedTarget(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Where a submission ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchRoute {
    /// Published to a task queue for the worker fleet.
    Queued(QueueType),
    /// Broker unavailable; running in-process with direct result storage.
    Local,
}

#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub scan_id: ScanId,
    pub route: DispatchRoute,
}

pub struct Dispatcher {
    store: Store,
    broker: Option<Arc<Broker>>,
    engine: Arc<dyn ScanEngine>,
    correlator: Arc<dyn Correlator>,
    config: ServerConfig,
    clock: SystemClock,
    cancel: CancellationToken,
}

impl Dispatcher {
    pub fn new(
        store: Store,
        broker: Option<Arc<Broker>>,
        engine: Arc<dyn ScanEngine>,
        correlator: Arc<dyn Correlator>,
        config: ServerConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self { store, broker, engine, correlator, config, clock: SystemClock, cancel }
    }

    /// Accept a submission: validate, normalize, create the scan row, then
    /// dispatch to a queue or fall back to local execution.
    pub async fn submit(&self, request: ScanRequest) -> Result<SubmitOutcome, DispatchError> {
        let name = clean_input(&request.name);
        if name.is_empty() {
            return Err(DispatchError::MissingName);
        }
        let raw_target = clean_input(&request.target);
        if raw_target.is_empty() {
            return Err(DispatchError::MissingTarget);
        }
        let kind = TargetKind::detect(&raw_target)
            .ok_or_else(|| DispatchError::UnrecognizedTarget(raw_target.clone()))?;
        let target = kind.normalize(&raw_target);

        let modules = normalize_module_list(&request.module_list);
        if modules.is_empty() {
            return Err(DispatchError::NoModules);
        }
        let queue = QueueType::classify(modules.iter().map(String::as_str), &self.config.slow_modules);

        let scan_id = ScanId::generate();
        let now = self.clock.epoch_ms();

        // Row first: the supervisor may only ever see scans that exist,
        // and workers never create control-plane rows.
        self.store.scan_create(&Scan {
            id: scan_id,
            name: name.clone(),
            target: target.clone(),
            target_type: kind.to_string(),
            status: ScanStatus::Running,
            created_ms: now,
            started_ms: Some(now),
            ended_ms: None,
        })?;

        let mut task = ScanTask {
            scan_id,
            scan_name: name,
            scan_target: target,
            target_type: kind.to_string(),
            module_list: modules.join(","),
            queue_type: queue,
            api_url: self.config.api_url.clone(),
            result_mode: ResultMode::Broker,
        };

        if let Some(broker) = &self.broker {
            if Broker::probe(broker.config()).await {
                match self.publish_task(broker, &task).await {
                    Ok(()) => {
                        tracing::info!(scan_id = %scan_id, queue = %queue, "scan dispatched to worker queue");
                        return Ok(SubmitOutcome { scan_id, route: DispatchRoute::Queued(queue) });
                    }
                    Err(e) => {
                        tracing::warn!(
                            scan_id = %scan_id,
                            error = %e,
                            "broker dispatch failed — falling back to local execution"
                        );
                    }
                }
            } else {
                tracing::warn!(scan_id = %scan_id, "broker unreachable — falling back to local execution");
            }
        }

        task.result_mode = ResultMode::Direct;
        self.spawn_local(task);
        Ok(SubmitOutcome { scan_id, route: DispatchRoute::Local })
    }

    /// Pre-declare the result queue, then publish the task message.
    async fn publish_task(&self, broker: &Arc<Broker>, task: &ScanTask) -> Result<(), BrokerError> {
        let channel = broker.create_channel().await?;
        topology::declare_result_queue(&channel, &task.scan_id).await?;
        topology::declare_task_queues(&channel).await?;

        let payload = serde_json::to_vec(task).unwrap_or_default();
        // Default exchange, routing key = queue name.
        broker.publish_persistent("", task.queue_type.queue_name(), &payload).await
    }

    /// Run the scan in-process: same task semantics as a worker, with
    /// results stored directly instead of published.
    fn spawn_local(&self, task: ScanTask) {
        let store = self.store.clone();
        let engine = self.engine.clone();
        let correlator = self.correlator.clone();
        let data_dir = self.config.data_dir.clone();
        let clock = self.clock.clone();
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            run_local_scan(store, engine, correlator, data_dir, clock, cancel, task).await;
        });
    }
}

async fn run_local_scan(
    store: Store,
    engine: Arc<dyn ScanEngine>,
    correlator: Arc<dyn Correlator>,
    data_dir: std::path::PathBuf,
    clock: SystemClock,
    cancel: CancellationToken,
    task: ScanTask,
) {
    let scan_id = task.scan_id;
    let sink = StoreSink::new(store.clone(), scan_id);

    let local = match TaskLocalStore::create_fresh(&data_dir, &scan_id, &task.scan_name, &task.scan_target)
    {
        Ok(local) => local,
        Err(e) => {
            tracing::error!(scan_id = %scan_id, error = %e, "local scan could not create task-local store");
            let _ = store.scan_set_status(&scan_id, ScanStatus::ErrorFailed, clock.epoch_ms());
            return;
        }
    };

    let bridge_cancel = cancel.child_token();
    let bridge_task = bridge::spawn(
        store.clone(),
        data_dir.clone(),
        scan_id,
        bridge::POLL_INTERVAL,
        bridge_cancel.clone(),
    );

    let outcome = engine.run(&task, &local, &sink).await;

    bridge_cancel.cancel();
    let _ = bridge_task.await;

    match outcome {
        Ok(()) => match local.status() {
            Ok(Some(ScanStatus::Finished)) => {
                // StoreSink already recorded FINISHED from the engine's
                // lifecycle emit; enrichment follows.
                correlator.run(&scan_id).await;
            }
            Ok(Some(ScanStatus::Aborted)) => {
                emit_terminal(&sink, &scan_id, Lifecycle::Aborted).await;
            }
            status => {
                tracing::error!(scan_id = %scan_id, ?status, "local scan ended without a terminal status");
                emit_terminal(&sink, &scan_id, Lifecycle::Failed).await;
            }
        },
        Err(e) => {
            tracing::error!(scan_id = %scan_id, error = %e, "local scan failed");
            emit_terminal(&sink, &scan_id, Lifecycle::Failed).await;
        }
    }

    if let Err(e) = local.remove() {
        tracing::warn!(scan_id = %scan_id, error = %e, "failed to remove task-local store");
    }
}

async fn emit_terminal(sink: &StoreSink, scan_id: &ScanId, lifecycle: Lifecycle) {
    if let Err(e) = sink.emit_lifecycle(lifecycle).await {
        tracing::error!(scan_id = %scan_id, %lifecycle, error = %e, "failed to record terminal status");
    }
}

/// Sanitize caller input: trim and neutralize angle brackets, preserving
/// `&` and quotes (quoted targets are meaningful).
fn clean_input(raw: &str) -> String {
    raw.trim().replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
