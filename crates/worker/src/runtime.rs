// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker consumer loop.
//!
//! Subscribes to exactly one task queue with prefetch equal to the
//! configured concurrency, so the broker never hands us more unacked work
//! than we will actually run. Each delivery runs as its own task; ack/nack
//! happens after the scan settles, never before.

use crate::heartbeat::{self, HeartbeatConfig};
use crate::task_run::{self, TaskContext, TaskError};
use futures_util::StreamExt;
use lapin::options::{BasicAckOptions, BasicNackOptions};
use muninn_broker::{topology, Broker, BrokerError};
use muninn_core::{QueueType, ScanId, ScanTask, WorkerId};
use muninn_engine::ScanEngine;
use muninn_storage::{Store, StoreError};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct WorkerRuntimeConfig {
    pub worker_id: WorkerId,
    pub worker_name: String,
    pub host: String,
    pub queue: QueueType,
    pub concurrency: u16,
    pub api_url: String,
    pub data_dir: PathBuf,
}

pub struct WorkerRuntime {
    config: WorkerRuntimeConfig,
    broker: Arc<Broker>,
    shared_store: Store,
    engine: Arc<dyn ScanEngine>,
    cancel: CancellationToken,
}

impl WorkerRuntime {
    pub fn new(
        config: WorkerRuntimeConfig,
        broker: Arc<Broker>,
        shared_store: Store,
        engine: Arc<dyn ScanEngine>,
        cancel: CancellationToken,
    ) -> Self {
        Self { config, broker, shared_store, engine, cancel }
    }

    /// Consume until shutdown. `Err` here is an unrecoverable startup
    /// failure (exit code 1 territory); post-startup trouble is logged and
    /// ridden out.
    pub async fn run(&self) -> Result<(), WorkerError> {
        tracing::info!(
            worker = %self.config.worker_name,
            worker_id = %self.config.worker_id,
            queue = %self.config.queue,
            concurrency = self.config.concurrency,
            "worker starting"
        );

        self.broker.connect_with_retry().await?;

        // Everything published or consumed later is declared up front; the
        // result exchange must exist before the first sink publish.
        let declare_channel = self.broker.create_channel().await?;
        topology::declare_task_queues(&declare_channel).await?;
        topology::declare_result_exchange(&declare_channel).await?;

        let (current_scan_tx, current_scan_rx) = watch::channel::<Option<ScanId>>(None);
        let current_scan_tx = Arc::new(current_scan_tx);

        let heartbeat = heartbeat::spawn(
            HeartbeatConfig {
                api_url: self.config.api_url.clone(),
                worker_id: self.config.worker_id,
                name: self.config.worker_name.clone(),
                host: self.config.host.clone(),
                queue_type: self.config.queue,
                interval: heartbeat::INTERVAL,
            },
            current_scan_rx,
            self.cancel.clone(),
        );

        let (_channel, mut consumer) = self
            .broker
            .consume(
                self.config.queue.queue_name(),
                self.config.worker_id.as_str(),
                self.config.concurrency,
            )
            .await?;

        tracing::info!(queue = self.config.queue.queue_name(), "waiting for scan tasks");

        let ctx = Arc::new(TaskContext {
            broker: self.broker.clone(),
            shared_store: self.shared_store.clone(),
            data_dir: self.config.data_dir.clone(),
            engine: self.engine.clone(),
            abort_poll: muninn_engine::bridge::POLL_INTERVAL,
        });

        let mut running: JoinSet<()> = JoinSet::new();
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => break,
                delivery = consumer.next() => match delivery {
                    Some(Ok(delivery)) => {
                        let ctx = ctx.clone();
                        let current_scan = current_scan_tx.clone();
                        running.spawn(async move {
                            handle_delivery(&ctx, &current_scan, delivery).await;
                        });
                    }
                    Some(Err(e)) => {
                        tracing::error!(error = %e, "consumer stream error");
                        break;
                    }
                    None => {
                        tracing::warn!("consumer stream closed by broker");
                        break;
                    }
                },
            }
        }

        // Let in-flight scans settle before closing the connection; their
        // outputs are already durable either way.
        while running.join_next().await.is_some() {}
        let _ = heartbeat.await;
        self.broker.close().await;

        tracing::info!(worker = %self.config.worker_name, "worker stopped");
        Ok(())
    }
}

async fn handle_delivery(
    ctx: &TaskContext,
    current_scan: &watch::Sender<Option<ScanId>>,
    delivery: lapin::message::Delivery,
) {
    let task: ScanTask = match serde_json::from_slice(&delivery.data) {
        Ok(task) => task,
        Err(e) => {
            tracing::error!(error = %e, "invalid task message (not a task JSON)");
            nack_no_requeue(&delivery).await;
            return;
        }
    };

    tracing::info!(scan_id = %task.scan_id, target = %task.scan_target, "received scan task");

    // Single status slot, like the heartbeat: with concurrency > 1 the
    // registry sees whichever scan started last.
    current_scan.send_replace(Some(task.scan_id));
    let result = task_run::run_scan_task(ctx, &task).await;
    current_scan.send_replace(None);

    // Ack/nack outside the scan path so a channel error can't masquerade
    // as a scan result.
    match result {
        Ok(()) => {
            if let Err(e) = delivery.acker.ack(BasicAckOptions::default()).await {
                // The broker closed the channel while the scan ran. The
                // results are durable; the redelivery will dedup to
                // nothing. Do NOT nack.
                tracing::error!(
                    scan_id = %task.scan_id,
                    error = %e,
                    "scan completed but ack failed (broker closed channel?) — message will be redelivered"
                );
            } else {
                tracing::info!(scan_id = %task.scan_id, "scan finished — ack'd");
            }
        }
        Err(TaskError::Store(e)) => {
            tracing::error!(scan_id = %task.scan_id, error = %e, "task-local store failure");
            nack_no_requeue(&delivery).await;
        }
        Err(TaskError::Engine(e)) => {
            tracing::error!(scan_id = %task.scan_id, error = %e, "scan raised");
            nack_no_requeue(&delivery).await;
        }
    }
}

/// Nack without requeue: dead-letter if a DLX is configured, otherwise
/// dropped. Prevents infinite redelivery of broken tasks.
async fn nack_no_requeue(delivery: &lapin::message::Delivery) {
    if let Err(e) = delivery
        .acker
        .nack(BasicNackOptions { requeue: false, ..Default::default() })
        .await
    {
        tracing::error!(error = %e, "nack failed");
    }
}
