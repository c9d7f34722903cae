// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-scan result consumer.
//!
//! One task per active scan: declares the scan's result queue (identical
//! parameters to the dispatcher's pre-declaration), binds it, and consumes
//! with manual acks until a terminal lifecycle arrives or the monitor
//! stops it. The queue is deleted only after a received lifecycle on an
//! open channel — an early death leaves the queue intact so a replacement
//! consumer picks up pending messages, including a FINISHED published
//! after this task died.

use crate::correlation::Correlator;
use futures_util::StreamExt;
use lapin::options::{BasicAckOptions, BasicNackOptions};
use muninn_broker::{topology, Broker};
use muninn_core::{Clock, Lifecycle, ResultMessage, ResultPayload, ScanId, ScanStatus};
use muninn_storage::Store;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// State a consumer task shares with the monitor loop.
pub struct ConsumerShared {
    last_message_ms: AtomicU64,
    lifecycle_received: AtomicBool,
}

impl ConsumerShared {
    pub fn new(now_ms: u64) -> Self {
        Self { last_message_ms: AtomicU64::new(now_ms), lifecycle_received: AtomicBool::new(false) }
    }

    /// Record a delivery; feeds the monitor's watchdog.
    pub fn touch(&self, now_ms: u64) {
        self.last_message_ms.store(now_ms, Ordering::Relaxed);
    }

    pub fn last_message_ms(&self) -> u64 {
        self.last_message_ms.load(Ordering::Relaxed)
    }

    pub fn mark_lifecycle(&self) {
        self.lifecycle_received.store(true, Ordering::Relaxed);
    }

    pub fn lifecycle_received(&self) -> bool {
        self.lifecycle_received.load(Ordering::Relaxed)
    }
}

/// What the monitor holds for one tracked consumer.
pub struct ConsumerHandle {
    pub scan_id: ScanId,
    pub stop: CancellationToken,
    pub join: JoinHandle<()>,
    pub shared: Arc<ConsumerShared>,
}

/// Ack decision for one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Ack,
    /// Transient trouble (store busy, unexpected store error): give the
    /// broker another go at it.
    NackRequeue,
    /// Poison pill: malformed, misrouted, or invalid. Never requeue.
    NackDrop,
}

/// Result of applying one delivery body.
pub struct Applied {
    pub disposition: Disposition,
    /// Present when the message was a terminal lifecycle.
    pub terminal: Option<Lifecycle>,
}

impl Applied {
    fn ack() -> Self {
        Self { disposition: Disposition::Ack, terminal: None }
    }

    fn drop_poison() -> Self {
        Self { disposition: Disposition::NackDrop, terminal: None }
    }

    fn requeue() -> Self {
        Self { disposition: Disposition::NackRequeue, terminal: None }
    }
}

/// Apply one raw delivery against the store: persist logs and events
/// (idempotently), surface lifecycles to the caller. No status writes
/// happen here — terminal handling owns the correlation-then-status
/// ordering.
pub fn apply_message(store: &Store, scan_id: &ScanId, body: &[u8]) -> Applied {
    let (msg_scan_id, payload) = match ResultMessage::decode(body) {
        Ok(decoded) => decoded,
        Err(e) => {
            tracing::error!(scan_id = %scan_id, error = %e, "malformed result message");
            return Applied::drop_poison();
        }
    };

    if msg_scan_id != *scan_id {
        tracing::warn!(
            scan_id = %scan_id,
            message_scan_id = %msg_scan_id,
            "result message routed to the wrong scan queue"
        );
        return Applied::drop_poison();
    }

    match payload {
        ResultPayload::Log(record) => match store.scan_log_append(scan_id, &record) {
            Ok(()) => Applied::ack(),
            Err(e) => {
                log_store_error(scan_id, &e, "failed to persist scan log");
                Applied::requeue()
            }
        },
        ResultPayload::Event(event) => {
            if let Err(e) = event.validate() {
                tracing::error!(scan_id = %scan_id, error = %e, "rejecting invalid event");
                return Applied::drop_poison();
            }
            match store.event_store(scan_id, &event) {
                Ok(true) => Applied::ack(),
                Ok(false) => {
                    tracing::debug!(scan_id = %scan_id, hash = %event.hash, "duplicate event skipped");
                    Applied::ack()
                }
                Err(e) => {
                    log_store_error(scan_id, &e, "failed to persist event");
                    Applied::requeue()
                }
            }
        }
        ResultPayload::Lifecycle(lifecycle) => {
            Applied { disposition: Disposition::Ack, terminal: Some(lifecycle) }
        }
    }
}

/// Both transient and hard store errors requeue the delivery; the
/// distinction only changes how loudly we say it. A persistent hard error
/// cycles the message rather than dropping a valid result.
fn log_store_error(scan_id: &ScanId, e: &muninn_storage::StoreError, what: &str) {
    if e.is_transient() {
        tracing::warn!(scan_id = %scan_id, error = %e, "{what} (store busy); requeueing");
    } else {
        tracing::error!(scan_id = %scan_id, error = %e, "{what}; requeueing");
    }
}

/// Settle a terminal lifecycle: for FINISHED, correlations run before the
/// status flips (the scan is only queryable as finished once enrichment
/// had its chance).
pub async fn handle_terminal(
    store: &Store,
    correlator: &dyn Correlator,
    scan_id: &ScanId,
    lifecycle: Lifecycle,
    now_ms: u64,
) {
    tracing::info!(scan_id = %scan_id, %lifecycle, "received terminal lifecycle");
    let status = match lifecycle {
        Lifecycle::Finished => {
            correlator.run(scan_id).await;
            ScanStatus::Finished
        }
        Lifecycle::Failed => ScanStatus::ErrorFailed,
        Lifecycle::Aborted => ScanStatus::Aborted,
    };
    if let Err(e) = store.scan_set_status(scan_id, status, now_ms) {
        tracing::warn!(scan_id = %scan_id, %status, error = %e, "terminal status write failed");
    }
}

/// Spawn the consumer task for one scan.
pub fn spawn<C: Clock>(
    broker: Arc<Broker>,
    store: Store,
    correlator: Arc<dyn Correlator>,
    clock: C,
    scan_id: ScanId,
) -> ConsumerHandle {
    let stop = CancellationToken::new();
    let shared = Arc::new(ConsumerShared::new(clock.epoch_ms()));
    let join = tokio::spawn(run(
        broker,
        store,
        correlator,
        clock,
        scan_id,
        shared.clone(),
        stop.clone(),
    ));
    ConsumerHandle { scan_id, stop, join, shared }
}

async fn run<C: Clock>(
    broker: Arc<Broker>,
    store: Store,
    correlator: Arc<dyn Correlator>,
    clock: C,
    scan_id: ScanId,
    shared: Arc<ConsumerShared>,
    stop: CancellationToken,
) {
    let channel = match broker.create_channel().await {
        Ok(channel) => channel,
        Err(e) => {
            tracing::warn!(scan_id = %scan_id, error = %e, "consumer could not open a channel");
            return;
        }
    };
    let queue = match topology::declare_result_queue(&channel, &scan_id).await {
        Ok(queue) => queue,
        Err(e) => {
            tracing::warn!(scan_id = %scan_id, error = %e, "consumer could not declare result queue");
            return;
        }
    };

    let consumer_tag = format!("supervisor-{}", scan_id.short(12));
    let mut consumer = match channel
        .basic_consume(
            &queue,
            &consumer_tag,
            lapin::options::BasicConsumeOptions::default(),
            lapin::types::FieldTable::default(),
        )
        .await
    {
        Ok(consumer) => consumer,
        Err(e) => {
            tracing::warn!(scan_id = %scan_id, error = %e, "consumer could not start consuming");
            return;
        }
    };

    tracing::info!(scan_id = %scan_id, queue, "result consumer bound");

    loop {
        tokio::select! {
            () = stop.cancelled() => break,
            delivery = consumer.next() => {
                let delivery = match delivery {
                    Some(Ok(delivery)) => delivery,
                    Some(Err(e)) => {
                        tracing::error!(scan_id = %scan_id, error = %e, "consumer stream error");
                        break;
                    }
                    None => break,
                };

                shared.touch(clock.epoch_ms());
                let applied = apply_message(&store, &scan_id, &delivery.data);

                if let Some(lifecycle) = applied.terminal {
                    shared.mark_lifecycle();
                    handle_terminal(&store, correlator.as_ref(), &scan_id, lifecycle, clock.epoch_ms()).await;
                }

                let ack_result = match applied.disposition {
                    Disposition::Ack => delivery.acker.ack(BasicAckOptions::default()).await,
                    Disposition::NackRequeue => {
                        delivery.acker.nack(BasicNackOptions { requeue: true, ..Default::default() }).await
                    }
                    Disposition::NackDrop => {
                        delivery.acker.nack(BasicNackOptions { requeue: false, ..Default::default() }).await
                    }
                };
                if let Err(e) = ack_result {
                    tracing::error!(scan_id = %scan_id, error = %e, "ack/nack failed");
                    break;
                }

                if applied.terminal.is_some() {
                    break;
                }
            }
        }
    }

    // Queue teardown: only after a received lifecycle on a live channel.
    if shared.lifecycle_received() && channel.status().connected() {
        if let Err(e) = topology::delete_result_queue(&channel, &scan_id).await {
            tracing::warn!(scan_id = %scan_id, error = %e, "result queue delete failed");
        }
    }
    tracing::info!(scan_id = %scan_id, "result consumer stopped");
}

#[cfg(test)]
#[path = "consumer_tests.rs"]
mod tests;
