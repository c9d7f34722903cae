// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scan-log forwarding pipeline.
//!
//! Engine log records are queued onto a bounded channel and published to
//! the scan's routing key by a background task. Publishing is best-effort:
//! a broken connection degrades real-time log visibility, never the scan.
//! When the channel is saturated the newest record is dropped and counted
//! (head-drop), so a log-storming module cannot stall the engine.

use muninn_broker::{topology, Broker};
use muninn_core::{LogRecord, ResultMessage, ScanId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Buffered records before head-drop kicks in.
const BUFFER: usize = 1024;

pub struct LogForwarder {
    scan_id: ScanId,
    tx: mpsc::Sender<LogRecord>,
    dropped: Arc<AtomicU64>,
    handle: JoinHandle<()>,
}

impl LogForwarder {
    pub fn spawn(broker: Arc<Broker>, scan_id: ScanId) -> Self {
        let (tx, mut rx) = mpsc::channel::<LogRecord>(BUFFER);
        let dropped = Arc::new(AtomicU64::new(0));

        let handle = tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                let payload = ResultMessage::log(scan_id, record).encode();
                if let Err(e) = broker
                    .publish_persistent(topology::RESULT_EXCHANGE, scan_id.as_str(), &payload)
                    .await
                {
                    // The adapter already invalidated its channel; the
                    // next record retries on a fresh one. This record is
                    // gone.
                    tracing::warn!(scan_id = %scan_id, error = %e, "scan log publish failed");
                }
            }
        });

        Self { scan_id, tx, dropped, handle }
    }

    /// Queue a record. Never blocks the engine.
    pub fn push(&self, record: LogRecord) {
        if self.tx.try_send(record).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Close the channel, drain remaining records, report drops.
    pub async fn shutdown(self) {
        let Self { scan_id, tx, dropped, handle } = self;
        drop(tx);
        let _ = handle.await;
        let dropped = dropped.load(Ordering::Relaxed);
        if dropped > 0 {
            tracing::warn!(scan_id = %scan_id, dropped, "scan log records dropped under backpressure");
        }
    }

    /// Forwarder whose background task never drains, with a tiny buffer.
    /// The receiver is returned so the test controls consumption.
    #[cfg(test)]
    fn stalled_for_test(capacity: usize) -> (Self, mpsc::Receiver<LogRecord>) {
        let (tx, rx) = mpsc::channel::<LogRecord>(capacity);
        (
            Self {
                scan_id: ScanId::new("test"),
                tx,
                dropped: Arc::new(AtomicU64::new(0)),
                handle: tokio::spawn(async {}),
            },
            rx,
        )
    }
}

#[cfg(test)]
#[path = "forward_tests.rs"]
mod tests;
