// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event sinks: where a running scan's output goes.
//!
//! Workers plug in a broker-publishing sink; the dispatcher's local
//! fallback plugs in [`StoreSink`], which writes straight into the shared
//! store with the same semantics the supervisor's consumer would apply.

use muninn_core::{Clock, Lifecycle, LogRecord, ScanEvent, ScanId, ScanStatus, SystemClock};
use muninn_storage::{Store, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("publish failed: {0}")]
    Publish(String),
}

/// Receiving end of a scan's output stream.
#[async_trait::async_trait]
pub trait EventSink: Send + Sync {
    async fn emit_event(&self, event: &ScanEvent) -> Result<(), SinkError>;
    async fn emit_log(&self, record: &LogRecord) -> Result<(), SinkError>;
    async fn emit_lifecycle(&self, lifecycle: Lifecycle) -> Result<(), SinkError>;
}

/// Direct-to-store sink for local fallback execution.
///
/// Event inserts are idempotent (`(scan_id, hash)`), and lifecycle
/// messages become status transitions — the same effects the supervisor's
/// consumer produces when results arrive over the broker.
pub struct StoreSink {
    store: Store,
    scan_id: ScanId,
    clock: SystemClock,
}

impl StoreSink {
    pub fn new(store: Store, scan_id: ScanId) -> Self {
        Self { store, scan_id, clock: SystemClock }
    }
}

#[async_trait::async_trait]
impl EventSink for StoreSink {
    async fn emit_event(&self, event: &ScanEvent) -> Result<(), SinkError> {
        self.store.event_store(&self.scan_id, event)?;
        Ok(())
    }

    async fn emit_log(&self, record: &LogRecord) -> Result<(), SinkError> {
        self.store.scan_log_append(&self.scan_id, record)?;
        Ok(())
    }

    async fn emit_lifecycle(&self, lifecycle: Lifecycle) -> Result<(), SinkError> {
        let status = match lifecycle {
            Lifecycle::Finished => ScanStatus::Finished,
            Lifecycle::Failed => ScanStatus::ErrorFailed,
            Lifecycle::Aborted => ScanStatus::Aborted,
        };
        self.store.scan_set_status(&self.scan_id, status, self.clock.epoch_ms())?;
        Ok(())
    }
}
