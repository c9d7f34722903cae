// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broker-publishing event sink.
//!
//! Every emitted event becomes a persistent JSON message on the result
//! exchange, routed by scan ID. Publish failures invalidate the cached
//! channel (the adapter reconnects lazily on the next emit) and are
//! otherwise swallowed: a lost connection degrades real-time visibility
//! but must never abort the scan.

use crate::forward::LogForwarder;
use muninn_broker::{topology, Broker};
use muninn_core::{Lifecycle, LogRecord, ResultMessage, ScanEvent, ScanId};
use muninn_engine::{EventSink, SinkError};
use std::sync::Arc;

pub struct BrokerSink {
    broker: Arc<Broker>,
    scan_id: ScanId,
    forwarder: LogForwarder,
}

impl BrokerSink {
    pub fn new(broker: Arc<Broker>, scan_id: ScanId) -> Self {
        let forwarder = LogForwarder::spawn(broker.clone(), scan_id);
        Self { broker, scan_id, forwarder }
    }

    async fn publish(&self, message: ResultMessage) {
        let payload = message.encode();
        if let Err(e) = self
            .broker
            .publish_persistent(topology::RESULT_EXCHANGE, self.scan_id.as_str(), &payload)
            .await
        {
            tracing::warn!(scan_id = %self.scan_id, error = %e, "result publish failed");
        }
    }

    /// Flush the log-forwarding pipeline.
    pub async fn shutdown(self) {
        self.forwarder.shutdown().await;
    }
}

#[async_trait::async_trait]
impl EventSink for BrokerSink {
    async fn emit_event(&self, event: &ScanEvent) -> Result<(), SinkError> {
        self.publish(ResultMessage::event(self.scan_id, event.clone())).await;
        Ok(())
    }

    async fn emit_log(&self, record: &LogRecord) -> Result<(), SinkError> {
        self.forwarder.push(record.clone());
        Ok(())
    }

    async fn emit_lifecycle(&self, lifecycle: Lifecycle) -> Result<(), SinkError> {
        self.publish(ResultMessage::lifecycle(self.scan_id, lifecycle)).await;
        Ok(())
    }
}
