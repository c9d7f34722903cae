// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Result message schema for the `scan.results` exchange.
//!
//! One envelope, three payload kinds: exactly one of `event`, `lifecycle`,
//! `log` is non-null. Decoding validates that shape up front so the
//! consumer can match exhaustively on [`ResultPayload`].

use crate::event::ScanEvent;
use crate::id::ScanId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Terminal lifecycle transition published by a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lifecycle {
    #[serde(rename = "FINISHED")]
    Finished,
    #[serde(rename = "FAILED")]
    Failed,
    #[serde(rename = "ABORTED")]
    Aborted,
}

crate::simple_display! {
    Lifecycle {
        Finished => "FINISHED",
        Failed => "FAILED",
        Aborted => "ABORTED",
    }
}

/// Per-scan structured log line forwarded from a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub level: String,
    pub message: String,
    pub component: String,
    /// Seconds since the epoch, as a float.
    pub time: f64,
}

/// Wire envelope: `{ scan_id, event | lifecycle | log }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMessage {
    pub scan_id: ScanId,
    pub event: Option<ScanEvent>,
    pub lifecycle: Option<Lifecycle>,
    pub log: Option<LogRecord>,
}

/// Decoded payload of a [`ResultMessage`], exactly one kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultPayload {
    Event(ScanEvent),
    Lifecycle(Lifecycle),
    Log(LogRecord),
}

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("invalid result message JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("result message carries no payload")]
    Empty,

    #[error("result message carries more than one payload kind")]
    Ambiguous,
}

impl ResultMessage {
    pub fn event(scan_id: ScanId, event: ScanEvent) -> Self {
        Self { scan_id, event: Some(event), lifecycle: None, log: None }
    }

    pub fn lifecycle(scan_id: ScanId, lifecycle: Lifecycle) -> Self {
        Self { scan_id, event: None, lifecycle: Some(lifecycle), log: None }
    }

    pub fn log(scan_id: ScanId, log: LogRecord) -> Self {
        Self { scan_id, event: None, lifecycle: None, log: Some(log) }
    }

    /// Serialize for publishing. Infallible in practice; a serializer error
    /// here means a bug in the type definitions, surfaced as empty payload.
    pub fn encode(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Decode and validate the exactly-one-payload shape.
    pub fn decode(bytes: &[u8]) -> Result<(ScanId, ResultPayload), MessageError> {
        let msg: ResultMessage = serde_json::from_slice(bytes)?;
        let ResultMessage { scan_id, event, lifecycle, log } = msg;
        let payload = match (event, lifecycle, log) {
            (Some(e), None, None) => ResultPayload::Event(e),
            (None, Some(l), None) => ResultPayload::Lifecycle(l),
            (None, None, Some(l)) => ResultPayload::Log(l),
            (None, None, None) => return Err(MessageError::Empty),
            _ => return Err(MessageError::Ambiguous),
        };
        Ok((scan_id, payload))
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
