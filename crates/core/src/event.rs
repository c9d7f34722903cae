// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scan events: the typed observations a scan emits.
//!
//! The content hash is the sole uniqueness key — stable across broker
//! redeliveries, so `(scan_id, hash)` identifies a result row exactly once
//! no matter how many times the message arrives.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Source-hash sentinel for seed events (the scan target itself).
pub const ROOT_SOURCE: &str = "ROOT";

/// Inclusive upper bound for confidence/visibility/risk.
pub const METRIC_MAX: u8 = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventError {
    #[error("{field} {value} out of range 0..={METRIC_MAX}")]
    MetricOutOfRange { field: &'static str, value: i64 },

    #[error("event hash is empty")]
    EmptyHash,

    #[error("event type is empty")]
    EmptyType,
}

/// One observation emitted by a scan module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanEvent {
    /// Content hash, computed once by the engine.
    pub hash: String,
    #[serde(rename = "type")]
    pub event_type: String,
    /// Seconds since the epoch, as a float.
    pub generated: f64,
    pub confidence: u8,
    pub visibility: u8,
    pub risk: u8,
    /// Module that produced the observation.
    pub module: String,
    /// Observation payload; opaque to the pipeline.
    pub data: String,
    /// Hash of the event this one was derived from, or [`ROOT_SOURCE`].
    pub source_event_hash: String,
}

impl ScanEvent {
    /// Build an event, computing its content hash.
    pub fn new(
        event_type: impl Into<String>,
        data: impl Into<String>,
        module: impl Into<String>,
        source_event_hash: impl Into<String>,
        generated: f64,
    ) -> Self {
        let event_type = event_type.into();
        let data = data.into();
        let module = module.into();
        let hash = content_hash(&event_type, &data, &module, generated);
        Self {
            hash,
            event_type,
            generated,
            confidence: 100,
            visibility: 100,
            risk: 0,
            module,
            data,
            source_event_hash: source_event_hash.into(),
        }
    }

    /// Seed event for a scan target. Modules derive everything else from it.
    pub fn seed(target_type: impl Into<String>, target: impl Into<String>, generated: f64) -> Self {
        Self::new(target_type, target, "muninn", ROOT_SOURCE, generated)
    }

    pub fn is_seed(&self) -> bool {
        self.source_event_hash == ROOT_SOURCE
    }

    /// Validate the invariants the ingestion path enforces: metrics in
    /// bounds, hash and type present.
    pub fn validate(&self) -> Result<(), EventError> {
        if self.hash.is_empty() {
            return Err(EventError::EmptyHash);
        }
        if self.event_type.is_empty() {
            return Err(EventError::EmptyType);
        }
        for (field, value) in [
            ("confidence", self.confidence),
            ("visibility", self.visibility),
            ("risk", self.risk),
        ] {
            if value > METRIC_MAX {
                return Err(EventError::MetricOutOfRange { field, value: value as i64 });
            }
        }
        Ok(())
    }
}

/// Deterministic content hash over the fields that define an observation.
///
/// `generated` participates so the same datum re-observed later is a new
/// event, while a redelivered message hashes identically.
fn content_hash(event_type: &str, data: &str, module: &str, generated: f64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(event_type.as_bytes());
    hasher.update([0]);
    hasher.update(data.as_bytes());
    hasher.update([0]);
    hasher.update(module.as_bytes());
    hasher.update([0]);
    hasher.update(generated.to_bits().to_be_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
