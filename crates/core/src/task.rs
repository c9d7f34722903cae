// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scan task wire record and queue classification.

use crate::id::ScanId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Which physical task queue a scan is routed to.
///
/// Two queues isolate quick scans from resource-heavy ones so a port scan
/// never starves a DNS lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueType {
    Fast,
    Slow,
}

crate::simple_display! {
    QueueType {
        Fast => "fast",
        Slow => "slow",
    }
}

impl QueueType {
    /// Broker queue name for this type.
    pub fn queue_name(self) -> &'static str {
        match self {
            Self::Fast => "scans.fast",
            Self::Slow => "scans.slow",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "fast" => Some(Self::Fast),
            "slow" => Some(Self::Slow),
            _ => None,
        }
    }

    /// Classify a module list onto a queue: any module in the slow set
    /// routes the whole scan to `slow`; everything else (including an
    /// empty list) stays `fast`.
    pub fn classify<'a, I>(modules: I, slow_set: &BTreeSet<String>) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        if modules.into_iter().any(|m| slow_set.contains(m)) {
            Self::Slow
        } else {
            Self::Fast
        }
    }
}

/// How a worker delivers results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultMode {
    /// Publish every event/log/lifecycle to the result exchange.
    #[serde(rename = "rabbitmq")]
    Broker,
    /// Write straight into the shared store (local fallback execution).
    #[serde(rename = "direct")]
    Direct,
}

crate::simple_display! {
    ResultMode {
        Broker => "rabbitmq",
        Direct => "direct",
    }
}

/// Wire-level description of one scan to run.
///
/// Owned by the broker from publish until ack; at-least-once delivery is
/// assumed, so everything a worker does with a task must be idempotent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanTask {
    pub scan_id: ScanId,
    pub scan_name: String,
    pub scan_target: String,
    pub target_type: String,
    /// CSV of engine module identifiers; opaque to the pipeline.
    pub module_list: String,
    pub queue_type: QueueType,
    /// Base URL of the control-plane API (heartbeat target).
    pub api_url: String,
    pub result_mode: ResultMode,
}

impl ScanTask {
    /// Split the CSV module list into trimmed, non-empty entries.
    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.module_list.split(',').map(str::trim).filter(|m| !m.is_empty())
    }
}

/// Normalize a caller-supplied module list: trim, drop empties and storage
/// pseudo-modules, dedupe, sort. Storage is a sink the pipeline wires in
/// itself, never something a caller selects.
pub fn normalize_module_list(raw: &str) -> Vec<String> {
    let mut set: BTreeSet<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(|m| m.to_string())
        .collect();
    set.retain(|m| !m.starts_with("m__stor_"));
    set.into_iter().collect()
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
