// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::{Lifecycle, LogRecord, QueueType, ResultMessage, ResultMode, ScanEvent, ScanId, ScanTask};

// ── Proptest strategies ─────────────────────────────────────────────────

/// Proptest strategies for core state machine types.
pub mod strategies {
    use crate::scan::ScanStatus;
    use proptest::prelude::*;

    pub fn arb_scan_status() -> impl Strategy<Value = ScanStatus> {
        prop_oneof![
            Just(ScanStatus::Created),
            Just(ScanStatus::Running),
            Just(ScanStatus::AbortRequested),
            Just(ScanStatus::Aborted),
            Just(ScanStatus::Finished),
            Just(ScanStatus::ErrorFailed),
        ]
    }
}

// ── Fixture factories ───────────────────────────────────────────────────

/// A fast-queue task against `example.com` with two benign modules.
pub fn task(scan_id: &str) -> ScanTask {
    ScanTask {
        scan_id: ScanId::new(scan_id),
        scan_name: "spec scan".to_string(),
        scan_target: "example.com".to_string(),
        target_type: "INTERNET_NAME".to_string(),
        module_list: "m_dns,m_whois".to_string(),
        queue_type: QueueType::Fast,
        api_url: "http://localhost:5001".to_string(),
        result_mode: ResultMode::Broker,
    }
}

/// An event with a distinct payload per `n`, so hashes differ.
pub fn event(n: u32) -> ScanEvent {
    ScanEvent::new("INTERNET_NAME", format!("host{n}.example.com"), "m_dns", crate::ROOT_SOURCE, 1000.0 + n as f64)
}

pub fn event_message(scan_id: &str, n: u32) -> ResultMessage {
    ResultMessage::event(ScanId::new(scan_id), event(n))
}

pub fn lifecycle_message(scan_id: &str, lifecycle: Lifecycle) -> ResultMessage {
    ResultMessage::lifecycle(ScanId::new(scan_id), lifecycle)
}

pub fn log_message(scan_id: &str, message: &str) -> ResultMessage {
    ResultMessage::log(
        ScanId::new(scan_id),
        LogRecord {
            level: "INFO".to_string(),
            message: message.to_string(),
            component: "m_dns".to_string(),
            time: 1000.0,
        },
    )
}
