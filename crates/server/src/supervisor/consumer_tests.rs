// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use muninn_core::test_support;
use muninn_core::Scan;
use std::sync::atomic::AtomicU32;

struct CountingCorrelator(AtomicU32);

#[async_trait::async_trait]
impl Correlator for CountingCorrelator {
    async fn run(&self, _scan_id: &ScanId) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

fn store_with_scan(id: &str) -> Store {
    let store = Store::open_in_memory().unwrap();
    store
        .scan_create(&Scan {
            id: ScanId::new(id),
            name: "s".into(),
            target: "example.com".into(),
            target_type: "INTERNET_NAME".into(),
            status: ScanStatus::Running,
            created_ms: 1,
            started_ms: Some(1),
            ended_ms: None,
        })
        .unwrap();
    store
}

// ── apply_message ───────────────────────────────────────────────────────

#[test]
fn event_message_persists_and_acks() {
    let store = store_with_scan("aa");
    let body = test_support::event_message("aa", 1).encode();

    let applied = apply_message(&store, &ScanId::new("aa"), &body);
    assert_eq!(applied.disposition, Disposition::Ack);
    assert!(applied.terminal.is_none());
    assert_eq!(store.event_count(&ScanId::new("aa")).unwrap(), 1);
}

#[test]
fn duplicate_event_still_acks_once_stored() {
    let store = store_with_scan("aa");
    let body = test_support::event_message("aa", 1).encode();

    apply_message(&store, &ScanId::new("aa"), &body);
    let applied = apply_message(&store, &ScanId::new("aa"), &body);
    assert_eq!(applied.disposition, Disposition::Ack);
    assert_eq!(store.event_count(&ScanId::new("aa")).unwrap(), 1);
}

#[test]
fn log_message_persists_and_acks() {
    let store = store_with_scan("aa");
    let body = test_support::log_message("aa", "resolving names").encode();

    let applied = apply_message(&store, &ScanId::new("aa"), &body);
    assert_eq!(applied.disposition, Disposition::Ack);
    let logs = store.scan_logs(&ScanId::new("aa")).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].message, "resolving names");
}

#[test]
fn malformed_json_is_poison() {
    let store = store_with_scan("aa");
    let applied = apply_message(&store, &ScanId::new("aa"), b"{nope");
    assert_eq!(applied.disposition, Disposition::NackDrop);
}

#[test]
fn misrouted_message_is_poison() {
    let store = store_with_scan("aa");
    let body = test_support::event_message("other", 1).encode();
    let applied = apply_message(&store, &ScanId::new("aa"), &body);
    assert_eq!(applied.disposition, Disposition::NackDrop);
    assert_eq!(store.event_count(&ScanId::new("aa")).unwrap(), 0);
}

#[test]
fn out_of_range_metric_is_rejected_at_ingestion() {
    let store = store_with_scan("aa");
    let mut msg = test_support::event_message("aa", 1);
    if let Some(event) = msg.event.as_mut() {
        event.risk = 180;
    }
    let applied = apply_message(&store, &ScanId::new("aa"), &msg.encode());
    assert_eq!(applied.disposition, Disposition::NackDrop);
    assert_eq!(store.event_count(&ScanId::new("aa")).unwrap(), 0);
}

#[test]
fn lifecycle_surfaces_terminal_without_status_write() {
    let store = store_with_scan("aa");
    let body = test_support::lifecycle_message("aa", Lifecycle::Finished).encode();

    let applied = apply_message(&store, &ScanId::new("aa"), &body);
    assert_eq!(applied.disposition, Disposition::Ack);
    assert_eq!(applied.terminal, Some(Lifecycle::Finished));
    // Status still RUNNING: handle_terminal owns the write.
    let scan = store.scan_get(&ScanId::new("aa")).unwrap().unwrap();
    assert_eq!(scan.status, ScanStatus::Running);
}

// ── handle_terminal ─────────────────────────────────────────────────────

#[tokio::test]
async fn finished_runs_correlations_then_sets_status() {
    let store = store_with_scan("aa");
    let correlator = CountingCorrelator(AtomicU32::new(0));

    handle_terminal(&store, &correlator, &ScanId::new("aa"), Lifecycle::Finished, 9_000).await;

    assert_eq!(correlator.0.load(Ordering::SeqCst), 1);
    let scan = store.scan_get(&ScanId::new("aa")).unwrap().unwrap();
    assert_eq!(scan.status, ScanStatus::Finished);
    assert_eq!(scan.ended_ms, Some(9_000));
}

#[tokio::test]
async fn failed_and_aborted_skip_correlations() {
    let correlator = CountingCorrelator(AtomicU32::new(0));

    let store = store_with_scan("aa");
    handle_terminal(&store, &correlator, &ScanId::new("aa"), Lifecycle::Failed, 2_000).await;
    assert_eq!(store.scan_get(&ScanId::new("aa")).unwrap().unwrap().status, ScanStatus::ErrorFailed);

    let store = store_with_scan("bb");
    handle_terminal(&store, &correlator, &ScanId::new("bb"), Lifecycle::Aborted, 2_000).await;
    assert_eq!(store.scan_get(&ScanId::new("bb")).unwrap().unwrap().status, ScanStatus::Aborted);

    assert_eq!(correlator.0.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn benign_race_finished_after_abort_request() {
    let store = store_with_scan("aa");
    store.scan_set_status(&ScanId::new("aa"), ScanStatus::AbortRequested, 1_500).unwrap();
    let correlator = CountingCorrelator(AtomicU32::new(0));

    handle_terminal(&store, &correlator, &ScanId::new("aa"), Lifecycle::Finished, 2_000).await;
    assert_eq!(store.scan_get(&ScanId::new("aa")).unwrap().unwrap().status, ScanStatus::Finished);
}

// ── ConsumerShared ──────────────────────────────────────────────────────

#[test]
fn shared_tracks_last_message_and_lifecycle() {
    let shared = ConsumerShared::new(1_000);
    assert_eq!(shared.last_message_ms(), 1_000);
    assert!(!shared.lifecycle_received());

    shared.touch(2_500);
    shared.mark_lifecycle();
    assert_eq!(shared.last_message_ms(), 2_500);
    assert!(shared.lifecycle_received());
}
