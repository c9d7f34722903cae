// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use muninn_core::test_support;
use muninn_core::{QueueType, Scan, ScanStatus, WorkerStatus};

fn store() -> Store {
    Store::open_in_memory().unwrap()
}

fn scan(id: &str) -> Scan {
    Scan {
        id: ScanId::new(id),
        name: "spec scan".into(),
        target: "example.com".into(),
        target_type: "INTERNET_NAME".into(),
        status: ScanStatus::Running,
        created_ms: 1_000,
        started_ms: Some(1_000),
        ended_ms: None,
    }
}

fn heartbeat(id: &str, status: WorkerStatus) -> Heartbeat {
    Heartbeat {
        worker_id: WorkerId::new(id),
        name: "w".into(),
        host: "h".into(),
        queue_type: QueueType::Fast,
        status,
        current_scan: String::new(),
    }
}

// ── Scans ───────────────────────────────────────────────────────────────

#[test]
fn scan_create_then_get() {
    let store = store();
    store.scan_create(&scan("a1")).unwrap();
    let got = store.scan_get(&ScanId::new("a1")).unwrap().unwrap();
    assert_eq!(got, scan("a1"));
}

#[test]
fn scan_create_twice_is_an_error() {
    let store = store();
    store.scan_create(&scan("a1")).unwrap();
    assert!(matches!(store.scan_create(&scan("a1")), Err(StoreError::ScanExists { .. })));
}

#[test]
fn status_transition_stamps_ended() {
    let store = store();
    store.scan_create(&scan("a1")).unwrap();
    store.scan_set_status(&ScanId::new("a1"), ScanStatus::Finished, 9_000).unwrap();
    let got = store.scan_get(&ScanId::new("a1")).unwrap().unwrap();
    assert_eq!(got.status, ScanStatus::Finished);
    assert_eq!(got.ended_ms, Some(9_000));
}

#[test]
fn status_transition_rejects_backwards() {
    let store = store();
    store.scan_create(&scan("a1")).unwrap();
    store.scan_set_status(&ScanId::new("a1"), ScanStatus::Aborted, 2_000).unwrap();
    let err = store.scan_set_status(&ScanId::new("a1"), ScanStatus::Running, 3_000);
    assert!(matches!(err, Err(StoreError::InvalidTransition { .. })));
}

#[test]
fn status_transition_same_state_is_noop() {
    let store = store();
    store.scan_create(&scan("a1")).unwrap();
    store.scan_set_status(&ScanId::new("a1"), ScanStatus::Running, 2_000).unwrap();
}

#[test]
fn status_transition_unknown_scan() {
    let store = store();
    let err = store.scan_set_status(&ScanId::new("nope"), ScanStatus::Finished, 1_000);
    assert!(matches!(err, Err(StoreError::ScanNotFound(_))));
}

#[test]
fn abort_requested_then_finished_is_benign() {
    let store = store();
    store.scan_create(&scan("a1")).unwrap();
    store.scan_set_status(&ScanId::new("a1"), ScanStatus::AbortRequested, 2_000).unwrap();
    store.scan_set_status(&ScanId::new("a1"), ScanStatus::Finished, 3_000).unwrap();
    let got = store.scan_get(&ScanId::new("a1")).unwrap().unwrap();
    assert_eq!(got.status, ScanStatus::Finished);
}

#[test]
fn scans_with_status_finds_active() {
    let store = store();
    store.scan_create(&scan("a1")).unwrap();
    store.scan_create(&scan("a2")).unwrap();
    store.scan_create(&scan("a3")).unwrap();
    store.scan_set_status(&ScanId::new("a2"), ScanStatus::AbortRequested, 2_000).unwrap();
    store.scan_set_status(&ScanId::new("a3"), ScanStatus::Finished, 2_000).unwrap();

    let active = store
        .scans_with_status(&[ScanStatus::Running, ScanStatus::AbortRequested])
        .unwrap();
    let ids: Vec<&str> = active.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["a1", "a2"]);
}

#[test]
fn scan_delete_removes_children() {
    let store = store();
    store.scan_create(&scan("a1")).unwrap();
    store.event_store(&ScanId::new("a1"), &test_support::event(1)).unwrap();
    store
        .scan_log_append(
            &ScanId::new("a1"),
            &muninn_core::LogRecord {
                level: "INFO".into(),
                message: "m".into(),
                component: "c".into(),
                time: 1.0,
            },
        )
        .unwrap();

    store.scan_delete(&ScanId::new("a1")).unwrap();
    assert!(store.scan_get(&ScanId::new("a1")).unwrap().is_none());
    assert_eq!(store.event_count(&ScanId::new("a1")).unwrap(), 0);
    assert!(store.scan_logs(&ScanId::new("a1")).unwrap().is_empty());
}

// ── Results ─────────────────────────────────────────────────────────────

#[test]
fn event_store_is_idempotent() {
    let store = store();
    store.scan_create(&scan("a1")).unwrap();
    let event = test_support::event(1);

    assert!(store.event_store(&ScanId::new("a1"), &event).unwrap());
    // Redeliveries of the same content are no-ops.
    assert!(!store.event_store(&ScanId::new("a1"), &event).unwrap());
    assert!(!store.event_store(&ScanId::new("a1"), &event).unwrap());
    assert_eq!(store.event_count(&ScanId::new("a1")).unwrap(), 1);
}

#[test]
fn same_hash_different_scan_both_persist() {
    let store = store();
    let event = test_support::event(1);
    assert!(store.event_store(&ScanId::new("a1"), &event).unwrap());
    assert!(store.event_store(&ScanId::new("a2"), &event).unwrap());
}

#[test]
fn events_roundtrip() {
    let store = store();
    let id = ScanId::new("a1");
    for n in 0..3 {
        store.event_store(&id, &test_support::event(n)).unwrap();
    }
    let events = store.events(&id).unwrap();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0], test_support::event(0));
}

// ── Scan logs ───────────────────────────────────────────────────────────

#[test]
fn scan_logs_keep_insertion_order() {
    let store = store();
    let id = ScanId::new("a1");
    for n in 0..3 {
        store
            .scan_log_append(
                &id,
                &muninn_core::LogRecord {
                    level: "INFO".into(),
                    message: format!("line {n}"),
                    component: "m_dns".into(),
                    time: n as f64,
                },
            )
            .unwrap();
    }
    let logs = store.scan_logs(&id).unwrap();
    assert_eq!(logs.len(), 3);
    assert_eq!(logs[2].message, "line 2");
}

// ── Worker registry ─────────────────────────────────────────────────────

#[test]
fn worker_upsert_registers_then_refreshes() {
    let store = store();
    let id = WorkerId::new("w-1");
    store.worker_upsert(&heartbeat("w-1", WorkerStatus::Idle), 1_000).unwrap();
    let first = store.worker_get(&id).unwrap().unwrap();
    assert_eq!(first.registered_ms, 1_000);

    store.worker_upsert(&heartbeat("w-1", WorkerStatus::Busy), 5_000).unwrap();
    let second = store.worker_get(&id).unwrap().unwrap();
    assert_eq!(second.status, WorkerStatus::Busy);
    assert_eq!(second.last_seen_ms, 5_000);
    // Registration time survives upserts.
    assert_eq!(second.registered_ms, 1_000);
}

#[test]
fn sweep_marks_stale_then_deletes() {
    let store = store();
    store.worker_upsert(&heartbeat("w-1", WorkerStatus::Idle), 1_000).unwrap();
    store.worker_upsert(&heartbeat("w-2", WorkerStatus::Idle), 100_000).unwrap();

    // w-1 is 99s stale at t=100_000 with a 60s threshold.
    let changed = store.workers_mark_stale_offline(100_000, 60_000).unwrap();
    assert_eq!(changed, 1);
    assert_eq!(store.worker_get(&WorkerId::new("w-1")).unwrap().unwrap().status, WorkerStatus::Offline);
    assert_eq!(store.worker_get(&WorkerId::new("w-2")).unwrap().unwrap().status, WorkerStatus::Idle);

    // Not yet past the cleanup timeout: nothing deleted.
    assert_eq!(store.workers_delete_offline(100_000, 300_000).unwrap(), 0);
    // Well past it: the offline row goes away.
    assert_eq!(store.workers_delete_offline(400_000, 300_000).unwrap(), 1);
    assert!(store.worker_get(&WorkerId::new("w-1")).unwrap().is_none());
    assert!(store.worker_get(&WorkerId::new("w-2")).unwrap().is_some());
}

#[test]
fn sweep_boundary_is_strict() {
    let store = store();
    store.worker_upsert(&heartbeat("w-1", WorkerStatus::Idle), 40_000).unwrap();
    // Exactly 60s old: not yet stale.
    assert_eq!(store.workers_mark_stale_offline(100_000, 60_000).unwrap(), 0);
    // One ms past: stale.
    assert_eq!(store.workers_mark_stale_offline(100_001, 60_000).unwrap(), 1);
}
