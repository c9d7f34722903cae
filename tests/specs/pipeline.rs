// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broker-down pipeline specs: the dispatcher falls back to in-process
//! execution and the full scan lifecycle settles against the store.

use crate::prelude::*;
use muninn_core::{ScanStatus, ScanTask};
use muninn_engine::fake::{ScriptedEngine, Step};
use muninn_server::{Dispatcher, DispatchRoute, ScanRequest};
use muninn_storage::{Store, TaskLocalStore};
use similar_asserts::assert_eq;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

struct Pipeline {
    _dir: tempfile::TempDir,
    store: Store,
    dispatcher: Dispatcher,
    correlator: Arc<RecordingCorrelator>,
    data_dir: std::path::PathBuf,
}

fn pipeline(engine: ScriptedEngine) -> Pipeline {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(&dir.path().join("muninn.db")).unwrap();
    let correlator = Arc::new(RecordingCorrelator::default());
    let dispatcher = Dispatcher::new(
        store.clone(),
        None,
        Arc::new(engine),
        correlator.clone(),
        server_config(&dir),
        CancellationToken::new(),
    );
    Pipeline { data_dir: dir.path().to_path_buf(), _dir: dir, store, dispatcher, correlator }
}

fn request(target: &str, modules: &str) -> ScanRequest {
    ScanRequest { name: "workspace spec".into(), target: target.into(), module_list: modules.into() }
}

#[tokio::test]
async fn broker_down_scan_finishes_with_no_broker_traffic() {
    let px = pipeline(ScriptedEngine::emitting(4));

    let outcome = px.dispatcher.submit(request("example.com", "m_dns,m_whois")).await.unwrap();
    assert_eq!(outcome.route, DispatchRoute::Local);

    assert_eq!(wait_for_terminal(&px.store, &outcome.scan_id).await, ScanStatus::Finished);
    assert_eq!(px.store.event_count(&outcome.scan_id).unwrap(), 4);
    assert_eq!(px.correlator.runs(), 1);

    // Worker-side hygiene holds on the fallback path too.
    assert!(TaskLocalStore::open(&px.data_dir, &outcome.scan_id).unwrap().is_none());
}

#[tokio::test]
async fn identical_reruns_converge_to_one_event_set() {
    // The scripted engine emits the same hashes every run, like a real
    // engine replaying the same observations after a redelivery.
    let px = pipeline(ScriptedEngine::emitting(3));

    let first = px.dispatcher.submit(request("example.com", "m_dns")).await.unwrap();
    wait_for_terminal(&px.store, &first.scan_id).await;
    let baseline = px.store.events(&first.scan_id).unwrap();

    let second = px.dispatcher.submit(request("example.com", "m_dns")).await.unwrap();
    wait_for_terminal(&px.store, &second.scan_id).await;
    let replay = px.store.events(&second.scan_id).unwrap();

    // Distinct scans, identical deduped event sets.
    assert_eq!(baseline, replay);
    assert_eq!(baseline.len(), 3);
}

#[tokio::test]
async fn slow_classification_is_visible_in_the_task() {
    // Classification itself is pure; check it through the dispatcher's
    // normalization seam the way a queue would see it.
    let px = pipeline(ScriptedEngine::emitting(0));
    let outcome = px.dispatcher.submit(request("example.com", "m_dns,m_portscan_tcp")).await.unwrap();

    // No broker: the route is local, but the scan row carries everything a
    // worker task would have carried.
    assert_eq!(outcome.route, DispatchRoute::Local);
    wait_for_terminal(&px.store, &outcome.scan_id).await;

    let scan = px.store.scan_get(&outcome.scan_id).unwrap().unwrap();
    assert_eq!(scan.target_type, "INTERNET_NAME");
}

#[tokio::test]
async fn abort_during_local_run_settles_aborted() {
    let engine = ScriptedEngine::new(vec![
        Step::Event(muninn_core::test_support::event(0)),
        Step::AwaitAbort(std::time::Duration::from_secs(10)),
    ]);
    let px = pipeline(engine);

    let outcome = px.dispatcher.submit(request("example.com", "m_dns")).await.unwrap();
    let store = px.store.clone();
    let scan_id = outcome.scan_id;
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        store
            .scan_set_status(&scan_id, ScanStatus::AbortRequested, 2)
            .unwrap();
    });

    assert_eq!(wait_for_terminal(&px.store, &outcome.scan_id).await, ScanStatus::Aborted);
    // No correlations for an aborted scan.
    assert_eq!(px.correlator.runs(), 0);
}

// Keep the wire task type exercised from the workspace level: the
// dispatcher, queues, and workers must agree on this schema forever.
#[test]
fn task_wire_schema_is_stable() {
    let raw = serde_json::json!({
        "scan_id": "abc123",
        "scan_name": "n",
        "scan_target": "example.com",
        "target_type": "INTERNET_NAME",
        "module_list": "m_dns",
        "queue_type": "slow",
        "api_url": "http://cp:5001",
        "result_mode": "rabbitmq",
    });
    let task: ScanTask = serde_json::from_value(raw).unwrap();
    assert_eq!(task.queue_type.queue_name(), "scans.slow");
}
