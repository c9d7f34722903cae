// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::config::ServerConfig;
use crate::correlation::Correlator;
use muninn_core::{QueueType, ScanId, WorkerStatus};
use muninn_engine::fake::ScriptedEngine;
use tokio_util::sync::CancellationToken;

struct NoopCorrelator;

#[async_trait::async_trait]
impl Correlator for NoopCorrelator {
    async fn run(&self, _scan_id: &ScanId) {}
}

async fn serve() -> (String, Store, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(&dir.path().join("muninn.db")).unwrap();

    let config = ServerConfig {
        data_dir: dir.path().to_path_buf(),
        listen_addr: "127.0.0.1:0".into(),
        api_url: "http://localhost:5001".into(),
        slow_modules: Default::default(),
        worker_stale: Duration::from_secs(60),
        worker_cleanup: Duration::from_secs(300),
        rules_dir: dir.path().join("rules"),
        correlation_timeout: Duration::from_secs(900),
    };
    let dispatcher = Arc::new(Dispatcher::new(
        store.clone(),
        None,
        Arc::new(ScriptedEngine::emitting(1)),
        Arc::new(NoopCorrelator),
        config,
        CancellationToken::new(),
    ));

    let app = router(AppState {
        store: store.clone(),
        dispatcher,
        worker_stale: Duration::from_secs(60),
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), store, dir)
}

fn heartbeat_body(worker_id: &str, status: &str) -> serde_json::Value {
    serde_json::json!({
        "worker_id": worker_id,
        "name": "worker-a",
        "host": "host-a",
        "queue_type": "fast",
        "status": status,
        "current_scan": "",
    })
}

#[tokio::test]
async fn heartbeat_registers_and_returns_204() {
    let (base, store, _dir) = serve().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/workers/heartbeat"))
        .json(&heartbeat_body("w-1", "idle"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    let worker = store.worker_get(&muninn_core::WorkerId::new("w-1")).unwrap().unwrap();
    assert_eq!(worker.status, WorkerStatus::Idle);
    assert_eq!(worker.queue_type, QueueType::Fast);
}

#[tokio::test]
async fn listing_marks_stale_workers_offline() {
    let (base, store, _dir) = serve().await;

    // A worker last seen long ago.
    let hb: muninn_core::Heartbeat =
        serde_json::from_value(heartbeat_body("w-old", "idle")).unwrap();
    store.worker_upsert(&hb, 1_000).unwrap();

    let client = reqwest::Client::new();
    let workers: Vec<WorkerRecord> =
        client.get(format!("{base}/workers")).send().await.unwrap().json().await.unwrap();

    assert_eq!(workers.len(), 1);
    assert_eq!(workers[0].status, WorkerStatus::Offline);
}

#[tokio::test]
async fn unknown_worker_is_404() {
    let (base, _store, _dir) = serve().await;
    let client = reqwest::Client::new();
    let response = client.get(format!("{base}/workers/nope")).send().await.unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn scan_submission_routes_locally_without_broker() {
    let (base, store, _dir) = serve().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/scans"))
        .json(&serde_json::json!({
            "name": "spec scan",
            "target": "example.com",
            "module_list": "m_dns,m_whois",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["route"], "local");
    let scan_id = ScanId::new(body["scan_id"].as_str().unwrap());
    assert!(store.scan_get(&scan_id).unwrap().is_some());
}

#[tokio::test]
async fn bad_submission_is_400() {
    let (base, _store, _dir) = serve().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/scans"))
        .json(&serde_json::json!({ "name": "x", "target": "!!!", "module_list": "m_dns" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}
