// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task execution specs, run in direct mode so results land in a real
//! (temporary) shared store with no broker in the loop.

use super::*;
use muninn_broker::BrokerConfig;
use muninn_core::test_support;
use muninn_core::{Scan, ScanId};
use muninn_engine::fake::{ScriptedEngine, Step};

struct Fixture {
    _dir: tempfile::TempDir,
    ctx: TaskContext,
    engine: ScriptedEngine,
}

fn fixture(engine: ScriptedEngine, scan_id: &str) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(&dir.path().join("muninn.db")).unwrap();
    store
        .scan_create(&Scan {
            id: ScanId::new(scan_id),
            name: "spec scan".into(),
            target: "example.com".into(),
            target_type: "INTERNET_NAME".into(),
            status: muninn_core::ScanStatus::Running,
            created_ms: 1,
            started_ms: Some(1),
            ended_ms: None,
        })
        .unwrap();

    let ctx = TaskContext {
        broker: Arc::new(Broker::new(BrokerConfig::new("amqp://unused:5672/"))),
        shared_store: store,
        data_dir: dir.path().to_path_buf(),
        engine: Arc::new(engine.clone()),
        abort_poll: Duration::from_millis(25),
    };
    Fixture { _dir: dir, ctx, engine }
}

fn direct_task(scan_id: &str) -> ScanTask {
    let mut task = test_support::task(scan_id);
    task.result_mode = ResultMode::Direct;
    task
}

#[tokio::test]
async fn happy_path_persists_events_and_finishes() {
    let fx = fixture(ScriptedEngine::emitting(5), "aa");
    let task = direct_task("aa");

    run_scan_task(&fx.ctx, &task).await.unwrap();

    let id = ScanId::new("aa");
    assert_eq!(fx.ctx.shared_store.event_count(&id).unwrap(), 5);
    let scan = fx.ctx.shared_store.scan_get(&id).unwrap().unwrap();
    assert_eq!(scan.status, muninn_core::ScanStatus::Finished);
    assert!(scan.ended_ms.is_some());

    // Task-local store is gone.
    assert!(TaskLocalStore::open(&fx.ctx.data_dir, &id).unwrap().is_none());
}

#[tokio::test]
async fn redelivery_is_idempotent() {
    let fx = fixture(ScriptedEngine::emitting(5), "bb");
    let task = direct_task("bb");

    // First delivery crashes notionally after completion; the broker
    // redelivers the identical task.
    run_scan_task(&fx.ctx, &task).await.unwrap();
    run_scan_task(&fx.ctx, &task).await.unwrap();

    assert_eq!(fx.engine.runs(), 2);
    // Same five hashes both times: still five rows.
    assert_eq!(fx.ctx.shared_store.event_count(&ScanId::new("bb")).unwrap(), 5);
}

#[tokio::test]
async fn engine_failure_publishes_failed_and_nacks() {
    let engine = ScriptedEngine::new(vec![
        Step::Event(test_support::event(0)),
        Step::Fail("module blew up".into()),
    ]);
    let fx = fixture(engine, "cc");
    let task = direct_task("cc");

    let err = run_scan_task(&fx.ctx, &task).await.unwrap_err();
    assert!(matches!(err, TaskError::Engine(_)));

    let scan = fx.ctx.shared_store.scan_get(&ScanId::new("cc")).unwrap().unwrap();
    assert_eq!(scan.status, muninn_core::ScanStatus::ErrorFailed);
    // The event emitted before the failure is durable.
    assert_eq!(fx.ctx.shared_store.event_count(&ScanId::new("cc")).unwrap(), 1);
}

#[tokio::test]
async fn external_abort_lands_as_aborted() {
    let engine = ScriptedEngine::new(vec![
        Step::Event(test_support::event(0)),
        Step::AwaitAbort(Duration::from_secs(5)),
    ]);
    let fx = fixture(engine, "dd");
    let task = direct_task("dd");

    let store = fx.ctx.shared_store.clone();
    let abort = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        store
            .scan_set_status(&ScanId::new("dd"), muninn_core::ScanStatus::AbortRequested, 2)
            .unwrap();
    });

    // A cleanly aborted scan is an acked delivery, not a failure.
    run_scan_task(&fx.ctx, &task).await.unwrap();
    abort.await.unwrap();

    let scan = fx.ctx.shared_store.scan_get(&ScanId::new("dd")).unwrap().unwrap();
    assert_eq!(scan.status, muninn_core::ScanStatus::Aborted);
}
