// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn config() -> HeartbeatConfig {
    HeartbeatConfig {
        api_url: "http://localhost:5001/".into(),
        worker_id: WorkerId::new("w-1"),
        name: "worker-a".into(),
        host: "host-a".into(),
        queue_type: QueueType::Fast,
        interval: INTERVAL,
    }
}

#[test]
fn endpoint_strips_trailing_slash() {
    assert_eq!(config().endpoint(), "http://localhost:5001/workers/heartbeat");
}

#[test]
fn body_reports_busy_with_current_scan() {
    let body = config().body(&Some(ScanId::new("abc123")));
    assert_eq!(body.status, WorkerStatus::Busy);
    assert_eq!(body.current_scan, "abc123");
}

#[test]
fn body_reports_idle_without_scan() {
    let body = config().body(&None);
    assert_eq!(body.status, WorkerStatus::Idle);
    assert!(body.current_scan.is_empty());
}

#[test]
fn offline_body_clears_scan() {
    let body = config().offline_body();
    assert_eq!(body.status, WorkerStatus::Offline);
    assert!(body.current_scan.is_empty());
}
