// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-plane HTTP surface.
//!
//! Deliberately small: the worker registry (heartbeat plus listings) and
//! the dispatcher's doorway. The heartbeat route is unauthenticated —
//! workers carry no user credentials; deployments fence it at the network
//! layer.

use crate::dispatch::{DispatchError, Dispatcher, DispatchRoute, ScanRequest};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use muninn_core::{Clock, Heartbeat, SystemClock, WorkerId, WorkerRecord};
use muninn_storage::Store;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub dispatcher: Arc<Dispatcher>,
    /// Stale threshold applied when listing workers.
    pub worker_stale: Duration,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/workers/heartbeat", post(worker_heartbeat))
        .route("/workers", get(list_workers))
        .route("/workers/{worker_id}", get(get_worker))
        .route("/scans", post(submit_scan))
        .with_state(state)
}

/// Worker heartbeat — called every ~15 s by each worker. 204 on success.
async fn worker_heartbeat(State(state): State<AppState>, Json(hb): Json<Heartbeat>) -> StatusCode {
    match state.store.worker_upsert(&hb, SystemClock.epoch_ms()) {
        Ok(()) => StatusCode::NO_CONTENT,
        Err(e) => {
            tracing::error!(worker_id = %hb.worker_id, error = %e, "worker heartbeat failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// List workers, marking stale rows offline first so callers never see a
/// worker as idle that has in fact gone quiet.
async fn list_workers(State(state): State<AppState>) -> Result<Json<Vec<WorkerRecord>>, StatusCode> {
    let now_ms = SystemClock.epoch_ms();
    if let Err(e) = state.store.workers_mark_stale_offline(now_ms, state.worker_stale.as_millis() as u64)
    {
        tracing::warn!(error = %e, "stale sweep before worker listing failed");
    }
    match state.store.worker_list() {
        Ok(workers) => Ok(Json(workers)),
        Err(e) => {
            tracing::error!(error = %e, "worker listing failed");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn get_worker(
    State(state): State<AppState>,
    Path(worker_id): Path<String>,
) -> Result<Json<WorkerRecord>, StatusCode> {
    match state.store.worker_get(&WorkerId::new(&worker_id)) {
        Ok(Some(worker)) => Ok(Json(worker)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!(worker_id = %worker_id, error = %e, "worker lookup failed");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

#[derive(Debug, serde::Serialize)]
struct SubmitResponse {
    scan_id: String,
    route: String,
}

/// Submit a scan. Thin shim over the dispatcher.
async fn submit_scan(
    State(state): State<AppState>,
    Json(request): Json<ScanRequest>,
) -> Result<Json<SubmitResponse>, (StatusCode, String)> {
    match state.dispatcher.submit(request).await {
        Ok(outcome) => {
            let route = match outcome.route {
                DispatchRoute::Queued(queue) => format!("queued:{queue}"),
                DispatchRoute::Local => "local".to_string(),
            };
            Ok(Json(SubmitResponse { scan_id: outcome.scan_id.to_string(), route }))
        }
        Err(e @ DispatchError::Store(_)) => Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
        Err(e) => Err((StatusCode::BAD_REQUEST, e.to_string())),
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
