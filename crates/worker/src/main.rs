// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Distributed scan worker.
//!
//! Connects to the broker, pulls scan tasks from one queue, and executes
//! each scan in-process. Exit codes: 0 on a normal stop, 1 when startup is
//! unrecoverable (no `BROKER_URL`, or no broker after the retry budget).

use clap::{Parser, ValueEnum};
use muninn_broker::{Broker, BrokerConfig};
use muninn_core::{QueueType, WorkerId};
use muninn_engine::BasicEngine;
use muninn_storage::Store;
use muninn_worker::runtime::{WorkerRuntime, WorkerRuntimeConfig};
use muninn_worker::env;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum QueueArg {
    Fast,
    Slow,
}

impl From<QueueArg> for QueueType {
    fn from(arg: QueueArg) -> Self {
        match arg {
            QueueArg::Fast => QueueType::Fast,
            QueueArg::Slow => QueueType::Slow,
        }
    }
}

/// Distributed scan worker.
#[derive(Debug, Parser)]
#[command(name = "muninn-worker", version)]
struct Args {
    /// Queue to consume from
    #[arg(long, value_enum, default_value_t = QueueArg::Fast)]
    queue: QueueArg,

    /// Number of scans to process simultaneously
    #[arg(long, default_value_t = 1)]
    concurrency: u16,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let Some(broker_config) = BrokerConfig::from_env() else {
        tracing::error!("BROKER_URL is not set — worker cannot start");
        return ExitCode::from(1);
    };
    // The consumer channel blocks for the whole scan; heartbeats would get
    // the connection killed mid-scan and the task redelivered.
    let broker = Arc::new(Broker::new(broker_config.without_heartbeat()));

    let shared_store = match Store::open(&env::shared_store_path()) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(error = %e, "cannot open shared store");
            return ExitCode::from(1);
        }
    };

    let config = WorkerRuntimeConfig {
        worker_id: WorkerId::generate(),
        worker_name: env::worker_name(),
        host: env::hostname(),
        queue: args.queue.into(),
        concurrency: args.concurrency.max(1),
        api_url: env::api_url(),
        data_dir: env::data_path(),
    };

    let cancel = CancellationToken::new();
    spawn_signal_listener(cancel.clone());

    let runtime = WorkerRuntime::new(
        config,
        broker,
        shared_store,
        Arc::new(BasicEngine::default()),
        cancel,
    );

    match runtime.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "worker failed to start");
            ExitCode::from(1)
        }
    }
}

/// Graceful shutdown on SIGTERM / SIGINT.
fn spawn_signal_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "cannot install SIGTERM handler");
                return;
            }
        };
        let mut int = match signal(SignalKind::interrupt()) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "cannot install SIGINT handler");
                return;
            }
        };
        tokio::select! {
            _ = term.recv() => tracing::info!("received SIGTERM — shutting down gracefully"),
            _ = int.recv() => tracing::info!("received SIGINT — shutting down gracefully"),
        }
        cancel.cancel();
    });
}
