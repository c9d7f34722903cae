// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! muninnd — the scan control plane.
//!
//! Serves the dispatcher and worker registry over HTTP, runs the
//! result-consumer supervisor, and (as the `correlate` subcommand)
//! doubles as its own correlation child process.

use clap::{Parser, Subcommand};
use muninn_core::ScanId;
use muninn_server::{config::ServerConfig, correlation, env, http, startup};
use muninn_storage::Store;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "muninnd", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run correlation rules for a finished scan. Forked by the control
    /// plane itself; resource caps are enforced by the parent.
    Correlate {
        /// Scan to correlate
        #[arg(long)]
        scan: String,

        /// Correlation rules directory
        #[arg(long)]
        rules: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Some(Command::Correlate { scan, rules }) => correlate(scan, rules),
        None => serve().await,
    }
}

/// Child-process entry: iterate the rules for one scan and exit.
fn correlate(scan: String, rules: PathBuf) -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let store = match Store::open(&env::shared_store_path()) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(error = %e, "correlation child cannot open store");
            return ExitCode::from(1);
        }
    };
    let scan_id = ScanId::new(&scan);
    match correlation::run_rules(&store, &scan_id, &rules, correlation::MIN_HEAVY_MEM_KB) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(scan_id = %scan_id, error = %e, "correlation pass failed");
            ExitCode::from(1)
        }
    }
}

async fn serve() -> ExitCode {
    let config = match ServerConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("invalid configuration: {e}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = init_tracing(&config) {
        eprintln!("failed to initialize logging: {e}");
        return ExitCode::from(1);
    }

    let cancel = CancellationToken::new();
    spawn_signal_listener(cancel.clone());

    let plane = match startup::startup(config, &cancel) {
        Ok(plane) => plane,
        Err(e) => {
            tracing::error!(error = %e, "control plane startup failed");
            return ExitCode::from(1);
        }
    };

    // The monitor keeps polling the store even while the broker is
    // unreachable; individual consumers fail, get reaped, and retry.
    let supervisor = plane.supervisor.map(|supervisor| {
        let cancel = cancel.clone();
        tokio::spawn(supervisor.run(cancel))
    });

    let listener = match tokio::net::TcpListener::bind(&plane.config.listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %plane.config.listen_addr, error = %e, "cannot bind listener");
            return ExitCode::from(1);
        }
    };
    tracing::info!(addr = %plane.config.listen_addr, "control plane listening");

    let app = http::router(plane.app_state);
    let shutdown = cancel.clone();
    let serve_result = axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await;

    cancel.cancel();
    if let Some(handle) = supervisor {
        let _ = handle.await;
    }
    if let Some(broker) = plane.broker {
        broker.close().await;
    }

    match serve_result {
        Ok(()) => {
            tracing::info!("control plane stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "server error");
            ExitCode::from(1)
        }
    }
}

fn init_tracing(config: &ServerConfig) -> Result<(), std::io::Error> {
    let logs_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&logs_dir)?;
    let file_appender = tracing_appender::rolling::daily(logs_dir, "muninnd.log");
    // Leak the guard: the writer must outlive main's stack frame.
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    std::mem::forget(guard);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::fmt::layer().with_writer(file_writer).with_ansi(false))
        .init();
    Ok(())
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
            _ = term.recv() => tracing::info!("received SIGTERM — shutting down"),
            _ = int.recv() => tracing::info!("received SIGINT — shutting down"),
        }
        cancel.cancel();
    });
}
