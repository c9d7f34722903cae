// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-plane startup: lock file, store, broker, component wiring.

use crate::config::{ConfigError, ServerConfig};
use crate::correlation::ProcessCorrelator;
use crate::dispatch::Dispatcher;
use crate::http::AppState;
use crate::supervisor::{BrokerSpawner, Supervisor, SupervisorConfig};
use fs2::FileExt;
use muninn_broker::{Broker, BrokerConfig};
use muninn_core::SystemClock;
use muninn_engine::BasicEngine;
use muninn_storage::{Store, StoreError};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to acquire {path}: control plane already running?")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Everything `main` needs to serve.
pub struct ControlPlane {
    pub config: ServerConfig,
    pub store: Store,
    pub broker: Option<Arc<Broker>>,
    pub app_state: AppState,
    /// Present when a broker is configured; otherwise results only ever
    /// arrive through local fallback scans.
    pub supervisor: Option<Supervisor<SystemClock>>,
    // Held for the process lifetime; the lock is the single-master
    // guarantee.
    #[allow(dead_code)]
    lock_file: File,
}

/// Wire the control plane together. Does not bind the listener.
pub fn startup(config: ServerConfig, cancel: &CancellationToken) -> Result<ControlPlane, StartupError> {
    std::fs::create_dir_all(&config.data_dir)
        .map_err(|source| StartupError::Io { path: config.data_dir.clone(), source })?;

    let lock_path = config.data_dir.join("muninnd.lock");
    let lock_file = File::create(&lock_path)
        .map_err(|source| StartupError::Io { path: lock_path.clone(), source })?;
    lock_file
        .try_lock_exclusive()
        .map_err(|source| StartupError::Lock { path: lock_path, source })?;

    let store = Store::open(&config.data_dir.join("muninn.db"))?;

    let broker = match BrokerConfig::from_env() {
        Some(broker_config) => Some(Arc::new(Broker::new(broker_config))),
        None => {
            tracing::warn!("BROKER_URL is not set — broker dispatch disabled, scans run locally");
            None
        }
    };

    let correlator = Arc::new(ProcessCorrelator::new(
        std::env::current_exe().unwrap_or_else(|_| PathBuf::from("muninnd")),
        config.rules_dir.clone(),
        config.correlation_timeout,
    ));

    let dispatcher = Arc::new(Dispatcher::new(
        store.clone(),
        broker.clone(),
        Arc::new(BasicEngine::default()),
        correlator.clone(),
        config.clone(),
        cancel.child_token(),
    ));

    let supervisor = broker.as_ref().map(|broker| {
        Supervisor::new(
            store.clone(),
            Arc::new(BrokerSpawner {
                broker: broker.clone(),
                store: store.clone(),
                correlator: correlator.clone(),
                clock: SystemClock,
            }),
            correlator.clone(),
            SystemClock,
            SupervisorConfig {
                worker_cleanup: config.worker_cleanup,
                worker_stale: config.worker_stale,
                ..SupervisorConfig::default()
            },
        )
    });

    let app_state =
        AppState { store: store.clone(), dispatcher, worker_stale: config.worker_stale };

    Ok(ControlPlane { config, store, broker, app_state, supervisor, lock_file })
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
