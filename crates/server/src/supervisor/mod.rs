// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Result-consumer supervisor.
//!
//! A single monitor task owns the set of per-scan consumers: it starts one
//! for every scan in `{RUNNING, ABORT-REQUESTED}`, stops consumers whose
//! scans left that set, reaps dead ones (a replacement spawns on the next
//! tick while the scan is still active), promotes scans whose terminal
//! lifecycle was lost (the watchdog), and sweeps the worker registry.

pub mod consumer;

use crate::correlation::Correlator;
use consumer::ConsumerHandle;
use muninn_broker::Broker;
use muninn_core::{Clock, ScanId, ScanStatus};
use muninn_storage::Store;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Scans the supervisor keeps a consumer for.
const ACTIVE: &[ScanStatus] = &[ScanStatus::Running, ScanStatus::AbortRequested];

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Monitor tick.
    pub monitor_interval: Duration,
    /// Consumer silence before the watchdog assumes a lost lifecycle.
    pub watchdog_idle: Duration,
    /// Worker-registry sweep cadence.
    pub sweep_interval: Duration,
    /// Heartbeat silence before a worker is marked offline.
    pub worker_stale: Duration,
    /// Offline duration before a worker row is deleted.
    pub worker_cleanup: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            monitor_interval: Duration::from_secs(10),
            watchdog_idle: Duration::from_secs(10 * 60),
            sweep_interval: Duration::from_secs(2 * 60),
            worker_stale: Duration::from_secs(60),
            worker_cleanup: Duration::from_secs(300),
        }
    }
}

/// Starts consumer tasks. A trait seam so monitor logic is testable
/// without a broker.
pub trait ConsumerSpawner: Send + Sync {
    fn spawn(&self, scan_id: ScanId) -> ConsumerHandle;
}

/// Production spawner: real broker consumers.
pub struct BrokerSpawner<C: Clock> {
    pub broker: Arc<Broker>,
    pub store: Store,
    pub correlator: Arc<dyn Correlator>,
    pub clock: C,
}

impl<C: Clock> ConsumerSpawner for BrokerSpawner<C> {
    fn spawn(&self, scan_id: ScanId) -> ConsumerHandle {
        consumer::spawn(
            self.broker.clone(),
            self.store.clone(),
            self.correlator.clone(),
            self.clock.clone(),
            scan_id,
        )
    }
}

pub struct Supervisor<C: Clock> {
    store: Store,
    spawner: Arc<dyn ConsumerSpawner>,
    correlator: Arc<dyn Correlator>,
    clock: C,
    config: SupervisorConfig,
    consumers: HashMap<ScanId, ConsumerHandle>,
    last_sweep: Option<Instant>,
}

impl<C: Clock> Supervisor<C> {
    pub fn new(
        store: Store,
        spawner: Arc<dyn ConsumerSpawner>,
        correlator: Arc<dyn Correlator>,
        clock: C,
        config: SupervisorConfig,
    ) -> Self {
        Self { store, spawner, correlator, clock, config, consumers: HashMap::new(), last_sweep: None }
    }

    /// Monitor loop. Runs until cancelled, then stops every consumer.
    pub async fn run(mut self, cancel: CancellationToken) {
        tracing::info!("result-consumer supervisor started");
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(self.config.monitor_interval) => {}
            }
            self.tick().await;
        }

        for (_, handle) in self.consumers.drain() {
            handle.stop.cancel();
            let _ = handle.join.await;
        }
        tracing::info!("result-consumer supervisor stopped");
    }

    /// One monitor pass. Public for tests; the order of the five steps is
    /// part of the contract.
    pub async fn tick(&mut self) {
        self.reap_dead_consumers();
        self.start_missing_consumers();
        self.stop_inactive_consumers();
        self.watchdog().await;
        self.maybe_sweep_workers();
    }

    pub fn tracked(&self, scan_id: &ScanId) -> bool {
        self.consumers.contains_key(scan_id)
    }

    pub fn tracked_count(&self) -> usize {
        self.consumers.len()
    }

    /// Drop handles whose task is gone. If the scan is still active the
    /// next step spawns a replacement, which re-declares the queue and
    /// drains whatever accumulated while we were blind.
    fn reap_dead_consumers(&mut self) {
        self.consumers.retain(|scan_id, handle| {
            if handle.join.is_finished() {
                tracing::warn!(scan_id = %scan_id, "reaping dead result consumer");
                return false;
            }
            true
        });
    }

    fn start_missing_consumers(&mut self) {
        let active = match self.store.scans_with_status(ACTIVE) {
            Ok(scans) => scans,
            Err(e) => {
                tracing::error!(error = %e, "monitor could not query active scans");
                return;
            }
        };
        for scan in active {
            if !self.consumers.contains_key(&scan.id) {
                tracing::info!(scan_id = %scan.id, "starting result consumer");
                let handle = self.spawner.spawn(scan.id);
                self.consumers.insert(scan.id, handle);
            }
        }
    }

    fn stop_inactive_consumers(&mut self) {
        let active: std::collections::HashSet<ScanId> = match self.store.scans_with_status(ACTIVE) {
            Ok(scans) => scans.into_iter().map(|s| s.id).collect(),
            Err(e) => {
                tracing::error!(error = %e, "monitor could not query active scans");
                return;
            }
        };
        let stale: Vec<ScanId> =
            self.consumers.keys().filter(|id| !active.contains(*id)).copied().collect();
        for scan_id in stale {
            if let Some(handle) = self.consumers.remove(&scan_id) {
                tracing::info!(scan_id = %scan_id, "stopping result consumer for settled scan");
                handle.stop.cancel();
            }
        }
    }

    /// Promote scans whose consumer has heard nothing for the idle window:
    /// the terminal lifecycle is presumed lost (connection broken, queue
    /// expired). Correlations still run; the scan still finishes.
    async fn watchdog(&mut self) {
        let now_ms = self.clock.epoch_ms();
        let idle_ms = self.config.watchdog_idle.as_millis() as u64;

        let expired: Vec<ScanId> = self
            .consumers
            .iter()
            .filter(|(_, handle)| {
                !handle.shared.lifecycle_received()
                    && now_ms.saturating_sub(handle.shared.last_message_ms()) >= idle_ms
            })
            .map(|(id, _)| *id)
            .collect();

        for scan_id in expired {
            tracing::warn!(
                scan_id = %scan_id,
                idle_secs = self.config.watchdog_idle.as_secs(),
                "watchdog: no messages within the idle window — assuming lost lifecycle, promoting to FINISHED"
            );
            if let Some(handle) = self.consumers.remove(&scan_id) {
                handle.stop.cancel();
            }
            self.correlator.run(&scan_id).await;
            if let Err(e) = self.store.scan_set_status(&scan_id, ScanStatus::Finished, now_ms) {
                tracing::warn!(scan_id = %scan_id, error = %e, "watchdog status write failed");
            }
        }
    }

    fn maybe_sweep_workers(&mut self) {
        let now = self.clock.now();
        if self.last_sweep.is_some_and(|last| now.duration_since(last) < self.config.sweep_interval) {
            return;
        }
        self.last_sweep = Some(now);

        let now_ms = self.clock.epoch_ms();
        match self.store.workers_mark_stale_offline(now_ms, self.config.worker_stale.as_millis() as u64) {
            Ok(0) => {}
            Ok(n) => tracing::info!(count = n, "marked stale workers offline"),
            Err(e) => tracing::error!(error = %e, "stale-worker sweep failed"),
        }
        match self.store.workers_delete_offline(now_ms, self.config.worker_cleanup.as_millis() as u64) {
            Ok(0) => {}
            Ok(n) => tracing::info!(count = n, "deleted workers offline past the cleanup timeout"),
            Err(e) => tracing::error!(error = %e, "offline-worker cleanup failed"),
        }
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
