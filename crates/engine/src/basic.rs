// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Built-in reference engine.
//!
//! Seeds the target, walks the requested module list, and terminates.
//! Module execution itself is a placeholder — real deployments implement
//! [`ScanEngine`](crate::ScanEngine) over an actual module host — but the
//! lifecycle contract (abort polling, local status, FINISHED publication)
//! is the real one, so the whole pipeline is drivable end-to-end with this
//! engine alone.

use crate::engine::{EngineError, ScanEngine};
use crate::sink::EventSink;
use muninn_core::{Clock, Lifecycle, LogRecord, ScanEvent, ScanStatus, ScanTask, SystemClock, TargetKind};
use muninn_storage::TaskLocalStore;
use std::time::Duration;

pub struct BasicEngine {
    /// Abort-poll tick between module steps.
    tick: Duration,
    clock: SystemClock,
}

impl BasicEngine {
    pub fn new(tick: Duration) -> Self {
        Self { tick, clock: SystemClock }
    }

    fn log(&self, component: &str, message: String) -> LogRecord {
        LogRecord {
            level: "INFO".to_string(),
            message,
            component: component.to_string(),
            time: self.clock.epoch_secs(),
        }
    }

    async fn aborted(&self, local: &TaskLocalStore) -> Result<bool, EngineError> {
        Ok(local.status()? == Some(ScanStatus::AbortRequested))
    }
}

impl Default for BasicEngine {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[async_trait::async_trait]
impl ScanEngine for BasicEngine {
    async fn run(
        &self,
        task: &ScanTask,
        local: &TaskLocalStore,
        sink: &dyn EventSink,
    ) -> Result<(), EngineError> {
        let seed_type = TargetKind::detect(&task.scan_target)
            .map(|kind| kind.to_string())
            .unwrap_or_else(|| task.target_type.clone());

        let seed = ScanEvent::seed(seed_type, task.scan_target.clone(), self.clock.epoch_secs());
        sink.emit_event(&seed).await?;
        sink.emit_log(&self.log("muninn", format!("seeded scan against {}", task.scan_target))).await?;

        for module in task.modules() {
            if self.aborted(local).await? {
                local.set_status(ScanStatus::Aborted)?;
                tracing::info!(scan_id = %task.scan_id, module, "abort honored between modules");
                return Ok(());
            }
            sink.emit_log(&self.log(module, format!("module {module} has no host in this build — skipped"))).await?;
            tokio::time::sleep(self.tick).await;
        }

        if self.aborted(local).await? {
            local.set_status(ScanStatus::Aborted)?;
            return Ok(());
        }

        local.set_status(ScanStatus::Finished)?;
        sink.emit_lifecycle(Lifecycle::Finished).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "basic_tests.rs"]
mod tests;
