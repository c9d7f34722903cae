// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted engine and collecting sink for tests.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::engine::{EngineError, ScanEngine};
use crate::sink::{EventSink, SinkError};
use muninn_core::{Lifecycle, LogRecord, ScanEvent, ScanStatus, ScanTask};
use muninn_storage::TaskLocalStore;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One step of a scripted run. Abort is checked between steps.
#[derive(Debug, Clone)]
pub enum Step {
    Event(ScanEvent),
    Log(LogRecord),
    Sleep(Duration),
    /// Return `Err(EngineError::Failed)` at this point.
    Fail(String),
    /// Park until the abort bridge writes `ABORT-REQUESTED` (or the
    /// timeout elapses, which fails the test run).
    AwaitAbort(Duration),
}

/// Plays back a fixed step list with the real lifecycle contract.
#[derive(Clone, Default)]
pub struct ScriptedEngine {
    steps: Arc<Mutex<Vec<Step>>>,
    runs: Arc<AtomicU32>,
}

impl ScriptedEngine {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps: Arc::new(Mutex::new(steps)), runs: Arc::new(AtomicU32::new(0)) }
    }

    /// Emit `n` distinct events then finish.
    pub fn emitting(n: u32) -> Self {
        Self::new((0..n).map(|i| Step::Event(muninn_core::test_support::event(i))).collect())
    }

    /// How many times `run` was invoked (redelivery tests).
    pub fn runs(&self) -> u32 {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ScanEngine for ScriptedEngine {
    async fn run(
        &self,
        task: &ScanTask,
        local: &TaskLocalStore,
        sink: &dyn EventSink,
    ) -> Result<(), EngineError> {
        let _ = task;
        self.runs.fetch_add(1, Ordering::SeqCst);
        let steps = self.steps.lock().clone();

        for step in steps {
            if local.status()? == Some(ScanStatus::AbortRequested) {
                local.set_status(ScanStatus::Aborted)?;
                return Ok(());
            }
            match step {
                Step::Event(event) => sink.emit_event(&event).await?,
                Step::Log(record) => sink.emit_log(&record).await?,
                Step::Sleep(d) => tokio::time::sleep(d).await,
                Step::Fail(message) => return Err(EngineError::Failed(message)),
                Step::AwaitAbort(timeout) => {
                    let deadline = tokio::time::Instant::now() + timeout;
                    loop {
                        if local.status()? == Some(ScanStatus::AbortRequested) {
                            local.set_status(ScanStatus::Aborted)?;
                            return Ok(());
                        }
                        if tokio::time::Instant::now() >= deadline {
                            return Err(EngineError::Failed("await-abort timed out".into()));
                        }
                        tokio::time::sleep(Duration::from_millis(20)).await;
                    }
                }
            }
        }

        if local.status()? == Some(ScanStatus::AbortRequested) {
            local.set_status(ScanStatus::Aborted)?;
            return Ok(());
        }
        local.set_status(ScanStatus::Finished)?;
        sink.emit_lifecycle(Lifecycle::Finished).await?;
        Ok(())
    }
}

/// Sink that records everything it receives.
#[derive(Clone, Default)]
pub struct CollectSink {
    pub events: Arc<Mutex<Vec<ScanEvent>>>,
    pub logs: Arc<Mutex<Vec<LogRecord>>>,
    pub lifecycles: Arc<Mutex<Vec<Lifecycle>>>,
}

#[async_trait::async_trait]
impl EventSink for CollectSink {
    async fn emit_event(&self, event: &ScanEvent) -> Result<(), SinkError> {
        self.events.lock().push(event.clone());
        Ok(())
    }

    async fn emit_log(&self, record: &LogRecord) -> Result<(), SinkError> {
        self.logs.lock().push(record.clone());
        Ok(())
    }

    async fn emit_lifecycle(&self, lifecycle: Lifecycle) -> Result<(), SinkError> {
        self.lifecycles.lock().push(lifecycle);
        Ok(())
    }
}
