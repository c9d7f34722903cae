// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! muninn-worker: the stateless scan worker.
//!
//! Pulls tasks from one of the two task queues, runs each scan in-process
//! against a fresh task-local store, streams events/logs/lifecycle back
//! through the result exchange, and heartbeats the control plane. A
//! per-scan abort bridge mirrors externally-requested cancellation into
//! the engine.

pub mod env;
pub mod forward;
pub mod heartbeat;
pub mod runtime;
pub mod sink;
pub mod task_run;

pub use runtime::{WorkerRuntime, WorkerRuntimeConfig};
