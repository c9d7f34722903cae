// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! muninn-server: the scan control plane.
//!
//! Accepts scan submissions, routes them onto the task queues (or runs
//! them locally when the broker is down), supervises per-scan result
//! consumers, runs correlation post-processing out-of-process, and keeps
//! the worker registry. One control plane per data directory; a lock file
//! enforces the single-master assumption.

pub mod config;
pub mod correlation;
pub mod dispatch;
pub mod env;
pub mod http;
pub mod startup;
pub mod supervisor;

pub use config::ServerConfig;
pub use dispatch::{DispatchError, Dispatcher, DispatchRoute, ScanRequest, SubmitOutcome};
pub use supervisor::Supervisor;
