// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! muninn-engine: the scan-engine boundary.
//!
//! The pipeline treats the engine as a black box: given a task, it emits a
//! stream of typed events and eventually terminates. This crate pins that
//! contract down as [`ScanEngine`] + [`EventSink`] and ships two
//! implementations — [`BasicEngine`], a minimal built-in engine that seeds
//! the target and honors aborts, and (behind `test-support`) a scripted
//! engine that plays back a programmed stream.

mod basic;
pub mod bridge;
mod engine;
mod sink;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use basic::BasicEngine;
pub use engine::{EngineError, ScanEngine};
pub use sink::{EventSink, SinkError, StoreSink};
