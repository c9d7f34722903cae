// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace-level specs.
//!
//! Exercise the pipeline across crate boundaries: binary CLI contracts
//! and the dispatcher's broker-down fallback running a scan end to end.

#[path = "specs/prelude.rs"]
mod prelude;

#[path = "specs/cli.rs"]
mod cli;
#[path = "specs/pipeline.rs"]
mod pipeline;
