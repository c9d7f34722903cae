// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broker errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    /// No broker URL configured; dispatch should fall back to local
    /// execution rather than treat this as a failure.
    #[error("no broker URL configured")]
    NotConfigured,

    /// Connection could not be established within the retry budget.
    #[error("broker unreachable after {attempts} attempts: {last}")]
    Unavailable { attempts: u32, last: lapin::Error },

    #[error("broker protocol error: {0}")]
    Protocol(#[from] lapin::Error),

    #[error("publish to {exchange:?}/{routing_key} not confirmed")]
    NotConfirmed { exchange: String, routing_key: String },

    #[error("failed to read CA certificate {path}: {source}")]
    CaCert {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}
