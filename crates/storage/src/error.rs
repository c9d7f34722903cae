// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage errors.

use muninn_core::ScanStatus;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("scan {0} not found")]
    ScanNotFound(String),

    #[error("scan {id} already exists")]
    ScanExists { id: String },

    #[error("scan {id}: transition {from} -> {to} not admitted")]
    InvalidTransition { id: String, from: ScanStatus, to: ScanStatus },
}

impl StoreError {
    /// Transient errors are worth a redelivery (nack-with-requeue); hard
    /// errors are not.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}
