// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-scan task-local store.
//!
//! Each delivery of a task runs against a fresh database file under
//! `{data_dir}/scans/{scan_id}.db`. Wiping it at task start is what makes
//! redelivery of the same scan idempotent; removing it at completion is
//! what keeps workers stateless. While the scan runs, the file is the
//! mailbox between the abort bridge (writer) and the engine (poller).

use crate::error::StoreError;
use crate::schema;
use muninn_core::{ScanId, ScanStatus};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Clone)]
pub struct TaskLocalStore {
    path: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl TaskLocalStore {
    /// Database path for a scan under `data_dir`.
    pub fn db_path(data_dir: &Path, scan_id: &ScanId) -> PathBuf {
        data_dir.join("scans").join(format!("{scan_id}.db"))
    }

    /// Create a fresh store for one task delivery, deleting any leftover
    /// from a previous delivery of the same scan first.
    pub fn create_fresh(
        data_dir: &Path,
        scan_id: &ScanId,
        name: &str,
        target: &str,
    ) -> Result<Self, StoreError> {
        let path = Self::db_path(data_dir, scan_id);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|source| StoreError::Io { path: parent.to_path_buf(), source })?;
        }
        if path.exists() {
            tracing::debug!(scan_id = %scan_id, "wiping leftover task-local store");
            std::fs::remove_file(&path)
                .map_err(|source| StoreError::Io { path: path.clone(), source })?;
        }

        let conn = Connection::open(&path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.execute_batch(schema::LOCAL_SCHEMA)?;
        conn.execute(
            "INSERT INTO tbl_scan_instance (scan_id, name, target, status) VALUES (?1, ?2, ?3, ?4)",
            params![scan_id.as_str(), name, target, ScanStatus::Running.to_string()],
        )?;
        Ok(Self { path, conn: Arc::new(Mutex::new(conn)) })
    }

    /// Open an existing task-local store. `Ok(None)` while the file does
    /// not exist yet — the abort bridge retries through that window.
    pub fn open(data_dir: &Path, scan_id: &ScanId) -> Result<Option<Self>, StoreError> {
        let path = Self::db_path(data_dir, scan_id);
        if !path.exists() {
            return Ok(None);
        }
        let conn = Connection::open(&path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(Some(Self { path, conn: Arc::new(Mutex::new(conn)) }))
    }

    /// Current scan status, if the row exists yet.
    pub fn status(&self) -> Result<Option<ScanStatus>, StoreError> {
        let conn = self.conn.lock();
        let status = conn
            .query_row("SELECT status FROM tbl_scan_instance LIMIT 1", [], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(status.as_deref().and_then(ScanStatus::parse))
    }

    /// Write a status. No state-machine enforcement here: the engine and
    /// the abort bridge both write, and the shared-store FSM is the
    /// authority; this file only relays.
    pub fn set_status(&self, status: ScanStatus) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute("UPDATE tbl_scan_instance SET status = ?1", params![status.to_string()])?;
        Ok(())
    }

    /// Remove the database file. All durable output has been published by
    /// the time this runs.
    pub fn remove(self) -> Result<(), StoreError> {
        let path = self.path.clone();
        drop(self.conn);
        std::fs::remove_file(&path).map_err(|source| StoreError::Io { path, source })?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "scan_local_tests.rs"]
mod tests;
