// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared control-plane store.
//!
//! Single connection, single writer. Every method takes the process-wide
//! mutex for its whole duration, so check-then-write sequences (status
//! transitions, dedup inserts) are atomic with respect to other tasks.

use crate::error::StoreError;
use crate::schema;
use muninn_core::{Heartbeat, LogRecord, Scan, ScanEvent, ScanId, ScanStatus, WorkerRecord, WorkerStatus};
use muninn_core::{QueueType, WorkerId};
use parking_lot::{Mutex, MutexGuard};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;

/// Handle to the shared store. Cheap to clone; all clones serialize
/// through one mutex.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (or create) the store at `path` and initialize the schema.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|source| StoreError::Io { path: parent.to_path_buf(), source })?;
        }
        let conn = Connection::open(path)?;
        schema::init(&conn)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    /// In-memory store for tests and ephemeral runs.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        schema::init(&conn)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    /// Hold the store lock across a compound operation.
    ///
    /// Individual methods already serialize internally; this is for the
    /// rare caller that needs several statements to be atomic together.
    pub fn exclusive<T>(&self, f: impl FnOnce(&Connection) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let guard = self.conn.lock();
        f(&guard)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    // ── Scans ───────────────────────────────────────────────────────────

    /// Insert a new scan row. Exactly once: a second insert for the same
    /// ID is an error, which is what makes dispatch idempotent-by-check.
    pub fn scan_create(&self, scan: &Scan) -> Result<(), StoreError> {
        let conn = self.lock();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO tbl_scan_instance
             (scan_id, name, target, target_type, status, created_ms, started_ms, ended_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                scan.id.as_str(),
                scan.name,
                scan.target,
                scan.target_type,
                scan.status.to_string(),
                scan.created_ms,
                scan.started_ms,
                scan.ended_ms,
            ],
        )?;
        if inserted == 0 {
            return Err(StoreError::ScanExists { id: scan.id.to_string() });
        }
        Ok(())
    }

    pub fn scan_get(&self, id: &ScanId) -> Result<Option<Scan>, StoreError> {
        let conn = self.lock();
        let scan = conn
            .query_row(
                "SELECT scan_id, name, target, target_type, status, created_ms, started_ms, ended_ms
                 FROM tbl_scan_instance WHERE scan_id = ?1",
                params![id.as_str()],
                row_to_scan,
            )
            .optional()?;
        Ok(scan)
    }

    /// Transition a scan's status, enforcing the state machine under the
    /// store lock. Terminal transitions stamp `ended_ms`.
    pub fn scan_set_status(&self, id: &ScanId, to: ScanStatus, now_ms: u64) -> Result<(), StoreError> {
        let conn = self.lock();
        let from = conn
            .query_row(
                "SELECT status FROM tbl_scan_instance WHERE scan_id = ?1",
                params![id.as_str()],
                |row| row.get::<_, String>(0),
            )
            .optional()?
            .and_then(|s| ScanStatus::parse(&s))
            .ok_or_else(|| StoreError::ScanNotFound(id.to_string()))?;

        if from == to {
            return Ok(());
        }
        if !from.may_transition(to) {
            return Err(StoreError::InvalidTransition { id: id.to_string(), from, to });
        }

        let ended: Option<u64> = to.is_terminal().then_some(now_ms);
        conn.execute(
            "UPDATE tbl_scan_instance SET status = ?2, ended_ms = COALESCE(?3, ended_ms)
             WHERE scan_id = ?1",
            params![id.as_str(), to.to_string(), ended],
        )?;
        Ok(())
    }

    /// Scans whose status is in `statuses` (the supervisor polls for
    /// RUNNING and ABORT-REQUESTED).
    pub fn scans_with_status(&self, statuses: &[ScanStatus]) -> Result<Vec<Scan>, StoreError> {
        let conn = self.lock();
        let mut out = Vec::new();
        let mut stmt = conn.prepare(
            "SELECT scan_id, name, target, target_type, status, created_ms, started_ms, ended_ms
             FROM tbl_scan_instance WHERE status = ?1 ORDER BY created_ms",
        )?;
        for status in statuses {
            let rows = stmt.query_map(params![status.to_string()], row_to_scan)?;
            for row in rows {
                out.push(row?);
            }
        }
        Ok(out)
    }

    /// Delete a scan row along with its results and logs.
    pub fn scan_delete(&self, id: &ScanId) -> Result<(), StoreError> {
        let conn = self.lock();
        conn.execute("DELETE FROM tbl_scan_results WHERE scan_id = ?1", params![id.as_str()])?;
        conn.execute("DELETE FROM tbl_scan_log WHERE scan_id = ?1", params![id.as_str()])?;
        conn.execute("DELETE FROM tbl_scan_instance WHERE scan_id = ?1", params![id.as_str()])?;
        Ok(())
    }

    // ── Results ─────────────────────────────────────────────────────────

    /// Idempotent event insert. Returns `true` if the row was new, `false`
    /// if `(scan_id, hash)` already existed (redelivery).
    pub fn event_store(&self, scan_id: &ScanId, event: &ScanEvent) -> Result<bool, StoreError> {
        let conn = self.lock();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO tbl_scan_results
             (scan_id, hash, type, generated, confidence, visibility, risk, module, data, source_event_hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                scan_id.as_str(),
                event.hash,
                event.event_type,
                event.generated,
                event.confidence,
                event.visibility,
                event.risk,
                event.module,
                event.data,
                event.source_event_hash,
            ],
        )?;
        Ok(inserted == 1)
    }

    pub fn event_count(&self, scan_id: &ScanId) -> Result<u64, StoreError> {
        let conn = self.lock();
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM tbl_scan_results WHERE scan_id = ?1",
            params![scan_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn events(&self, scan_id: &ScanId) -> Result<Vec<ScanEvent>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT hash, type, generated, confidence, visibility, risk, module, data, source_event_hash
             FROM tbl_scan_results WHERE scan_id = ?1 ORDER BY generated",
        )?;
        let rows = stmt.query_map(params![scan_id.as_str()], |row| {
            Ok(ScanEvent {
                hash: row.get(0)?,
                event_type: row.get(1)?,
                generated: row.get(2)?,
                confidence: row.get(3)?,
                visibility: row.get(4)?,
                risk: row.get(5)?,
                module: row.get(6)?,
                data: row.get(7)?,
                source_event_hash: row.get(8)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    // ── Scan logs ───────────────────────────────────────────────────────

    pub fn scan_log_append(&self, scan_id: &ScanId, record: &LogRecord) -> Result<(), StoreError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO tbl_scan_log (scan_id, time, level, component, message)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![scan_id.as_str(), record.time, record.level, record.component, record.message],
        )?;
        Ok(())
    }

    pub fn scan_logs(&self, scan_id: &ScanId) -> Result<Vec<LogRecord>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT time, level, component, message FROM tbl_scan_log
             WHERE scan_id = ?1 ORDER BY rowid",
        )?;
        let rows = stmt.query_map(params![scan_id.as_str()], |row| {
            Ok(LogRecord {
                time: row.get(0)?,
                level: row.get(1)?,
                component: row.get(2)?,
                message: row.get(3)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    // ── Worker registry ─────────────────────────────────────────────────

    /// Upsert from a heartbeat: register on first contact, refresh
    /// `last_seen` and status afterwards.
    pub fn worker_upsert(&self, hb: &Heartbeat, now_ms: u64) -> Result<(), StoreError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO tbl_workers
             (worker_id, name, host, queue_type, status, current_scan, last_seen_ms, registered_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
             ON CONFLICT(worker_id) DO UPDATE SET
                 name = excluded.name,
                 host = excluded.host,
                 queue_type = excluded.queue_type,
                 status = excluded.status,
                 current_scan = excluded.current_scan,
                 last_seen_ms = excluded.last_seen_ms",
            params![
                hb.worker_id.as_str(),
                hb.name,
                hb.host,
                hb.queue_type.to_string(),
                hb.status.to_string(),
                hb.current_scan,
                now_ms,
            ],
        )?;
        Ok(())
    }

    pub fn worker_get(&self, id: &WorkerId) -> Result<Option<WorkerRecord>, StoreError> {
        let conn = self.lock();
        let record = conn
            .query_row(
                "SELECT worker_id, name, host, queue_type, status, current_scan, last_seen_ms, registered_ms
                 FROM tbl_workers WHERE worker_id = ?1",
                params![id.as_str()],
                row_to_worker,
            )
            .optional()?;
        Ok(record)
    }

    pub fn worker_list(&self) -> Result<Vec<WorkerRecord>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT worker_id, name, host, queue_type, status, current_scan, last_seen_ms, registered_ms
             FROM tbl_workers ORDER BY registered_ms",
        )?;
        let rows = stmt.query_map([], row_to_worker)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Mark workers unseen for longer than `max_age_ms` as offline.
    /// Returns how many rows changed.
    pub fn workers_mark_stale_offline(&self, now_ms: u64, max_age_ms: u64) -> Result<usize, StoreError> {
        let cutoff = now_ms.saturating_sub(max_age_ms);
        let conn = self.lock();
        let changed = conn.execute(
            "UPDATE tbl_workers SET status = 'offline', current_scan = ''
             WHERE status != 'offline' AND last_seen_ms < ?1",
            params![cutoff],
        )?;
        Ok(changed)
    }

    /// Delete workers that have been offline past the cleanup timeout.
    /// The sweep is the only deleter; heartbeats re-register freely.
    pub fn workers_delete_offline(&self, now_ms: u64, cleanup_ms: u64) -> Result<usize, StoreError> {
        let cutoff = now_ms.saturating_sub(cleanup_ms);
        let conn = self.lock();
        let deleted = conn.execute(
            "DELETE FROM tbl_workers WHERE status = 'offline' AND last_seen_ms < ?1",
            params![cutoff],
        )?;
        Ok(deleted)
    }
}

fn row_to_scan(row: &rusqlite::Row<'_>) -> rusqlite::Result<Scan> {
    let status_text: String = row.get(4)?;
    let status = ScanStatus::parse(&status_text).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("unknown scan status {status_text:?}").into(),
        )
    })?;
    Ok(Scan {
        id: ScanId::new(row.get::<_, String>(0)?),
        name: row.get(1)?,
        target: row.get(2)?,
        target_type: row.get(3)?,
        status,
        created_ms: row.get(5)?,
        started_ms: row.get(6)?,
        ended_ms: row.get(7)?,
    })
}

fn row_to_worker(row: &rusqlite::Row<'_>) -> rusqlite::Result<WorkerRecord> {
    let queue_text: String = row.get(3)?;
    let status_text: String = row.get(4)?;
    let queue_type = QueueType::parse(&queue_text).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown queue type {queue_text:?}").into(),
        )
    })?;
    let status = WorkerStatus::parse(&status_text).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("unknown worker status {status_text:?}").into(),
        )
    })?;
    Ok(WorkerRecord {
        id: WorkerId::new(row.get::<_, String>(0)?),
        name: row.get(1)?,
        host: row.get(2)?,
        queue_type,
        status,
        current_scan: row.get(5)?,
        last_seen_ms: row.get(6)?,
        registered_ms: row.get(7)?,
    })
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
