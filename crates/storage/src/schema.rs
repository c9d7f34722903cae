// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-plane schema.
//!
//! `(scan_id, hash)` on results is the dedup key: redelivered events hit
//! the unique index and land as no-ops via `INSERT OR IGNORE`.

use crate::error::StoreError;
use rusqlite::Connection;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tbl_scan_instance (
    scan_id     TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    target      TEXT NOT NULL,
    target_type TEXT NOT NULL,
    status      TEXT NOT NULL,
    created_ms  INTEGER NOT NULL,
    started_ms  INTEGER,
    ended_ms    INTEGER
);

CREATE TABLE IF NOT EXISTS tbl_scan_results (
    scan_id           TEXT NOT NULL,
    hash              TEXT NOT NULL,
    type              TEXT NOT NULL,
    generated         REAL NOT NULL,
    confidence        INTEGER NOT NULL,
    visibility        INTEGER NOT NULL,
    risk              INTEGER NOT NULL,
    module            TEXT NOT NULL,
    data              TEXT NOT NULL,
    source_event_hash TEXT NOT NULL,
    PRIMARY KEY (scan_id, hash)
);

CREATE TABLE IF NOT EXISTS tbl_scan_log (
    scan_id   TEXT NOT NULL,
    time      REAL NOT NULL,
    level     TEXT NOT NULL,
    component TEXT NOT NULL,
    message   TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_scan_log_scan ON tbl_scan_log (scan_id, time);

CREATE TABLE IF NOT EXISTS tbl_workers (
    worker_id     TEXT PRIMARY KEY,
    name          TEXT NOT NULL,
    host          TEXT NOT NULL,
    queue_type    TEXT NOT NULL,
    status        TEXT NOT NULL,
    current_scan  TEXT NOT NULL DEFAULT '',
    last_seen_ms  INTEGER NOT NULL,
    registered_ms INTEGER NOT NULL
);
";

pub(crate) fn init(conn: &Connection) -> Result<(), StoreError> {
    // WAL keeps readers (worker abort bridges) off the writer's back;
    // the busy timeout covers the remaining writer/writer overlap.
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

pub(crate) const LOCAL_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tbl_scan_instance (
    scan_id     TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    target      TEXT NOT NULL,
    status      TEXT NOT NULL
);
";
