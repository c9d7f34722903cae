// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    created        = { ScanStatus::Created, "CREATED" },
    running        = { ScanStatus::Running, "RUNNING" },
    abort_requested = { ScanStatus::AbortRequested, "ABORT-REQUESTED" },
    aborted        = { ScanStatus::Aborted, "ABORTED" },
    finished       = { ScanStatus::Finished, "FINISHED" },
    error_failed   = { ScanStatus::ErrorFailed, "ERROR-FAILED" },
)]
fn display_parse_roundtrip(status: ScanStatus, wire: &str) {
    assert_eq!(status.to_string(), wire);
    assert_eq!(ScanStatus::parse(wire), Some(status));
}

#[test]
fn parse_rejects_unknown() {
    assert_eq!(ScanStatus::parse("PAUSED"), None);
}

#[test]
fn terminal_and_active_partition() {
    for status in [
        ScanStatus::Created,
        ScanStatus::Running,
        ScanStatus::AbortRequested,
        ScanStatus::Aborted,
        ScanStatus::Finished,
        ScanStatus::ErrorFailed,
    ] {
        // A status is never both terminal and active.
        assert!(!(status.is_terminal() && status.is_active()), "{status}");
    }
    assert!(ScanStatus::Running.is_active());
    assert!(ScanStatus::AbortRequested.is_active());
    assert!(!ScanStatus::Created.is_active());
}

#[parameterized(
    running_finish    = { ScanStatus::Running, ScanStatus::Finished, true },
    running_fail      = { ScanStatus::Running, ScanStatus::ErrorFailed, true },
    running_abort_req = { ScanStatus::Running, ScanStatus::AbortRequested, true },
    abort_req_aborted = { ScanStatus::AbortRequested, ScanStatus::Aborted, true },
    abort_req_finish  = { ScanStatus::AbortRequested, ScanStatus::Finished, true },
    abort_rescind     = { ScanStatus::AbortRequested, ScanStatus::Running, false },
    finished_stuck    = { ScanStatus::Finished, ScanStatus::Running, false },
    aborted_stuck     = { ScanStatus::Aborted, ScanStatus::Finished, false },
    created_skip      = { ScanStatus::Created, ScanStatus::Finished, false },
)]
fn transition_rules(from: ScanStatus, to: ScanStatus, allowed: bool) {
    assert_eq!(from.may_transition(to), allowed);
}

#[test]
fn terminal_states_admit_nothing() {
    for terminal in [ScanStatus::Aborted, ScanStatus::Finished, ScanStatus::ErrorFailed] {
        for to in [
            ScanStatus::Created,
            ScanStatus::Running,
            ScanStatus::AbortRequested,
            ScanStatus::Aborted,
            ScanStatus::Finished,
            ScanStatus::ErrorFailed,
        ] {
            assert!(!terminal.may_transition(to), "{terminal} -> {to}");
        }
    }
}

#[test]
fn status_serializes_as_wire_string() {
    let json = serde_json::to_string(&ScanStatus::AbortRequested).unwrap();
    assert_eq!(json, "\"ABORT-REQUESTED\"");
}
