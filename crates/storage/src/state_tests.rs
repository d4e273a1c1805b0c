// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use icarus_core::{Phase, SandboxId};

fn created(id: &str, at_ms: u64) -> Event {
    Event::JobCreated {
        id: JobId::from_string(id),
        task: "t".into(),
        project_path: "/tmp/p".into(),
        created_at_ms: at_ms,
    }
}

fn advanced(id: &str, status: JobStatus, at_ms: u64) -> Event {
    Event::JobAdvanced { id: JobId::from_string(id), status, error: None, comment: None, at_ms }
}

fn sample(id: &str, at_ms: u64, tool: &str) -> Event {
    Event::TelemetrySampled {
        job_id: JobId::from_string(id),
        cpu_percent: 10.0,
        ram_mb: 256.0,
        current_tool: tool.into(),
        at_ms,
    }
}

#[test]
fn job_created_is_insert_once() {
    let mut state = MaterializedState::default();
    state.apply_event(&created("job-a", 1));
    state.apply_event(&advanced("job-a", JobStatus::Building, 2));
    // Replayed creation must not reset the status
    state.apply_event(&created("job-a", 1));
    assert_eq!(state.get_job("job-a").unwrap().status, JobStatus::Building);
}

#[test]
fn illegal_transitions_are_ignored() {
    let mut state = MaterializedState::default();
    state.apply_event(&created("job-a", 1));
    state.apply_event(&advanced("job-a", JobStatus::Checking, 2));
    assert_eq!(state.get_job("job-a").unwrap().status, JobStatus::Pending);

    // Duplicate apply of a legal edge is a no-op the second time
    state.apply_event(&advanced("job-a", JobStatus::Building, 2));
    state.apply_event(&advanced("job-a", JobStatus::Building, 3));
    assert_eq!(state.get_job("job-a").unwrap().status, JobStatus::Building);
}

#[test]
fn pending_order_is_fifo_with_id_tiebreak() {
    let mut state = MaterializedState::default();
    state.apply_event(&created("job-b", 5));
    state.apply_event(&created("job-a", 5));
    state.apply_event(&created("job-c", 1));

    let order = state.pending_oldest_first();
    let names: Vec<&str> = order.iter().map(|id| id.as_str()).collect();
    assert_eq!(names, vec!["job-c", "job-a", "job-b"]);
}

#[test]
fn jobs_newest_first_filters_and_caps() {
    let mut state = MaterializedState::default();
    state.apply_event(&created("job-a", 1));
    state.apply_event(&created("job-b", 2));
    state.apply_event(&created("job-c", 3));
    state.apply_event(&advanced("job-b", JobStatus::Building, 4));

    let all = state.jobs_newest_first(2, None);
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].id, "job-c");
    assert_eq!(all[1].id, "job-b");

    let pending = state.jobs_newest_first(10, Some(JobStatus::Pending));
    assert_eq!(pending.len(), 2);
}

#[test]
fn active_count_tracks_slot_occupancy() {
    let mut state = MaterializedState::default();
    state.apply_event(&created("job-a", 1));
    state.apply_event(&created("job-b", 2));
    assert_eq!(state.active_count(), 0);

    state.apply_event(&advanced("job-a", JobStatus::Building, 3));
    state.apply_event(&advanced("job-b", JobStatus::Building, 3));
    assert_eq!(state.active_count(), 2);

    state.apply_event(&advanced("job-a", JobStatus::Checking, 4));
    state.apply_event(&advanced("job-a", JobStatus::AwaitingApproval, 5));
    assert_eq!(state.active_count(), 1);
}

#[test]
fn telemetry_keeps_latest_and_caps_history() {
    let mut state = MaterializedState::default();
    state.apply_event(&created("job-a", 1));

    for i in 0..(TELEMETRY_HISTORY as u64 + 10) {
        state.apply_event(&sample("job-a", 100 + i, "cargo"));
    }

    let ring = state.telemetry.get("job-a").unwrap();
    assert_eq!(ring.len(), TELEMETRY_HISTORY);
    assert_eq!(state.latest_telemetry("job-a").unwrap().at_ms, 100 + TELEMETRY_HISTORY as u64 + 9);
}

#[test]
fn telemetry_replay_is_idempotent() {
    let mut state = MaterializedState::default();
    state.apply_event(&created("job-a", 1));
    state.apply_event(&sample("job-a", 100, "bash"));
    state.apply_event(&sample("job-a", 100, "bash"));
    assert_eq!(state.telemetry.get("job-a").unwrap().len(), 1);
}

#[test]
fn telemetry_for_unknown_job_is_dropped() {
    let mut state = MaterializedState::default();
    state.apply_event(&sample("job-ghost", 100, "bash"));
    assert!(state.latest_telemetry("job-ghost").is_none());
}

#[test]
fn audit_is_write_once() {
    let mut state = MaterializedState::default();
    state.apply_event(&created("job-a", 1));
    state.apply_event(&Event::AuditRecorded {
        job_id: JobId::from_string("job-a"),
        payload: serde_json::json!({"summary": "ok"}),
        at_ms: 5,
    });
    state.apply_event(&Event::AuditRecorded {
        job_id: JobId::from_string("job-a"),
        payload: serde_json::json!({"summary": "tampered"}),
        at_ms: 9,
    });

    let audit = state.audit("job-a").unwrap();
    assert_eq!(audit.payload["summary"], "ok");
    assert_eq!(audit.created_at_ms, 5);
}

#[test]
fn sandbox_started_only_lands_in_matching_phase() {
    let mut state = MaterializedState::default();
    state.apply_event(&created("job-a", 1));
    state.apply_event(&advanced("job-a", JobStatus::Building, 2));
    state.apply_event(&Event::SandboxStarted {
        job_id: JobId::from_string("job-a"),
        phase: Phase::Build,
        sandbox_id: SandboxId::new("sb-1"),
    });
    assert!(state.get_job("job-a").unwrap().builder_sandbox_id.is_some());

    // A late start report for a phase the job already left is dropped
    state.apply_event(&advanced("job-a", JobStatus::Checking, 3));
    state.apply_event(&Event::SandboxStarted {
        job_id: JobId::from_string("job-a"),
        phase: Phase::Build,
        sandbox_id: SandboxId::new("sb-stale"),
    });
    let job = state.get_job("job-a").unwrap();
    assert!(job.builder_sandbox_id.is_none());
}

#[test]
fn snapshot_replay_equivalence() {
    // Applying events twice (snapshot + overlapping WAL tail) converges
    let events = vec![
        created("job-a", 1),
        advanced("job-a", JobStatus::Building, 2),
        sample("job-a", 3, "cargo"),
        advanced("job-a", JobStatus::Checking, 4),
        advanced("job-a", JobStatus::AwaitingApproval, 5),
    ];

    let mut once = MaterializedState::default();
    for e in &events {
        once.apply_event(e);
    }

    let mut twice = MaterializedState::default();
    for e in &events {
        twice.apply_event(e);
    }
    for e in &events {
        twice.apply_event(e);
    }

    assert_eq!(once.get_job("job-a").unwrap().status, twice.get_job("job-a").unwrap().status);
    assert_eq!(once.telemetry.get("job-a").unwrap().len(), twice.telemetry.get("job-a").unwrap().len());
}
