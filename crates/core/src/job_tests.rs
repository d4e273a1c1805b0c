// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::sandbox::{Phase, SandboxId};

fn job() -> Job {
    Job::new(JobId::from_string("job-t1"), "task".into(), "/tmp/proj".into(), 1_000)
}

#[test]
fn legal_edges_are_exactly_the_state_machine() {
    use JobStatus::*;
    let all = [Pending, Building, Checking, AwaitingApproval, Approved, Rejected, Completed, Failed];
    let legal = [
        (Pending, Building),
        (Pending, Failed),
        (Building, Checking),
        (Building, Failed),
        (Checking, AwaitingApproval),
        (Checking, Failed),
        (AwaitingApproval, Approved),
        (AwaitingApproval, Rejected),
        (Approved, Completed),
        (Approved, Failed),
    ];
    for from in all {
        for to in all {
            let expected = legal.contains(&(from, to));
            assert_eq!(from.can_advance_to(to), expected, "{} -> {}", from, to);
        }
    }
}

#[test]
fn terminal_statuses_never_advance() {
    use JobStatus::*;
    for terminal in [Completed, Failed, Rejected] {
        for to in [Pending, Building, Checking, AwaitingApproval, Approved, Completed, Failed] {
            assert!(!terminal.can_advance_to(to));
        }
    }
}

#[test]
fn active_set_is_building_checking_approved() {
    use JobStatus::*;
    assert!(Building.is_active());
    assert!(Checking.is_active());
    assert!(Approved.is_active());
    assert!(!Pending.is_active());
    assert!(!AwaitingApproval.is_active());
    assert!(!Completed.is_active());
}

#[test]
fn advance_to_terminal_sets_completed_at() {
    let mut job = job();
    job.advance(JobStatus::Building, None, None, 2_000);
    assert_eq!(job.completed_at_ms, None);

    job.advance(JobStatus::Failed, Some("boom".into()), None, 3_000);
    assert_eq!(job.completed_at_ms, Some(3_000));
    assert_eq!(job.error_message.as_deref(), Some("boom"));
}

#[test]
fn sandbox_handles_never_coexist() {
    let mut job = job();
    job.advance(JobStatus::Building, None, None, 2_000);
    job.set_sandbox(Phase::Build, SandboxId::new("sb-builder"));
    assert!(job.builder_sandbox_id.is_some());

    job.advance(JobStatus::Checking, None, None, 3_000);
    assert!(job.builder_sandbox_id.is_none());
    job.set_sandbox(Phase::Check, SandboxId::new("sb-checker"));
    assert!(job.checker_sandbox_id.is_some());
    assert!(job.builder_sandbox_id.is_none());

    job.advance(JobStatus::AwaitingApproval, None, None, 4_000);
    assert!(job.checker_sandbox_id.is_none());
}

#[test]
fn active_sandbox_tracks_phase() {
    let mut job = job();
    assert!(job.active_sandbox().is_none());

    job.advance(JobStatus::Building, None, None, 2_000);
    job.set_sandbox(Phase::Build, SandboxId::new("sb-1"));
    let (phase, id) = job.active_sandbox().unwrap();
    assert_eq!(phase, Phase::Build);
    assert_eq!(id.as_str(), "sb-1");
}

#[test]
fn advance_records_review_comment() {
    let mut job = job();
    job.advance(JobStatus::Building, None, None, 2_000);
    job.advance(JobStatus::Checking, None, None, 3_000);
    job.advance(JobStatus::AwaitingApproval, None, None, 4_000);
    job.advance(JobStatus::Approved, None, Some("lgtm".into()), 5_000);
    assert_eq!(job.review_comment.as_deref(), Some("lgtm"));
    assert_eq!(job.completed_at_ms, None);
}

#[test]
fn workspace_volume_is_per_job() {
    assert_eq!(job().workspace_volume(), "icarus_workspace_job-t1");
}

#[test]
fn status_parse_round_trips() {
    use JobStatus::*;
    for status in [Pending, Building, Checking, AwaitingApproval, Approved, Rejected, Completed, Failed]
    {
        assert_eq!(JobStatus::parse(&status.to_string()), Some(status));
    }
    assert_eq!(JobStatus::parse("bogus"), None);
}

#[test]
fn status_serde_uses_snake_case() {
    let json = serde_json::to_string(&JobStatus::AwaitingApproval).unwrap();
    assert_eq!(json, "\"awaiting_approval\"");
}
