// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::adapters::DriverCall;
use crate::engine::test_helpers::*;
use icarus_core::{AdmissionLevel, Event, JobStatus, SandboxId, TimerId};
use std::time::Duration;

#[tokio::test]
async fn phase_deadline_fails_the_job() {
    let mut ctx = setup();
    let job = ctx.submit("t").await;
    assert_eq!(ctx.status(&job), JobStatus::Building);

    // Default build deadline is 600s
    ctx.advance_and_fire(Duration::from_secs(601)).await;

    let failed = ctx.job(&job);
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.error_message.as_deref(), Some("phase timeout"));
    assert!(ctx.driver.calls().contains(&DriverCall::Kill(SandboxId::new("sb-1"))));
}

#[tokio::test]
async fn completion_cancels_the_phase_deadline() {
    let mut ctx = setup();
    let job = ctx.submit("t").await;
    ctx.worker_completed(&job, None).await;
    assert_eq!(ctx.status(&job), JobStatus::Checking);

    // Past the old build deadline: nothing fires for the build phase,
    // and the job is unaffected.
    ctx.advance_and_fire(Duration::from_secs(299)).await;
    assert_eq!(ctx.status(&job), JobStatus::Checking);
}

#[tokio::test]
async fn stale_deadline_event_loses_the_race() {
    let mut ctx = setup();
    let job = ctx.submit("t").await;
    ctx.worker_completed(&job, None).await;

    // A deadline event that raced the completion and lost: the job is no
    // longer in the build phase, so the attempt is a no-op.
    ctx.engine
        .step(Event::TimerFired { id: TimerId::phase_deadline(&job.id, icarus_core::Phase::Build) })
        .await;
    ctx.settle().await;

    assert_eq!(ctx.status(&job), JobStatus::Checking);
}

#[tokio::test]
async fn check_phase_has_its_own_deadline() {
    let mut ctx = setup();
    let job = ctx.submit("t").await;
    ctx.worker_completed(&job, None).await;

    // Default check deadline is 300s
    ctx.advance_and_fire(Duration::from_secs(301)).await;

    let failed = ctx.job(&job);
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.error_message.as_deref(), Some("phase timeout"));
}

#[tokio::test]
async fn red_pause_can_convert_into_phase_timeout() {
    let mut ctx = setup();
    let job = ctx.submit("t").await;

    // RED outlasts the job's remaining deadline; timers are wall-clock,
    // so the pause converts into a phase timeout.
    ctx.set_level(AdmissionLevel::Red).await;
    ctx.advance_and_fire(Duration::from_secs(601)).await;

    let failed = ctx.job(&job);
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.error_message.as_deref(), Some("phase timeout"));
    // The sandbox was killed on timeout, not left for the sentinel resume
    assert!(ctx.driver.calls().contains(&DriverCall::Kill(SandboxId::new("sb-1"))));
}

#[tokio::test]
async fn outer_job_deadline_caps_total_wall_time() {
    let mut ctx = setup_with(|c| c.orchestrator.job_timeout_seconds = 100);
    let job = ctx.submit("t").await;

    // The outer cap (100s) fires long before the phase deadline (600s)
    ctx.advance_and_fire(Duration::from_secs(101)).await;

    let failed = ctx.job(&job);
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.error_message.as_deref(), Some("job timeout"));
}

#[tokio::test]
async fn awaiting_approval_has_no_timeout() {
    let mut ctx = setup();
    let job = ctx.submit("t").await;
    ctx.run_to_awaiting_approval(&job, serde_json::json!({"summary": "ok"})).await;

    // A job may sit at the gate indefinitely
    ctx.advance_and_fire(Duration::from_secs(365 * 24 * 3600)).await;
    assert_eq!(ctx.status(&job), JobStatus::AwaitingApproval);
}

#[tokio::test]
async fn at_most_one_terminal_transition() {
    let mut ctx = setup();
    let job = ctx.submit("t").await;

    // Deadline fires and, in the same instant, the worker's completion
    // arrives. The first processed event commits; the loser is a no-op.
    ctx.advance_and_fire(Duration::from_secs(601)).await;
    ctx.worker_completed(&job, None).await;

    let final_job = ctx.job(&job);
    assert_eq!(final_job.status, JobStatus::Failed);

    let terminal_count = ctx
        .wal
        .lock()
        .entries_after(0)
        .unwrap()
        .into_iter()
        .filter(|e| {
            matches!(
                &e.event,
                Event::JobAdvanced { id, status, .. } if *id == job.id && status.is_terminal()
            )
        })
        .count();
    assert_eq!(terminal_count, 1);
}
