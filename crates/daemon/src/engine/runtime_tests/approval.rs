// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::adapters::DriverCall;
use crate::engine::test_helpers::*;
use crate::engine::EngineError;
use icarus_core::JobStatus;

#[tokio::test]
async fn approve_while_checking_is_a_conflict() {
    let mut ctx = setup();
    let job = ctx.submit("t").await;
    ctx.worker_completed(&job, None).await;
    assert_eq!(ctx.status(&job), JobStatus::Checking);

    let err = ctx.engine.approve(job.id.as_str(), true, None).await.unwrap_err();
    assert!(matches!(err, EngineError::ApprovalConflict { status: JobStatus::Checking, .. }));
    // No state change
    assert_eq!(ctx.status(&job), JobStatus::Checking);
}

#[tokio::test]
async fn approve_unknown_job_is_not_found() {
    let mut ctx = setup();
    let err = ctx.engine.approve("job-ghost", true, None).await.unwrap_err();
    assert_eq!(err, EngineError::JobNotFound("job-ghost".into()));
}

#[tokio::test]
async fn duplicate_approval_conflicts_after_the_first() {
    let mut ctx = setup();
    let job = ctx.submit("t").await;
    ctx.run_to_awaiting_approval(&job, serde_json::json!({"summary": "ok"})).await;

    assert_eq!(
        ctx.engine.approve(job.id.as_str(), true, None).await.unwrap(),
        JobStatus::Approved
    );
    ctx.settle().await;

    // Replay is refused once the gate has resolved
    let err = ctx.engine.approve(job.id.as_str(), true, None).await.unwrap_err();
    assert!(matches!(err, EngineError::ApprovalConflict { .. }));
}

#[tokio::test]
async fn reject_destroys_the_workspace() {
    let mut ctx = setup();
    let job = ctx.submit("t").await;
    ctx.run_to_awaiting_approval(&job, serde_json::json!({"summary": "meh"})).await;

    let status =
        ctx.engine.approve(job.id.as_str(), false, Some("not today".into())).await.unwrap();
    assert_eq!(status, JobStatus::Rejected);
    ctx.settle().await;

    let rejected = ctx.job(&job);
    assert_eq!(rejected.status, JobStatus::Rejected);
    assert_eq!(rejected.review_comment.as_deref(), Some("not today"));
    assert!(rejected.completed_at_ms.is_some());
    assert!(ctx.driver.calls().contains(&DriverCall::RemoveVolume(job.workspace_volume())));
    // Nothing was published
    assert!(ctx.publisher.published().is_empty());
}

#[tokio::test]
async fn commit_failure_fails_the_job_with_the_remote_message() {
    let mut ctx = setup();
    ctx.publisher.fail_with("remote: permission denied");

    let job = ctx.submit("t").await;
    ctx.run_to_awaiting_approval(&job, serde_json::json!({"summary": "ok"})).await;
    ctx.engine.approve(job.id.as_str(), true, None).await.unwrap();
    ctx.settle().await;

    let failed = ctx.job(&job);
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.error_message.as_deref(), Some("remote: permission denied"));
    // Failed jobs lose their workspace
    assert!(ctx.driver.calls().contains(&DriverCall::RemoveVolume(job.workspace_volume())));
}
