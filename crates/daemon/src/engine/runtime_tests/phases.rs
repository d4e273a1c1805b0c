// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::adapters::{DriverCall, FakeSandboxDriver};
use crate::engine::test_helpers::*;
use icarus_core::{Event, JobStatus, SandboxId};

fn created_names(driver: &FakeSandboxDriver) -> Vec<String> {
    driver
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            DriverCall::Create(name) => Some(name),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn happy_path_reaches_completed() {
    let mut ctx = setup();
    let job = ctx.submit("implement the parser").await;

    // BUILD: builder sandbox created and started with the rw workspace
    assert_eq!(ctx.status(&job), JobStatus::Building);
    let names = created_names(&ctx.driver);
    assert_eq!(names, vec![format!("icarus_builder_{}", job.id)]);
    assert!(ctx.driver.calls().contains(&DriverCall::CreateVolume(job.workspace_volume())));
    assert!(ctx.job(&job).builder_sandbox_id.is_some());

    // Builder completes; checker takes over with its own sandbox
    ctx.worker_completed(&job, None).await;
    assert_eq!(ctx.status(&job), JobStatus::Checking);
    let snapshot = ctx.job(&job);
    assert!(snapshot.builder_sandbox_id.is_none());
    assert!(snapshot.checker_sandbox_id.is_some());
    assert!(ctx.driver.calls().contains(&DriverCall::Kill(SandboxId::new("sb-1"))));
    assert!(ctx.driver.calls().contains(&DriverCall::Remove(SandboxId::new("sb-1"))));

    // Checker completes with an audit payload
    ctx.worker_completed(&job, Some(serde_json::json!({"summary": "ok"}))).await;
    assert_eq!(ctx.status(&job), JobStatus::AwaitingApproval);
    let audit = ctx.engine.state.lock().audit(job.id.as_str()).cloned().unwrap();
    assert_eq!(audit.payload["summary"], "ok");

    // Approve; commit runs and the job completes
    let status = ctx.engine.approve(job.id.as_str(), true, Some("lgtm".into())).await.unwrap();
    assert_eq!(status, JobStatus::Approved);
    ctx.settle().await;

    let done = ctx.job(&job);
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.review_comment.as_deref(), Some("lgtm"));
    assert!(done.completed_at_ms.is_some());
    assert_eq!(ctx.publisher.published(), vec![job.id]);

    // The completed workspace volume is the delivered artifact
    assert!(!ctx.driver.calls().contains(&DriverCall::RemoveVolume(job.workspace_volume())));
}

#[tokio::test]
async fn transitions_are_persisted_in_order() {
    let mut ctx = setup();
    let job = ctx.submit("t").await;
    ctx.run_to_awaiting_approval(&job, serde_json::json!({"summary": "ok"})).await;
    ctx.engine.approve(job.id.as_str(), true, None).await.unwrap();
    ctx.settle().await;

    let statuses: Vec<JobStatus> = ctx
        .wal
        .lock()
        .entries_after(0)
        .unwrap()
        .into_iter()
        .filter_map(|entry| match entry.event {
            Event::JobAdvanced { id, status, .. } if id == job.id => Some(status),
            _ => None,
        })
        .collect();
    assert_eq!(
        statuses,
        vec![
            JobStatus::Building,
            JobStatus::Checking,
            JobStatus::AwaitingApproval,
            JobStatus::Approved,
            JobStatus::Completed,
        ]
    );

    // The audit record was durable before the transition it justifies
    let entries = ctx.wal.lock().entries_after(0).unwrap();
    let audit_seq = entries
        .iter()
        .find(|e| matches!(e.event, Event::AuditRecorded { .. }))
        .map(|e| e.seq)
        .unwrap();
    let awaiting_seq = entries
        .iter()
        .find(|e| {
            matches!(
                e.event,
                Event::JobAdvanced { status: JobStatus::AwaitingApproval, .. }
            )
        })
        .map(|e| e.seq)
        .unwrap();
    assert!(audit_seq < awaiting_seq);
}

#[tokio::test]
async fn checker_mount_is_read_only() {
    let mut ctx = setup();
    let job = ctx.submit("t").await;
    ctx.worker_completed(&job, None).await;

    let names = created_names(&ctx.driver);
    assert_eq!(names.len(), 2);
    assert!(names[1].starts_with("icarus_checker_"));
}

#[tokio::test]
async fn error_callback_fails_the_job() {
    let mut ctx = setup();
    let job = ctx.submit("t").await;

    ctx.worker_errored(&job, "llm 429").await;

    let failed = ctx.job(&job);
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.error_message.as_deref(), Some("llm 429"));
    assert!(failed.builder_sandbox_id.is_none());
    // Sandbox removed and workspace destroyed
    assert!(ctx.driver.calls().contains(&DriverCall::Remove(SandboxId::new("sb-1"))));
    assert!(ctx.driver.calls().contains(&DriverCall::RemoveVolume(job.workspace_volume())));
}

#[tokio::test]
async fn checker_error_fails_the_job() {
    let mut ctx = setup();
    let job = ctx.submit("t").await;
    ctx.worker_completed(&job, None).await;

    ctx.worker_errored(&job, "audit crashed").await;
    assert_eq!(ctx.status(&job), JobStatus::Failed);
    assert_eq!(ctx.job(&job).error_message.as_deref(), Some("audit crashed"));
}

#[tokio::test]
async fn stale_completion_callback_is_a_noop() {
    let mut ctx = setup();
    let job = ctx.submit("t").await;
    ctx.run_to_awaiting_approval(&job, serde_json::json!({"summary": "ok"})).await;

    // Re-posting the checker's completion after the job moved on
    ctx.worker_completed(&job, Some(serde_json::json!({"summary": "dup"}))).await;

    assert_eq!(ctx.status(&job), JobStatus::AwaitingApproval);
    let audit = ctx.engine.state.lock().audit(job.id.as_str()).cloned().unwrap();
    assert_eq!(audit.payload["summary"], "ok");
}

#[tokio::test]
async fn spawn_failure_is_a_phase_failure() {
    let mut ctx = setup();
    ctx.driver.fail_next_create(crate::adapters::DriverError::ImageNotFound(
        "icarus-builder:latest".into(),
    ));

    let job = ctx.submit("t").await;

    let failed = ctx.job(&job);
    assert_eq!(failed.status, JobStatus::Failed);
    assert!(failed.error_message.as_deref().unwrap().contains("sandbox spawn failed"));
    assert!(failed.error_message.as_deref().unwrap().contains("image not found"));
}

#[tokio::test]
async fn audit_exists_iff_checker_completed() {
    let mut ctx = setup();
    let job = ctx.submit("t").await;
    assert!(ctx.engine.state.lock().audit(job.id.as_str()).is_none());

    ctx.worker_errored(&job, "died in build").await;
    // Never reached awaiting_approval, so no audit record
    assert!(ctx.engine.state.lock().audit(job.id.as_str()).is_none());
}

#[tokio::test]
async fn late_start_report_for_a_finished_job_is_torn_down() {
    let mut ctx = setup();
    let job = ctx.submit("t").await;
    ctx.worker_errored(&job, "died early").await;
    assert_eq!(ctx.status(&job), JobStatus::Failed);

    // A start report that raced the failure and lost: the sandbox has
    // nothing to do and is killed, and no handle is resurrected.
    ctx.engine
        .step(Event::SandboxStarted {
            job_id: job.id,
            phase: icarus_core::Phase::Build,
            sandbox_id: SandboxId::new("sb-late"),
        })
        .await;
    ctx.settle().await;

    assert!(ctx.driver.calls().contains(&DriverCall::Kill(SandboxId::new("sb-late"))));
    assert!(ctx.job(&job).builder_sandbox_id.is_none());
}

#[tokio::test]
async fn shutdown_fails_in_flight_jobs_and_kills_sandboxes() {
    let mut ctx = setup();
    let job = ctx.submit("t").await;
    assert_eq!(ctx.status(&job), JobStatus::Building);

    ctx.engine.shutdown().await;

    let failed = ctx.job(&job);
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.error_message.as_deref(), Some("shutdown"));
    assert!(ctx.driver.calls().contains(&DriverCall::Kill(SandboxId::new("sb-1"))));

    // Draining engines refuse new work
    let result = ctx.engine.submit("late".to_string(), "/tmp/p".into()).await;
    assert!(matches!(result, Err(crate::engine::EngineError::ShuttingDown)));
}
