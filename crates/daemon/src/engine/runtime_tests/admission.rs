// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::engine::test_helpers::*;
use crate::engine::EngineError;
use icarus_core::{AdmissionLevel, JobStatus};

#[tokio::test]
async fn admits_up_to_max_concurrent() {
    let mut ctx = setup_with(|c| c.orchestrator.max_concurrent_jobs = 2);

    let a = ctx.submit("t1").await;
    let b = ctx.submit("t2").await;
    let c = ctx.submit("t3").await;

    assert_eq!(ctx.status(&a), JobStatus::Building);
    assert_eq!(ctx.status(&b), JobStatus::Building);
    assert_eq!(ctx.status(&c), JobStatus::Pending);

    // The bounded-parallelism invariant holds
    assert!(ctx.engine.state.lock().active_count() <= 2);
}

#[tokio::test]
async fn freed_slot_admits_oldest_pending_first() {
    let mut ctx = setup_with(|c| c.orchestrator.max_concurrent_jobs = 1);

    let t1 = ctx.submit("t1").await;
    let t2 = ctx.submit("t2").await;
    let t3 = ctx.submit("t3").await;

    assert_eq!(ctx.status(&t1), JobStatus::Building);
    assert_eq!(ctx.status(&t2), JobStatus::Pending);
    assert_eq!(ctx.status(&t3), JobStatus::Pending);

    // t1 runs its pipeline; the slot stays occupied through build+check
    ctx.worker_completed(&t1, None).await;
    assert_eq!(ctx.status(&t1), JobStatus::Checking);
    assert_eq!(ctx.status(&t2), JobStatus::Pending);

    // Entering awaiting_approval leaves the active set and frees the slot
    ctx.worker_completed(&t1, Some(serde_json::json!({"summary": "ok"}))).await;
    assert_eq!(ctx.status(&t1), JobStatus::AwaitingApproval);
    assert_eq!(ctx.status(&t2), JobStatus::Building);
    assert_eq!(ctx.status(&t3), JobStatus::Pending);

    // t2 fails; t3 (the only remaining pending job) is admitted next
    ctx.worker_errored(&t2, "boom").await;
    assert_eq!(ctx.status(&t2), JobStatus::Failed);
    assert_eq!(ctx.status(&t3), JobStatus::Building);
}

#[tokio::test]
async fn red_level_defers_admission() {
    let mut ctx = setup();
    ctx.set_level(AdmissionLevel::Red).await;

    let job = ctx.submit("t1").await;
    assert_eq!(ctx.status(&job), JobStatus::Pending);

    // Deferral is not an error; the job admits when the level clears
    ctx.set_level(AdmissionLevel::Green).await;
    assert_eq!(ctx.status(&job), JobStatus::Building);
}

#[tokio::test]
async fn yellow_level_still_admits() {
    let mut ctx = setup();
    ctx.set_level(AdmissionLevel::Yellow).await;

    let job = ctx.submit("t1").await;
    assert_eq!(ctx.status(&job), JobStatus::Building);
}

#[tokio::test]
async fn saturated_submission_refused_when_opted_in() {
    let mut ctx = setup_with(|c| {
        c.orchestrator.max_concurrent_jobs = 1;
        c.orchestrator.refuse_when_saturated = true;
    });
    ctx.set_level(AdmissionLevel::Red).await;
    ctx.submit("t1").await;

    let result = ctx
        .engine
        .submit("t2".to_string(), std::path::PathBuf::from("/tmp/project"))
        .await;
    assert_eq!(result.unwrap_err(), EngineError::Saturated);
}

#[tokio::test]
async fn empty_task_is_rejected() {
    let mut ctx = setup();
    let result = ctx.engine.submit(String::new(), std::path::PathBuf::from("/tmp/p")).await;
    assert!(matches!(result, Err(EngineError::InvalidRequest(_))));
}

#[tokio::test]
async fn task_at_max_length_is_accepted() {
    let mut ctx = setup();
    let task = "x".repeat(icarus_core::MAX_TASK_LEN);
    let job = ctx.engine.submit(task, std::path::PathBuf::from("/tmp/p")).await.unwrap();
    ctx.settle().await;
    assert_eq!(ctx.status(&job), JobStatus::Building);

    let too_long = "x".repeat(icarus_core::MAX_TASK_LEN + 1);
    let result = ctx.engine.submit(too_long, std::path::PathBuf::from("/tmp/p")).await;
    assert!(matches!(result, Err(EngineError::InvalidRequest(_))));
}
