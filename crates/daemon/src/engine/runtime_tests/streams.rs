// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::engine::test_helpers::*;
use crate::engine::StreamMessage;
use icarus_core::JobStatus;
use tokio::sync::mpsc;

/// Drain every status update currently buffered on a subscriber.
fn drain_statuses(rx: &mut mpsc::Receiver<StreamMessage>) -> Vec<JobStatus> {
    let mut statuses = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        if let StreamMessage::StatusUpdate { status } = msg {
            statuses.push(status);
        }
    }
    statuses
}

#[tokio::test]
async fn subscriber_sees_every_transition_in_order() {
    let mut ctx = setup();
    let submitted = ctx
        .engine
        .submit("t".to_string(), std::path::PathBuf::from("/tmp/p"))
        .await
        .unwrap();
    let mut rx = ctx.hub.subscribe(submitted.id.as_str());
    ctx.settle().await;

    let job = ctx.job(&submitted);
    ctx.run_to_awaiting_approval(&job, serde_json::json!({"summary": "ok"})).await;
    ctx.engine.approve(job.id.as_str(), true, Some("lgtm".into())).await.unwrap();
    ctx.settle().await;

    assert_eq!(
        drain_statuses(&mut rx),
        vec![
            JobStatus::Building,
            JobStatus::Checking,
            JobStatus::AwaitingApproval,
            JobStatus::Approved,
            JobStatus::Completed,
        ]
    );
}

#[tokio::test]
async fn mid_flight_subscriber_sees_the_suffix_ending_terminal() {
    let mut ctx = setup();
    let job = ctx.submit("t").await;
    ctx.worker_completed(&job, None).await;
    assert_eq!(ctx.status(&job), JobStatus::Checking);

    // B connects after the build transition was broadcast
    let mut rx = ctx.hub.subscribe(job.id.as_str());

    ctx.worker_completed(&job, Some(serde_json::json!({"summary": "ok"}))).await;
    ctx.engine.approve(job.id.as_str(), true, None).await.unwrap();
    ctx.settle().await;

    let seen = drain_statuses(&mut rx);
    assert_eq!(
        seen,
        vec![JobStatus::AwaitingApproval, JobStatus::Approved, JobStatus::Completed]
    );
}

#[tokio::test]
async fn terminal_status_is_the_last_message() {
    let mut ctx = setup();
    let job = ctx.submit("t").await;
    let mut rx = ctx.hub.subscribe(job.id.as_str());

    ctx.worker_errored(&job, "boom").await;

    let mut last = None;
    while let Ok(msg) = rx.try_recv() {
        last = Some(msg);
    }
    assert_eq!(last, Some(StreamMessage::StatusUpdate { status: JobStatus::Failed }));

    // Logs after the terminal transition are suppressed
    ctx.hub.publish_log(job.id.as_str(), "straggler".into());
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn post_terminal_subscriber_gets_terminal_then_close() {
    let mut ctx = setup();
    let job = ctx.submit("t").await;
    ctx.worker_errored(&job, "boom").await;

    let mut rx = ctx.hub.subscribe(job.id.as_str());
    assert_eq!(
        rx.recv().await,
        Some(StreamMessage::StatusUpdate { status: JobStatus::Failed })
    );
    assert_eq!(rx.recv().await, None);
}
