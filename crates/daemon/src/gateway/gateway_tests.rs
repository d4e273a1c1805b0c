// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::adapters::{FakeCommitPublisher, FakeSandboxDriver};
use crate::config::Config;
use crate::engine::{BroadcastHub, Engine, EngineDeps};
use axum::body::Body;
use axum::http::Request;
use icarus_core::{AdmissionLevel, FakeClock};
use icarus_storage::{MaterializedState, Wal};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    engine: EngineHandle,
    #[allow(dead_code)]
    driver: FakeSandboxDriver,
    #[allow(dead_code)]
    level_tx: watch::Sender<AdmissionLevel>,
    _dir: tempfile::TempDir,
}

/// Spin up a real engine loop over fakes and wrap it in the router.
fn test_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let driver = FakeSandboxDriver::new();
    let publisher = FakeCommitPublisher::new();
    let clock = FakeClock::new();
    let hub = BroadcastHub::new();
    let (level_tx, level_rx) = watch::channel(AdmissionLevel::Green);
    let wal = Arc::new(Mutex::new(Wal::open(&dir.path().join("events.wal"), 0).unwrap()));

    let (engine, handle, rx) = Engine::new(
        EngineDeps {
            driver: Arc::new(driver.clone()),
            publisher: Arc::new(publisher.clone()),
            state: Arc::new(Mutex::new(MaterializedState::default())),
            wal,
            level_rx,
        },
        Config::default(),
        hub,
        clock,
    );
    tokio::spawn(engine.run(rx));

    TestApp { router: router(handle.clone()), engine: handle, driver, level_tx, _dir: dir }
}

async fn request(app: &TestApp, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1 << 20).await.unwrap();
    let body = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn get(app: &TestApp, uri: &str) -> (StatusCode, serde_json::Value) {
    request(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

async fn post_json(
    app: &TestApp,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    request(
        app,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
    )
    .await
}

/// Poll until the job reaches `status` (the engine loop runs concurrently).
async fn wait_for_status(app: &TestApp, job_id: &str, status: JobStatus) {
    for _ in 0..200 {
        if app.engine.job(job_id).map(|j| j.status) == Some(status) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!(
        "job {} never reached {} (now {:?})",
        job_id,
        status,
        app.engine.job(job_id).map(|j| j.status)
    );
}

async fn spawn_one(app: &TestApp, task: &str) -> String {
    let (status, body) =
        post_json(app, "/jobs/spawn", json!({"task": task, "project_path": "/tmp/proj"})).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "pending");
    body["job_id"].as_str().unwrap().to_string()
}

/// Drive a spawned job to awaiting_approval through callbacks.
async fn run_to_awaiting(app: &TestApp, job_id: &str) {
    wait_for_status(app, job_id, JobStatus::Building).await;
    post_json(app, &format!("/jobs/{}/callback", job_id), json!({"status": "completed"})).await;
    wait_for_status(app, job_id, JobStatus::Checking).await;
    post_json(
        app,
        &format!("/jobs/{}/callback", job_id),
        json!({"status": "completed", "audit_report": {"summary": "ok"}}),
    )
    .await;
    wait_for_status(app, job_id, JobStatus::AwaitingApproval).await;
}

#[tokio::test]
async fn root_reports_operational() {
    let app = test_app();
    let (status, body) = get(&app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "ICARUS Orchestrator");
    assert_eq!(body["status"], "operational");
}

#[tokio::test]
async fn spawn_validates_the_body() {
    let app = test_app();

    let (status, _) = post_json(&app, "/jobs/spawn", json!({"project_path": "/tmp/p"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) =
        post_json(&app, "/jobs/spawn", json!({"task": "", "project_path": "/tmp/p"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post_json(&app, "/jobs/spawn", json!({"task": "t"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn spawn_returns_created_with_job_id() {
    let app = test_app();
    let job_id = spawn_one(&app, "implement the parser").await;
    assert!(job_id.starts_with("job-"));
    wait_for_status(&app, &job_id, JobStatus::Building).await;
}

#[tokio::test]
async fn list_jobs_newest_first_with_filters() {
    let app = test_app();
    let first = spawn_one(&app, "first").await;
    let second = spawn_one(&app, "second").await;
    wait_for_status(&app, &second, JobStatus::Building).await;

    let (status, body) = get(&app, "/jobs").await;
    assert_eq!(status, StatusCode::OK);
    let jobs = body.as_array().unwrap();
    assert_eq!(jobs.len(), 2);
    // Ids are returned; both jobs present with the newest submission first
    // (equal timestamps fall back to id order).
    let ids: Vec<&str> = jobs.iter().map(|j| j["job_id"].as_str().unwrap()).collect();
    assert!(ids.contains(&first.as_str()));
    assert!(ids.contains(&second.as_str()));

    let (status, body) = get(&app, "/jobs?limit=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, _) = get(&app, "/jobs?status=bogus").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = get(&app, "/jobs?status=pending").await;
    assert_eq!(status, StatusCode::OK);
    // Default slots admit both jobs, so the pending filter is empty
    assert!(body.as_array().unwrap().len() <= 2);
}

#[tokio::test]
async fn status_answers_404_for_unknown_jobs() {
    let app = test_app();
    let (status, _) = get(&app, "/jobs/job-ghost/status").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn status_reflects_the_pipeline() {
    let app = test_app();
    let job_id = spawn_one(&app, "task text").await;
    wait_for_status(&app, &job_id, JobStatus::Building).await;

    let (status, body) = get(&app, &format!("/jobs/{}/status", job_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["job_id"], job_id.as_str());
    assert_eq!(body["status"], "building");
    assert_eq!(body["task"], "task text");
    assert!(body.get("completed_at").is_none());
}

#[tokio::test]
async fn telemetry_zeroes_then_tracks_progress_callbacks() {
    let app = test_app();
    let job_id = spawn_one(&app, "t").await;
    wait_for_status(&app, &job_id, JobStatus::Building).await;

    let (status, body) = get(&app, &format!("/jobs/{}/telemetry", job_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cpu_usage"], 0.0);
    assert_eq!(body["ram_usage_mb"], 0.0);

    let (status, body) = post_json(
        &app,
        &format!("/jobs/{}/callback", job_id),
        json!({"current_tool": "cargo_check", "cpu_usage": 37.5, "ram_usage_mb": 420.0}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);

    // The sample lands via the engine loop
    for _ in 0..200 {
        let (_, body) = get(&app, &format!("/jobs/{}/telemetry", job_id)).await;
        if body["cpu_usage"] == json!(37.5) {
            assert_eq!(body["current_tool"], "cargo_check");
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("telemetry sample never served");
}

#[tokio::test]
async fn audit_is_served_after_the_checker_completes() {
    let app = test_app();
    let job_id = spawn_one(&app, "t").await;

    let (status, _) = get(&app, &format!("/jobs/{}/audit", job_id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    run_to_awaiting(&app, &job_id).await;

    let (status, body) = get(&app, &format!("/jobs/{}/audit", job_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["job_id"], job_id.as_str());
    assert_eq!(body["audit_report"]["summary"], "ok");
}

#[tokio::test]
async fn approval_gate_over_http() {
    let app = test_app();
    let job_id = spawn_one(&app, "t").await;
    wait_for_status(&app, &job_id, JobStatus::Building).await;

    // Approving before the gate is a conflict
    let (status, _) =
        post_json(&app, &format!("/jobs/{}/approve", job_id), json!({"approved": true})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    run_to_awaiting(&app, &job_id).await;

    // Missing decision is a bad request
    let (status, _) =
        post_json(&app, &format!("/jobs/{}/approve", job_id), json!({"comment": "?"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = post_json(
        &app,
        &format!("/jobs/{}/approve", job_id),
        json!({"approved": true, "comment": "lgtm"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "approved");

    wait_for_status(&app, &job_id, JobStatus::Completed).await;

    // Replaying the decision conflicts once resolved
    let (status, _) =
        post_json(&app, &format!("/jobs/{}/approve", job_id), json!({"approved": true})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = get(&app, &format!("/jobs/{}/status", job_id)).await;
    assert!(body.get("completed_at").is_some());
}

#[tokio::test]
async fn rejection_over_http() {
    let app = test_app();
    let job_id = spawn_one(&app, "t").await;
    run_to_awaiting(&app, &job_id).await;

    let (status, body) = post_json(
        &app,
        &format!("/jobs/{}/approve", job_id),
        json!({"approved": false, "comment": "needs tests"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "rejected");
    wait_for_status(&app, &job_id, JobStatus::Rejected).await;
}

#[tokio::test]
async fn callbacks_for_unknown_jobs_404() {
    let app = test_app();
    let (status, _) =
        post_json(&app, "/jobs/job-ghost/callback", json!({"status": "completed"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn callback_with_unknown_status_is_rejected() {
    let app = test_app();
    let job_id = spawn_one(&app, "t").await;
    wait_for_status(&app, &job_id, JobStatus::Building).await;

    let (status, _) =
        post_json(&app, &format!("/jobs/{}/callback", job_id), json!({"status": "paused"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stale_callbacks_answer_ok_without_effect() {
    let app = test_app();
    let job_id = spawn_one(&app, "t").await;
    run_to_awaiting(&app, &job_id).await;

    // Re-posting the completion after the job is past checking
    let (status, body) = post_json(
        &app,
        &format!("/jobs/{}/callback", job_id),
        json!({"status": "completed", "audit_report": {"summary": "dup"}}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let (_, body) = get(&app, &format!("/jobs/{}/status", job_id)).await;
    assert_eq!(body["status"], "awaiting_approval");
    let (_, body) = get(&app, &format!("/jobs/{}/audit", job_id)).await;
    assert_eq!(body["audit_report"]["summary"], "ok");
}

#[tokio::test]
async fn error_callback_fails_the_job_over_http() {
    let app = test_app();
    let job_id = spawn_one(&app, "t").await;
    wait_for_status(&app, &job_id, JobStatus::Building).await;

    let (status, _) = post_json(
        &app,
        &format!("/jobs/{}/callback", job_id),
        json!({"status": "error", "error": "llm 429"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    wait_for_status(&app, &job_id, JobStatus::Failed).await;
    let (_, body) = get(&app, &format!("/jobs/{}/status", job_id)).await;
    assert_eq!(body["error_message"], "llm 429");
}

#[tokio::test]
async fn stream_upgrade_404s_for_unknown_jobs() {
    let app = test_app();
    let req = Request::builder()
        .uri("/jobs/job-ghost/stream")
        .header("connection", "upgrade")
        .header("upgrade", "websocket")
        .header("sec-websocket-version", "13")
        .header("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ==")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
