// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::adapters::{DriverCall, FakeCommitPublisher, FakeSandboxDriver};
use icarus_core::{JobId, Phase, SandboxId};

fn test_config(port: u16) -> Config {
    let mut config = Config::default();
    config.orchestrator.host = "127.0.0.1".into();
    config.orchestrator.port = port;
    config.sentinel.enabled = false;
    config
}

/// Seed a WAL as a crashed daemon would have left it: a job mid-build
/// with a recorded sandbox handle.
fn seed_crashed_state(state_dir: &std::path::Path) {
    let paths = Paths::under(state_dir.to_path_buf());
    let mut wal = Wal::open(&paths.wal_path, 0).unwrap();
    let id = JobId::from_string("job-orphan");
    for event in [
        Event::JobCreated {
            id,
            task: "t".into(),
            project_path: "/tmp/p".into(),
            created_at_ms: 1,
        },
        Event::JobAdvanced {
            id,
            status: JobStatus::Building,
            error: None,
            comment: None,
            at_ms: 2,
        },
        Event::SandboxStarted {
            job_id: id,
            phase: Phase::Build,
            sandbox_id: SandboxId::new("sb-stale"),
        },
    ] {
        wal.append(&event).unwrap();
    }
    wal.flush().unwrap();
}

#[tokio::test]
async fn orphaned_jobs_are_failed_on_restart() {
    let dir = tempfile::tempdir().unwrap();
    seed_crashed_state(dir.path());

    let driver = FakeSandboxDriver::new();
    driver.add_running("sb-stale", "icarus_builder_job-orphan");

    let started = startup_with(
        &test_config(0),
        dir.path().to_path_buf(),
        Arc::new(driver.clone()),
        Arc::new(FakeCommitPublisher::new()),
    )
    .await
    .unwrap();

    let job = started.handle.job("job-orphan").unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error_message.as_deref(), Some("orphaned on restart"));
    assert!(job.builder_sandbox_id.is_none());

    // The stale sandbox and workspace were torn down, not adopted
    assert!(driver.calls().contains(&DriverCall::Kill(SandboxId::new("sb-stale"))));
    assert!(driver.calls().contains(&DriverCall::Remove(SandboxId::new("sb-stale"))));
    assert!(driver
        .calls()
        .contains(&DriverCall::RemoveVolume("icarus_workspace_job-orphan".into())));

    started.engine_task.abort();
}

#[tokio::test]
async fn restart_after_recovery_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    seed_crashed_state(dir.path());

    let driver = FakeSandboxDriver::new();
    let config = test_config(0);

    let first = startup_with(
        &config,
        dir.path().to_path_buf(),
        Arc::new(driver.clone()),
        Arc::new(FakeCommitPublisher::new()),
    )
    .await
    .unwrap();
    first.engine_task.abort();
    drop(first);

    // Second startup replays the WAL including the orphan failure; the
    // job stays failed and no new kill is issued.
    let driver2 = FakeSandboxDriver::new();
    let second = startup_with(
        &config,
        dir.path().to_path_buf(),
        Arc::new(driver2.clone()),
        Arc::new(FakeCommitPublisher::new()),
    )
    .await
    .unwrap();

    let job = second.handle.job("job-orphan").unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(driver2.calls().iter().all(|c| !matches!(c, DriverCall::Kill(_))));

    second.engine_task.abort();
}

#[tokio::test]
async fn second_daemon_fails_to_lock() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(0);

    let first = startup_with(
        &config,
        dir.path().to_path_buf(),
        Arc::new(FakeSandboxDriver::new()),
        Arc::new(FakeCommitPublisher::new()),
    )
    .await
    .unwrap();

    let second = startup_with(
        &config,
        dir.path().to_path_buf(),
        Arc::new(FakeSandboxDriver::new()),
        Arc::new(FakeCommitPublisher::new()),
    )
    .await;
    assert!(matches!(second, Err(LifecycleError::LockFailed(_))));

    first.engine_task.abort();
}

#[tokio::test]
async fn fresh_startup_serves_submissions() {
    let dir = tempfile::tempdir().unwrap();

    let started = startup_with(
        &test_config(0),
        dir.path().to_path_buf(),
        Arc::new(FakeSandboxDriver::new()),
        Arc::new(FakeCommitPublisher::new()),
    )
    .await
    .unwrap();

    let job = started
        .handle
        .submit("hello".to_string(), "/tmp/p".into())
        .await
        .unwrap();
    assert!(started.handle.job(job.id.as_str()).is_some());

    started.engine_task.abort();
}
