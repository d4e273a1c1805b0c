// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for the engine.

use crate::adapters::{FakeCommitPublisher, FakeSandboxDriver};
use crate::config::Config;
use crate::engine::runtime::{Engine, EngineDeps};
use crate::engine::{BroadcastHub, EngineMsg};
use icarus_core::{AdmissionLevel, Event, FakeClock, Job, JobStatus};
use icarus_storage::{MaterializedState, Wal};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Engine under test with its fakes and control knobs.
pub(crate) struct TestContext {
    pub engine: Engine<FakeClock>,
    pub rx: mpsc::Receiver<EngineMsg>,
    pub driver: FakeSandboxDriver,
    pub publisher: FakeCommitPublisher,
    pub clock: FakeClock,
    pub hub: BroadcastHub,
    pub level_tx: watch::Sender<AdmissionLevel>,
    pub wal: Arc<Mutex<Wal>>,
    _dir: tempfile::TempDir,
}

/// Build a test engine with the given config tweaks applied.
pub(crate) fn setup_with(tweak: impl FnOnce(&mut Config)) -> TestContext {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    tweak(&mut config);

    let driver = FakeSandboxDriver::new();
    let publisher = FakeCommitPublisher::new();
    let clock = FakeClock::new();
    let hub = BroadcastHub::new();
    let (level_tx, level_rx) = watch::channel(AdmissionLevel::Green);
    let wal = Arc::new(Mutex::new(Wal::open(&dir.path().join("events.wal"), 0).unwrap()));

    let (engine, _handle, rx) = Engine::new(
        EngineDeps {
            driver: Arc::new(driver.clone()),
            publisher: Arc::new(publisher.clone()),
            state: Arc::new(Mutex::new(MaterializedState::default())),
            wal: Arc::clone(&wal),
            level_rx,
        },
        config,
        hub.clone(),
        clock.clone(),
    );

    TestContext { engine, rx, driver, publisher, clock, hub, level_tx, wal, _dir: dir }
}

pub(crate) fn setup() -> TestContext {
    setup_with(|_| {})
}

impl TestContext {
    /// Submit a job and settle all cascaded work.
    pub(crate) async fn submit(&mut self, task: &str) -> Job {
        let job = self
            .engine
            .submit(task.to_string(), std::path::PathBuf::from("/tmp/project"))
            .await
            .unwrap();
        self.settle().await;
        self.engine.get_job(job.id.as_str()).unwrap()
    }

    /// Drain background task events (sandbox spawns, commits) through the
    /// engine until quiescent.
    pub(crate) async fn settle(&mut self) {
        for _ in 0..10 {
            for _ in 0..4 {
                tokio::task::yield_now().await;
            }
            let mut events = Vec::new();
            while let Ok(msg) = self.rx.try_recv() {
                if let EngineMsg::Event(event) = msg {
                    events.push(event);
                }
            }
            if events.is_empty() {
                return;
            }
            for event in events {
                self.engine.step(event).await;
            }
        }
    }

    /// Change the sentinel level as the engine loop would observe it.
    pub(crate) async fn set_level(&mut self, level: AdmissionLevel) {
        self.level_tx.send(level).unwrap();
        self.engine.step(Event::SentinelChanged { level }).await;
        self.settle().await;
    }

    /// Deliver a worker completion callback for the job's current phase.
    pub(crate) async fn worker_completed(
        &mut self,
        job: &Job,
        audit_report: Option<serde_json::Value>,
    ) {
        self.engine.step(Event::WorkerCompleted { job_id: job.id, audit_report }).await;
        self.settle().await;
    }

    pub(crate) async fn worker_errored(&mut self, job: &Job, error: &str) {
        self.engine
            .step(Event::WorkerErrored { job_id: job.id, error: error.to_string() })
            .await;
        self.settle().await;
    }

    /// Advance the clock and fire whatever became due.
    pub(crate) async fn advance_and_fire(&mut self, duration: Duration) {
        self.clock.advance(duration);
        self.engine.fire_due_timers().await;
        self.settle().await;
    }

    pub(crate) fn status(&self, job: &Job) -> JobStatus {
        self.engine.get_job(job.id.as_str()).unwrap().status
    }

    pub(crate) fn job(&self, job: &Job) -> Job {
        self.engine.get_job(job.id.as_str()).unwrap()
    }

    /// Drive a job from pending all the way to awaiting_approval.
    pub(crate) async fn run_to_awaiting_approval(
        &mut self,
        job: &Job,
        audit: serde_json::Value,
    ) {
        assert_eq!(self.status(job), JobStatus::Building);
        self.worker_completed(job, None).await;
        assert_eq!(self.status(job), JobStatus::Checking);
        self.worker_completed(job, Some(audit)).await;
        assert_eq!(self.status(job), JobStatus::AwaitingApproval);
    }
}
