// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine actor loop: admission control and event dispatch.
//!
//! A single loop over (mailbox message, due timer, sentinel edge)
//! serializes every admission and transition decision. Per event the loop
//! persists to the WAL, applies to the materialized state, publishes the
//! transition, and only then runs the handler whose effects spawn the
//! actual work. That order makes "persisted before externally visible"
//! mechanical rather than emergent.

mod approval;
mod phase;
mod timer;

use crate::adapters::{CommitPublisher, SandboxDriver};
use crate::config::Config;
use crate::engine::executor::Executor;
use crate::engine::scheduler::Scheduler;
use crate::engine::{BroadcastHub, EngineError, EngineHandle, EngineMsg};
use icarus_core::{
    AdmissionLevel, Clock, Effect, Event, Job, JobId, JobStatus, MAX_TASK_LEN,
};
use icarus_storage::{MaterializedState, Wal};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Engine adapter dependencies.
pub struct EngineDeps {
    pub driver: Arc<dyn SandboxDriver>,
    pub publisher: Arc<dyn CommitPublisher>,
    pub state: Arc<Mutex<MaterializedState>>,
    pub wal: Arc<Mutex<Wal>>,
    /// Sentinel level feed; the loop wakes on changes.
    pub level_rx: watch::Receiver<AdmissionLevel>,
}

/// Engine mailbox capacity. Background tasks block briefly when the loop
/// is saturated rather than dropping events.
const MAILBOX_CAPACITY: usize = 256;

/// The scheduler and state machine for all jobs.
pub struct Engine<C: Clock> {
    pub(crate) config: Config,
    pub(crate) state: Arc<Mutex<MaterializedState>>,
    pub(crate) executor: Executor<C>,
    pub(crate) hub: BroadcastHub,
    pub(crate) wal: Arc<Mutex<Wal>>,
    pub(crate) level_rx: watch::Receiver<AdmissionLevel>,
    pub(crate) clock: C,
    /// Set during graceful shutdown; refuses submissions and admissions.
    draining: bool,
}

impl<C: Clock> Engine<C> {
    /// Build the engine, its gateway handle, and the mailbox receiver to
    /// pass to [`Engine::run`].
    pub fn new(
        deps: EngineDeps,
        config: Config,
        hub: BroadcastHub,
        clock: C,
    ) -> (Self, EngineHandle, mpsc::Receiver<EngineMsg>) {
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        let handle = EngineHandle::new(tx.clone(), Arc::clone(&deps.state), hub.clone());
        let executor = Executor {
            driver: deps.driver,
            publisher: deps.publisher,
            scheduler: Arc::new(Mutex::new(Scheduler::new())),
            state: Arc::clone(&deps.state),
            clock: clock.clone(),
            event_tx: tx,
        };
        let engine = Self {
            config,
            state: deps.state,
            executor,
            hub,
            wal: deps.wal,
            level_rx: deps.level_rx,
            clock,
            draining: false,
        };
        (engine, handle, rx)
    }

    /// Run the actor loop until shutdown or mailbox closure.
    pub async fn run(mut self, mut rx: mpsc::Receiver<EngineMsg>) {
        let mut level_watch = self.level_rx.clone();
        let mut watch_alive = true;
        loop {
            let next_deadline = self.executor.scheduler.lock().next_deadline();
            let timer_sleep =
                next_deadline.map(|at| at.saturating_duration_since(self.clock.now()));

            tokio::select! {
                msg = rx.recv() => match msg {
                    Some(EngineMsg::Event(event)) => self.step(event).await,
                    Some(EngineMsg::Submit { task, project_path, reply }) => {
                        let result = self.submit(task, project_path).await;
                        let _ = reply.send(result);
                    }
                    Some(EngineMsg::Approve { job_id, approved, comment, reply }) => {
                        let result = self.approve(&job_id, approved, comment).await;
                        let _ = reply.send(result);
                    }
                    Some(EngineMsg::Shutdown { reply }) => {
                        self.shutdown().await;
                        let _ = reply.send(());
                        break;
                    }
                    None => break,
                },

                _ = tokio::time::sleep(timer_sleep.unwrap_or(Duration::ZERO)),
                    if timer_sleep.is_some() =>
                {
                    self.fire_due_timers().await;
                }

                changed = level_watch.changed(), if watch_alive => match changed {
                    Ok(()) => {
                        let level = *level_watch.borrow_and_update();
                        self.step(Event::SentinelChanged { level }).await;
                    }
                    Err(_) => watch_alive = false,
                },
            }
        }
        tracing::info!("engine loop stopped");
    }

    /// Convert due timers into events and process them.
    pub(crate) async fn fire_due_timers(&mut self) {
        let fired = self.executor.scheduler.lock().fired(self.clock.now());
        for event in fired {
            self.step(event).await;
        }
    }

    /// Process one event and route whatever it cascades into.
    ///
    /// Per event: WAL append + flush, state apply, status broadcast,
    /// handler dispatch, effect execution. Events emitted by effects go
    /// back through the mailbox so the loop reads every event exactly
    /// once and stays the only writer; the inline queue is only the
    /// fallback for a saturated mailbox.
    pub(crate) async fn step(&mut self, event: Event) {
        let mut inline: VecDeque<Event> = VecDeque::from([event]);
        while let Some(event) = inline.pop_front() {
            tracing::debug!(event = %event.log_summary(), "processing");

            {
                let mut wal = self.wal.lock();
                match wal.append(&event) {
                    Ok(seq) => {
                        if let Err(e) = wal.flush() {
                            tracing::error!(error = %e, "WAL flush failed");
                        }
                        wal.mark_processed(seq);
                    }
                    Err(e) => tracing::error!(error = %e, "WAL append failed"),
                }
            }

            // Effect-emitted events were applied eagerly by the executor;
            // apply_event is idempotent for that second pass.
            self.state.lock().apply_event(&event);

            if let Event::JobAdvanced { id, status, .. } = &event {
                // The transition is durable at this point; observers may
                // now see it.
                self.hub.publish_status(id.as_str(), *status);
                if status.is_terminal() {
                    self.hub.close_after_grace(id.as_str());
                }
            }

            for effect in self.handle_event(&event) {
                if let Some(next) = self.executor.execute(effect).await {
                    match self.executor.event_tx.try_send(EngineMsg::Event(next)) {
                        Ok(()) => {}
                        Err(mpsc::error::TrySendError::Full(EngineMsg::Event(next)))
                        | Err(mpsc::error::TrySendError::Closed(EngineMsg::Event(next))) => {
                            inline.push_back(next);
                        }
                        Err(_) => {}
                    }
                }
            }
        }
    }

    /// Route an event to its handler, returning the effects to run.
    fn handle_event(&self, event: &Event) -> Vec<Effect> {
        match event {
            Event::JobCreated { .. } => self.admission_pass(),

            Event::JobAdvanced { id, status, .. } => {
                let mut effects = self.status_effects(id, *status);
                // Entering awaiting_approval or a terminal status frees a
                // slot; wake admission.
                if !status.is_active() && *status != JobStatus::Pending {
                    effects.extend(self.admission_pass());
                }
                effects
            }

            Event::SentinelChanged { level } => {
                if *level == AdmissionLevel::Red {
                    Vec::new()
                } else {
                    self.admission_pass()
                }
            }

            Event::SandboxStarted { job_id, phase, sandbox_id } => {
                // The job may have left the phase (timeout, error
                // callback) before the start report landed; such a
                // sandbox has nothing to do and is torn down here.
                let current = self.get_job(job_id.as_str());
                if current.as_ref().and_then(|j| j.status.phase()) != Some(*phase) {
                    return vec![Effect::KillSandbox {
                        job_id: *job_id,
                        sandbox_id: sandbox_id.clone(),
                    }];
                }
                self.spawn_log_tailer(job_id, sandbox_id);
                Vec::new()
            }

            Event::SandboxSpawnFailed { job_id, phase, reason } => {
                self.handle_spawn_failed(job_id, *phase, reason)
            }

            Event::WorkerCompleted { job_id, audit_report } => {
                self.handle_worker_completed(job_id, audit_report.clone())
            }

            Event::WorkerErrored { job_id, error } => self.handle_worker_errored(job_id, error),

            Event::CommitFinished { job_id, error } => {
                self.handle_commit_finished(job_id, error.clone())
            }

            Event::TimerFired { id } => self.handle_timer(id),

            Event::TelemetrySampled { .. }
            | Event::AuditRecorded { .. }
            | Event::Shutdown
            | Event::Custom => Vec::new(),
        }
    }

    /// Greedily admit eligible pending jobs, oldest first.
    ///
    /// A pending job is admitted only while the sentinel is below RED and
    /// strictly fewer than `max_concurrent_jobs` jobs occupy slots.
    fn admission_pass(&self) -> Vec<Effect> {
        if self.draining {
            return Vec::new();
        }
        if *self.level_rx.borrow() == AdmissionLevel::Red {
            tracing::debug!("admission deferred: sentinel RED");
            return Vec::new();
        }

        let state = self.state.lock();
        let mut slots =
            self.config.orchestrator.max_concurrent_jobs.saturating_sub(state.active_count());
        let mut effects = Vec::new();
        for id in state.pending_oldest_first() {
            if slots == 0 {
                break;
            }
            tracing::info!(job_id = %id, "admitting job");
            effects.push(Effect::Emit {
                event: Event::JobAdvanced {
                    id,
                    status: JobStatus::Building,
                    error: None,
                    comment: None,
                    at_ms: self.clock.epoch_ms(),
                },
            });
            slots -= 1;
        }
        effects
    }

    /// Handle a submission command: validate, persist, return the job.
    pub(crate) async fn submit(
        &mut self,
        task: String,
        project_path: std::path::PathBuf,
    ) -> Result<Job, EngineError> {
        if self.draining {
            return Err(EngineError::ShuttingDown);
        }
        if task.is_empty() {
            return Err(EngineError::InvalidRequest("task must not be empty".into()));
        }
        if task.len() > MAX_TASK_LEN {
            return Err(EngineError::InvalidRequest(format!(
                "task exceeds {} bytes",
                MAX_TASK_LEN
            )));
        }
        if project_path.as_os_str().is_empty() {
            return Err(EngineError::InvalidRequest("project_path must not be empty".into()));
        }

        if self.config.orchestrator.refuse_when_saturated
            && *self.level_rx.borrow() == AdmissionLevel::Red
        {
            let pending = self
                .state
                .lock()
                .jobs
                .values()
                .filter(|j| j.status == JobStatus::Pending)
                .count();
            if pending >= self.config.orchestrator.max_concurrent_jobs {
                return Err(EngineError::Saturated);
            }
        }

        let id = JobId::new();
        tracing::info!(job_id = %id, task = icarus_core::short(&task, 100), "job submitted");
        self.step(Event::JobCreated {
            id,
            task,
            project_path,
            created_at_ms: self.clock.epoch_ms(),
        })
        .await;

        self.state
            .lock()
            .get_job(id.as_str())
            .cloned()
            .ok_or_else(|| EngineError::InvalidRequest("submission was not recorded".into()))
    }

    /// Graceful shutdown: refuse admissions, tear down live sandboxes,
    /// fail in-flight jobs so every stream ends with a terminal message.
    pub(crate) async fn shutdown(&mut self) {
        tracing::info!("engine draining");
        self.draining = true;

        let live: Vec<Job> = self.state.lock().live_jobs().into_iter().cloned().collect();
        for job in live {
            if let Some((_, sandbox_id)) = job.active_sandbox() {
                // Awaited directly so the kill lands before process exit.
                if let Err(e) = self.executor.driver.kill(sandbox_id).await {
                    tracing::warn!(job_id = %job.id, error = %e, "shutdown kill failed");
                }
                let _ = self.executor.driver.remove(sandbox_id).await;
            }
            self.step(Event::JobAdvanced {
                id: job.id,
                status: JobStatus::Failed,
                error: Some("shutdown".to_string()),
                comment: None,
                at_ms: self.clock.epoch_ms(),
            })
            .await;
        }
        // Record the clean shutdown so recovery can tell it from a crash.
        self.step(Event::Shutdown).await;
        self.hub.close_all();
    }

    pub(crate) fn get_job(&self, id: &str) -> Option<Job> {
        self.state.lock().get_job(id).cloned()
    }
}

#[cfg(test)]
#[path = "../runtime_tests/mod.rs"]
mod tests;
