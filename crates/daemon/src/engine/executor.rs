// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Effect executor.
//!
//! Driver and publisher work runs on spawned tasks that report back into
//! the engine mailbox as events; timer effects act on the shared
//! scheduler synchronously.

use crate::adapters::{CommitPublisher, SandboxDriver};
use crate::engine::scheduler::Scheduler;
use crate::engine::EngineMsg;
use icarus_core::{Clock, Effect, Event};
use icarus_storage::MaterializedState;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Executes effects using the configured adapters.
pub(crate) struct Executor<C: Clock> {
    pub(crate) driver: Arc<dyn SandboxDriver>,
    pub(crate) publisher: Arc<dyn CommitPublisher>,
    pub(crate) scheduler: Arc<Mutex<Scheduler>>,
    pub(crate) state: Arc<Mutex<MaterializedState>>,
    pub(crate) clock: C,
    /// Mailbox for background tasks to report completion events.
    pub(crate) event_tx: mpsc::Sender<EngineMsg>,
}

impl<C: Clock> Executor<C> {
    /// Execute a single effect with tracing.
    ///
    /// Returns the follow-up event for `Emit` effects; everything else
    /// reports back through the mailbox when its background task ends.
    pub(crate) async fn execute(&self, effect: Effect) -> Option<Event> {
        let info: String =
            effect.fields().iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join(" ");
        if effect.verbose() {
            tracing::info!("executing effect={} {}", effect.name(), info);
        }
        self.execute_inner(effect).await
    }

    async fn execute_inner(&self, effect: Effect) -> Option<Event> {
        match effect {
            Effect::Emit { event } => {
                // Apply immediately so decisions made before the event
                // cycles back through the loop (admission slot counting,
                // stale-callback checks) already see it. Re-applying on
                // the loop cycle is idempotent.
                self.state.lock().apply_event(&event);
                Some(event)
            }

            Effect::SpawnSandbox { job_id, phase, spec } => {
                let driver = Arc::clone(&self.driver);
                let event_tx = self.event_tx.clone();
                tokio::spawn(async move {
                    let result = async {
                        if spec.mount.kind == icarus_core::MountKind::Volume {
                            driver.create_volume(&spec.mount.source).await?;
                        }
                        let sandbox_id = driver.create(&spec).await?;
                        driver.start(&sandbox_id).await?;
                        Ok::<_, crate::adapters::DriverError>(sandbox_id)
                    }
                    .await;

                    let event = match result {
                        Ok(sandbox_id) => {
                            tracing::info!(
                                job_id = %job_id,
                                phase = %phase,
                                sandbox_id = %sandbox_id.short(),
                                "sandbox running"
                            );
                            Event::SandboxStarted { job_id, phase, sandbox_id }
                        }
                        Err(e) => {
                            tracing::error!(job_id = %job_id, phase = %phase, error = %e, "sandbox spawn failed");
                            Event::SandboxSpawnFailed { job_id, phase, reason: e.to_string() }
                        }
                    };
                    if event_tx.send(EngineMsg::Event(event)).await.is_err() {
                        tracing::warn!("engine mailbox closed, dropping spawn result");
                    }
                });
                None
            }

            Effect::KillSandbox { job_id, sandbox_id } => {
                let driver = Arc::clone(&self.driver);
                tokio::spawn(async move {
                    if let Err(e) = driver.kill(&sandbox_id).await {
                        tracing::warn!(job_id = %job_id, sandbox_id = %sandbox_id.short(), error = %e, "kill failed");
                    }
                    if let Err(e) = driver.remove(&sandbox_id).await {
                        tracing::warn!(job_id = %job_id, sandbox_id = %sandbox_id.short(), error = %e, "remove failed");
                    }
                });
                None
            }

            Effect::ReleaseWorkspace { job_id, volume, destroy } => {
                if !destroy {
                    // The kept volume is the delivered artifact.
                    return None;
                }
                let driver = Arc::clone(&self.driver);
                tokio::spawn(async move {
                    if let Err(e) = driver.remove_volume(&volume).await {
                        tracing::warn!(job_id = %job_id, volume = %volume, error = %e, "workspace cleanup failed");
                    }
                });
                None
            }

            Effect::Commit { job_id, project_path } => {
                let publisher = Arc::clone(&self.publisher);
                let event_tx = self.event_tx.clone();
                tokio::spawn(async move {
                    let error = publisher.publish(&job_id, &project_path).await.err();
                    let event = Event::CommitFinished { job_id, error };
                    if event_tx.send(EngineMsg::Event(event)).await.is_err() {
                        tracing::warn!("engine mailbox closed, dropping commit result");
                    }
                });
                None
            }

            Effect::SetTimer { id, duration } => {
                self.scheduler.lock().set_timer(id, duration, self.clock.now());
                None
            }

            Effect::CancelTimer { id } => {
                self.scheduler.lock().cancel_timer(&id);
                None
            }
        }
    }
}
