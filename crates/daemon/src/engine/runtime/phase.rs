// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Phase execution: sandbox spawning, worker callbacks, cleanup.

use super::Engine;
use icarus_core::{
    Clock, Effect, Event, Job, JobId, JobStatus, MountKind, MountSpec, Phase, SandboxId,
    SandboxSpec, TimerId, SANDBOX_NAME_PREFIX,
};
use std::time::Duration;

impl<C: Clock> Engine<C> {
    /// Side effects of entering a status. Runs strictly after the
    /// transition has been persisted and broadcast.
    pub(crate) fn status_effects(&self, id: &JobId, status: JobStatus) -> Vec<Effect> {
        let Some(job) = self.get_job(id.as_str()) else {
            return Vec::new();
        };

        match status {
            JobStatus::Building => {
                let mut effects = self.spawn_phase_effects(&job, Phase::Build);
                // Outer wall-clock cap, armed once at first admission.
                effects.push(Effect::SetTimer {
                    id: TimerId::job_deadline(&job.id),
                    duration: Duration::from_secs(self.config.orchestrator.job_timeout_seconds),
                });
                effects
            }

            JobStatus::Checking => self.spawn_phase_effects(&job, Phase::Check),

            JobStatus::AwaitingApproval => {
                // The approval gate has no timeout; a job may sit here
                // indefinitely without tripping the outer cap.
                vec![Effect::CancelTimer { id: TimerId::job_deadline(&job.id) }]
            }

            JobStatus::Approved => vec![
                Effect::SetTimer {
                    id: TimerId::job_deadline(&job.id),
                    duration: Duration::from_secs(self.config.orchestrator.job_timeout_seconds),
                },
                Effect::Commit { job_id: job.id, project_path: job.project_path.clone() },
            ],

            s if s.is_terminal() => self.cleanup_effects(&job, s),

            _ => Vec::new(),
        }
    }

    /// Spawn the sandbox for a phase and arm its deadline.
    fn spawn_phase_effects(&self, job: &Job, phase: Phase) -> Vec<Effect> {
        let agent = self.config.agent(phase);
        // Validated at startup; a broken limit here falls back rather
        // than wedging the job before its sandbox exists.
        let memory_limit_bytes = agent.memory_limit_bytes().unwrap_or(1 << 30);

        let mut env = vec![
            ("JOB_ID".to_string(), job.id.to_string()),
            ("TASK".to_string(), job.task.clone()),
            (
                "ORCHESTRATOR_CALLBACK".to_string(),
                format!("{}/jobs/{}/callback", self.config.orchestrator.callback_base, job.id),
            ),
        ];
        for name in &agent.pass_env {
            if let Ok(value) = std::env::var(name) {
                env.push((name.clone(), value));
            }
        }

        let spec = SandboxSpec {
            name: sandbox_name(&job.id, phase),
            image: agent.image_name.clone(),
            cpu_limit: agent.cpu_limit,
            memory_limit_bytes,
            network_mode: agent.network_mode.clone(),
            env,
            // The checker audits a frozen workspace.
            mount: self.workspace_mount(job, phase == Phase::Check),
        };

        vec![
            Effect::SpawnSandbox { job_id: job.id, phase, spec },
            Effect::SetTimer {
                id: TimerId::phase_deadline(&job.id, phase),
                duration: agent.timeout(),
            },
        ]
    }

    /// The per-job workspace mount, per the configured policy.
    fn workspace_mount(&self, job: &Job, read_only: bool) -> MountSpec {
        if self.config.workspace.mount_type == "bind" {
            MountSpec {
                kind: MountKind::Bind,
                source: self
                    .config
                    .workspace
                    .base_path
                    .join(job.id.as_str())
                    .display()
                    .to_string(),
                read_only,
            }
        } else {
            MountSpec { kind: MountKind::Volume, source: job.workspace_volume(), read_only }
        }
    }

    /// Entering a terminal status: cancel timers and release the
    /// workspace. The sandbox itself was killed by whichever handler
    /// emitted the terminal transition.
    fn cleanup_effects(&self, job: &Job, status: JobStatus) -> Vec<Effect> {
        let mut effects = vec![
            Effect::CancelTimer { id: TimerId::phase_deadline(&job.id, Phase::Build) },
            Effect::CancelTimer { id: TimerId::phase_deadline(&job.id, Phase::Check) },
            Effect::CancelTimer { id: TimerId::job_deadline(&job.id) },
        ];
        // The completed artifact keeps its workspace; rejected and failed
        // workspaces are destroyed. Bind workspaces are operator-managed
        // and never destroyed here.
        if status != JobStatus::Completed && self.config.workspace.mount_type != "bind" {
            effects.push(Effect::ReleaseWorkspace {
                job_id: job.id,
                volume: job.workspace_volume(),
                destroy: true,
            });
        }
        effects
    }

    /// Central failure path: kill the live sandbox (if any) and emit the
    /// failed transition. Terminal cleanup runs off that transition.
    pub(crate) fn fail_effects(&self, job: &Job, error: String) -> Vec<Effect> {
        let mut effects = Vec::new();
        if let Some((_, sandbox_id)) = job.active_sandbox() {
            effects.push(Effect::KillSandbox { job_id: job.id, sandbox_id: sandbox_id.clone() });
        }
        effects.push(Effect::Emit {
            event: Event::JobAdvanced {
                id: job.id,
                status: JobStatus::Failed,
                error: Some(error),
                comment: None,
                at_ms: self.clock.epoch_ms(),
            },
        });
        effects
    }

    /// A worker reported phase completion.
    pub(crate) fn handle_worker_completed(
        &self,
        job_id: &JobId,
        audit_report: Option<serde_json::Value>,
    ) -> Vec<Effect> {
        let Some(job) = self.get_job(job_id.as_str()) else {
            tracing::info!(job_id = %job_id, "completion callback for unknown job discarded");
            return Vec::new();
        };

        match job.status {
            JobStatus::Building => {
                let mut effects = vec![Effect::CancelTimer {
                    id: TimerId::phase_deadline(&job.id, Phase::Build),
                }];
                if let Some(sandbox_id) = &job.builder_sandbox_id {
                    effects.push(Effect::KillSandbox {
                        job_id: job.id,
                        sandbox_id: sandbox_id.clone(),
                    });
                }
                effects.push(Effect::Emit {
                    event: Event::JobAdvanced {
                        id: job.id,
                        status: JobStatus::Checking,
                        error: None,
                        comment: None,
                        at_ms: self.clock.epoch_ms(),
                    },
                });
                effects
            }

            JobStatus::Checking => {
                let mut effects = vec![Effect::CancelTimer {
                    id: TimerId::phase_deadline(&job.id, Phase::Check),
                }];
                if let Some(sandbox_id) = &job.checker_sandbox_id {
                    effects.push(Effect::KillSandbox {
                        job_id: job.id,
                        sandbox_id: sandbox_id.clone(),
                    });
                }
                // The audit lands in the same WAL batch, ahead of the
                // transition it justifies.
                if let Some(payload) = audit_report {
                    effects.push(Effect::Emit {
                        event: Event::AuditRecorded {
                            job_id: job.id,
                            payload,
                            at_ms: self.clock.epoch_ms(),
                        },
                    });
                }
                effects.push(Effect::Emit {
                    event: Event::JobAdvanced {
                        id: job.id,
                        status: JobStatus::AwaitingApproval,
                        error: None,
                        comment: None,
                        at_ms: self.clock.epoch_ms(),
                    },
                });
                effects
            }

            status => {
                tracing::info!(job_id = %job_id, %status, "stale completion callback discarded");
                Vec::new()
            }
        }
    }

    /// A worker reported a phase error.
    pub(crate) fn handle_worker_errored(&self, job_id: &JobId, error: &str) -> Vec<Effect> {
        let Some(job) = self.get_job(job_id.as_str()) else {
            tracing::info!(job_id = %job_id, "error callback for unknown job discarded");
            return Vec::new();
        };
        match job.status {
            JobStatus::Building | JobStatus::Checking => {
                tracing::warn!(job_id = %job_id, error = %error, "worker reported phase error");
                self.fail_effects(&job, error.to_string())
            }
            status => {
                tracing::info!(job_id = %job_id, %status, "stale error callback discarded");
                Vec::new()
            }
        }
    }

    /// The driver could not create or start a sandbox: phase failure.
    pub(crate) fn handle_spawn_failed(
        &self,
        job_id: &JobId,
        phase: Phase,
        reason: &str,
    ) -> Vec<Effect> {
        let Some(job) = self.get_job(job_id.as_str()) else {
            return Vec::new();
        };
        if job.status.phase() != Some(phase) {
            // The job already moved on (timeout beat the spawn report).
            return Vec::new();
        }
        self.fail_effects(&job, format!("sandbox spawn failed: {}", reason))
    }

    /// The post-approval commit finished.
    pub(crate) fn handle_commit_finished(
        &self,
        job_id: &JobId,
        error: Option<String>,
    ) -> Vec<Effect> {
        let Some(job) = self.get_job(job_id.as_str()) else {
            return Vec::new();
        };
        if job.status != JobStatus::Approved {
            tracing::info!(job_id = %job_id, status = %job.status, "stale commit result discarded");
            return Vec::new();
        }
        let (status, error) = match error {
            None => (JobStatus::Completed, None),
            Some(message) => (JobStatus::Failed, Some(message)),
        };
        vec![Effect::Emit {
            event: Event::JobAdvanced {
                id: job.id,
                status,
                error,
                comment: None,
                at_ms: self.clock.epoch_ms(),
            },
        }]
    }

    /// Forward the sandbox's log stream onto the job's push channel.
    pub(crate) fn spawn_log_tailer(&self, job_id: &JobId, sandbox_id: &SandboxId) {
        let driver = std::sync::Arc::clone(&self.executor.driver);
        let hub = self.hub.clone();
        let job_id = job_id.to_string();
        let sandbox_id = sandbox_id.clone();
        tokio::spawn(async move {
            let mut lines = match driver.tail_logs(&sandbox_id).await {
                Ok(rx) => rx,
                Err(e) => {
                    tracing::warn!(job_id = %job_id, error = %e, "log tail unavailable");
                    return;
                }
            };
            while let Some(line) = lines.recv().await {
                hub.publish_log(&job_id, line);
            }
        });
    }
}

/// Container name for a job's phase sandbox.
pub(crate) fn sandbox_name(job_id: &JobId, phase: Phase) -> String {
    let role = match phase {
        Phase::Build => "builder",
        Phase::Check => "checker",
    };
    format!("{}{}_{}", SANDBOX_NAME_PREFIX, role, job_id)
}
