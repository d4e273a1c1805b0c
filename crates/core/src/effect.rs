// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Effects represent side effects the engine needs to perform.

use crate::event::Event;
use crate::job::JobId;
use crate::sandbox::{Phase, SandboxId, SandboxSpec};
use crate::timer::TimerId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Effects that need to be executed by the runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Effect {
    /// Emit a follow-up event into the engine loop.
    Emit { event: Event },

    /// Create the workspace volume (if needed), create the sandbox, and
    /// start it. Completion is reported back as `sandbox:started` or
    /// `sandbox:spawn-failed`.
    SpawnSandbox { job_id: JobId, phase: Phase, spec: SandboxSpec },

    /// Kill and remove a sandbox. Idempotent: a sandbox already gone is a
    /// success.
    KillSandbox { job_id: JobId, sandbox_id: SandboxId },

    /// Release the job's workspace. `destroy` removes the volume; a kept
    /// volume is the delivered artifact.
    ReleaseWorkspace { job_id: JobId, volume: String, destroy: bool },

    /// Publish the approved workspace through the external git interface.
    /// Completion is reported back as `commit:finished`.
    Commit { job_id: JobId, project_path: PathBuf },

    /// Set a timer.
    SetTimer {
        id: TimerId,
        #[serde(with = "duration_serde")]
        duration: Duration,
    },

    /// Cancel a timer.
    CancelTimer { id: TimerId },
}

impl Effect {
    /// Effect name for log spans (e.g., "spawn_sandbox", "commit").
    pub fn name(&self) -> &'static str {
        match self {
            Effect::Emit { .. } => "emit",
            Effect::SpawnSandbox { .. } => "spawn_sandbox",
            Effect::KillSandbox { .. } => "kill_sandbox",
            Effect::ReleaseWorkspace { .. } => "release_workspace",
            Effect::Commit { .. } => "commit",
            Effect::SetTimer { .. } => "set_timer",
            Effect::CancelTimer { .. } => "cancel_timer",
        }
    }

    /// Key-value pairs for structured logging.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        match self {
            Effect::Emit { event } => vec![("event", event.log_summary())],
            Effect::SpawnSandbox { job_id, phase, spec } => vec![
                ("job_id", job_id.to_string()),
                ("phase", phase.to_string()),
                ("image", spec.image.clone()),
                ("name", spec.name.clone()),
            ],
            Effect::KillSandbox { job_id, sandbox_id } => vec![
                ("job_id", job_id.to_string()),
                ("sandbox_id", sandbox_id.short().to_string()),
            ],
            Effect::ReleaseWorkspace { job_id, volume, destroy } => vec![
                ("job_id", job_id.to_string()),
                ("volume", volume.clone()),
                ("destroy", destroy.to_string()),
            ],
            Effect::Commit { job_id, project_path } => vec![
                ("job_id", job_id.to_string()),
                ("project_path", project_path.display().to_string()),
            ],
            Effect::SetTimer { id, duration } => vec![
                ("timer_id", id.to_string()),
                ("duration_ms", duration.as_millis().to_string()),
            ],
            Effect::CancelTimer { id } => vec![("timer_id", id.to_string())],
        }
    }

    /// Whether to log both 'started' and 'completed' or just one line,
    /// to control verbosity for frequent signaling effects.
    pub fn verbose(&self) -> bool {
        !matches!(self, Effect::Emit { .. } | Effect::SetTimer { .. } | Effect::CancelTimer { .. })
    }
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
        duration.as_millis().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}
