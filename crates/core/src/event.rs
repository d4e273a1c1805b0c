// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event types for the control plane.
//!
//! Events are facts; persisted state is derived from them by idempotent
//! replay. Signal events (worker callbacks, timers, sentinel edges) carry
//! no state change of their own; the engine's handlers turn them into
//! further fact events.

use crate::job::{JobId, JobStatus};
use crate::level::AdmissionLevel;
use crate::sandbox::{Phase, SandboxId};
use crate::timer::TimerId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Events that drive state transitions in the system.
///
/// Serializes with `{"type": "event:name", ...fields}` format.
/// Unknown type tags deserialize to `Custom`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename = "system:shutdown")]
    Shutdown,

    /// A job was submitted and enters the queue as `pending`.
    #[serde(rename = "job:created")]
    JobCreated { id: JobId, task: String, project_path: PathBuf, created_at_ms: u64 },

    /// A job's status advanced along one edge of the state machine.
    #[serde(rename = "job:advanced")]
    JobAdvanced {
        id: JobId,
        status: JobStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        comment: Option<String>,
        at_ms: u64,
    },

    /// A sandbox finished creation and is running for the given phase.
    #[serde(rename = "sandbox:started")]
    SandboxStarted { job_id: JobId, phase: Phase, sandbox_id: SandboxId },

    /// The driver could not create or start a sandbox.
    #[serde(rename = "sandbox:spawn-failed")]
    SandboxSpawnFailed { job_id: JobId, phase: Phase, reason: String },

    /// A worker progress callback carried resource figures.
    #[serde(rename = "telemetry:sampled")]
    TelemetrySampled {
        job_id: JobId,
        cpu_percent: f64,
        ram_mb: f64,
        #[serde(default)]
        current_tool: String,
        at_ms: u64,
    },

    /// The checker's audit payload, stored verbatim.
    #[serde(rename = "audit:recorded")]
    AuditRecorded { job_id: JobId, payload: serde_json::Value, at_ms: u64 },

    /// A worker reported phase completion.
    #[serde(rename = "worker:completed")]
    WorkerCompleted {
        job_id: JobId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        audit_report: Option<serde_json::Value>,
    },

    /// A worker reported a phase error.
    #[serde(rename = "worker:errored")]
    WorkerErrored { job_id: JobId, error: String },

    /// The post-approval commit side effect finished.
    #[serde(rename = "commit:finished")]
    CommitFinished {
        job_id: JobId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// An engine-scheduled timer fired.
    #[serde(rename = "timer:fired")]
    TimerFired { id: TimerId },

    /// The sentinel's admission level changed.
    #[serde(rename = "sentinel:changed")]
    SentinelChanged { level: AdmissionLevel },

    /// Catch-all for unknown event types (forward compatibility).
    #[serde(other, skip_serializing)]
    Custom,
}

impl Event {
    /// Short human summary for log lines.
    pub fn log_summary(&self) -> String {
        match self {
            Event::Shutdown => "shutdown".to_string(),
            Event::JobCreated { id, .. } => format!("job:created {}", id),
            Event::JobAdvanced { id, status, .. } => format!("job:advanced {} -> {}", id, status),
            Event::SandboxStarted { job_id, phase, sandbox_id } => {
                format!("sandbox:started {} {} {}", job_id, phase, sandbox_id.short())
            }
            Event::SandboxSpawnFailed { job_id, phase, .. } => {
                format!("sandbox:spawn-failed {} {}", job_id, phase)
            }
            Event::TelemetrySampled { job_id, .. } => format!("telemetry:sampled {}", job_id),
            Event::AuditRecorded { job_id, .. } => format!("audit:recorded {}", job_id),
            Event::WorkerCompleted { job_id, .. } => format!("worker:completed {}", job_id),
            Event::WorkerErrored { job_id, .. } => format!("worker:errored {}", job_id),
            Event::CommitFinished { job_id, error } => match error {
                Some(_) => format!("commit:finished {} (error)", job_id),
                None => format!("commit:finished {}", job_id),
            },
            Event::TimerFired { id } => format!("timer:fired {}", id),
            Event::SentinelChanged { level } => format!("sentinel:changed {}", level),
            Event::Custom => "custom".to_string(),
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
