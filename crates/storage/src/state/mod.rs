// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state from WAL replay.

mod jobs;
mod telemetry;

use icarus_core::{AuditRecord, Event, Job, JobId, JobStatus, TelemetrySample};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// How many telemetry samples are retained per job. The contract only
/// guarantees the most recent one.
pub const TELEMETRY_HISTORY: usize = 60;

/// Materialized state built from WAL events.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MaterializedState {
    pub jobs: HashMap<String, Job>,
    /// Bounded per-job telemetry rings, newest last.
    #[serde(default)]
    pub telemetry: HashMap<String, VecDeque<TelemetrySample>>,
    /// At most one audit record per job; first write wins.
    #[serde(default)]
    pub audits: HashMap<String, AuditRecord>,
}

impl MaterializedState {
    pub fn get_job(&self, id: &str) -> Option<&Job> {
        self.jobs.get(id)
    }

    /// Jobs ordered newest-first by submission time, optionally filtered
    /// by status, capped at `limit`.
    pub fn jobs_newest_first(&self, limit: usize, status: Option<JobStatus>) -> Vec<&Job> {
        let mut jobs: Vec<&Job> = self
            .jobs
            .values()
            .filter(|j| status.is_none_or(|s| j.status == s))
            .collect();
        jobs.sort_by(|a, b| {
            b.created_at_ms.cmp(&a.created_at_ms).then_with(|| b.id.as_str().cmp(a.id.as_str()))
        });
        jobs.truncate(limit);
        jobs
    }

    /// Pending jobs in admission order: oldest `created_at_ms` first,
    /// job id lexicographic tiebreak.
    pub fn pending_oldest_first(&self) -> Vec<JobId> {
        let mut pending: Vec<&Job> =
            self.jobs.values().filter(|j| j.status == JobStatus::Pending).collect();
        pending.sort_by(|a, b| {
            a.created_at_ms.cmp(&b.created_at_ms).then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });
        pending.iter().map(|j| j.id).collect()
    }

    /// Jobs currently occupying admission slots.
    pub fn active_count(&self) -> usize {
        self.jobs.values().filter(|j| j.status.is_active()).count()
    }

    /// Non-terminal jobs (used for orphan recovery and shutdown).
    pub fn live_jobs(&self) -> Vec<&Job> {
        self.jobs.values().filter(|j| !j.is_terminal()).collect()
    }

    pub fn latest_telemetry(&self, job_id: &str) -> Option<&TelemetrySample> {
        self.telemetry.get(job_id).and_then(|ring| ring.back())
    }

    pub fn audit(&self, job_id: &str) -> Option<&AuditRecord> {
        self.audits.get(job_id)
    }

    /// Apply an event to derive state changes.
    ///
    /// # Idempotency requirement
    ///
    /// All event handlers MUST be idempotent: applying the same event twice
    /// must produce the same state as applying it once, because events are
    /// re-applied during WAL replay after a snapshot race. Guard inserts
    /// with existence checks and transitions with legality checks.
    pub fn apply_event(&mut self, event: &Event) {
        match event {
            Event::JobCreated { .. } | Event::JobAdvanced { .. } | Event::SandboxStarted { .. } => {
                jobs::apply(self, event)
            }

            Event::TelemetrySampled { .. } | Event::AuditRecorded { .. } => {
                telemetry::apply(self, event)
            }

            // Signal events handled by the runtime; no persisted state.
            Event::Shutdown
            | Event::SandboxSpawnFailed { .. }
            | Event::WorkerCompleted { .. }
            | Event::WorkerErrored { .. }
            | Event::CommitFinished { .. }
            | Event::TimerFired { .. }
            | Event::SentinelChanged { .. }
            | Event::Custom => {}
        }
    }
}

#[cfg(test)]
#[path = "../state_tests.rs"]
mod tests;
