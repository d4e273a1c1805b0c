// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timer identifiers for engine-enforced deadlines.
//!
//! Timer IDs are string-encoded so they survive the WAL round trip; the
//! engine routes fired timers by parsing them back into a [`TimerKind`].

use crate::job::JobId;
use crate::sandbox::Phase;
use serde::{Deserialize, Serialize};

/// Unique identifier for a scheduled timer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimerId(String);

impl TimerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Deadline for one phase of a job (`phase:{job_id}:{build|check}`).
    pub fn phase_deadline(job_id: &JobId, phase: Phase) -> Self {
        Self(format!("phase:{}:{}", job_id, phase.as_str()))
    }

    /// Outer wall-clock cap for a job (`job:{job_id}`).
    pub fn job_deadline(job_id: &JobId) -> Self {
        Self(format!("job:{}", job_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse this timer ID into a typed [`TimerKind`].
    pub fn kind(&self) -> Option<TimerKind> {
        TimerKind::parse(&self.0)
    }
}

impl std::fmt::Display for TimerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parsed representation of a timer ID for type-safe routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerKind {
    PhaseDeadline { job_id: JobId, phase: Phase },
    JobDeadline { job_id: JobId },
}

impl TimerKind {
    /// Parse a timer ID string. Returns `None` for unrecognized formats.
    pub fn parse(id: &str) -> Option<TimerKind> {
        if let Some(rest) = id.strip_prefix("phase:") {
            let (job, phase) = rest.rsplit_once(':')?;
            return Some(TimerKind::PhaseDeadline {
                job_id: JobId::from_string(job),
                phase: Phase::parse(phase)?,
            });
        }
        if let Some(rest) = id.strip_prefix("job:") {
            return Some(TimerKind::JobDeadline { job_id: JobId::from_string(rest) });
        }
        None
    }
}

#[cfg(test)]
#[path = "timer_tests.rs"]
mod tests;
