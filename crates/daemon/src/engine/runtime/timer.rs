// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deadline timer handling.

use super::Engine;
use icarus_core::{Clock, Effect, TimerId, TimerKind};

impl<C: Clock> Engine<C> {
    /// Route a fired timer to its deadline handler.
    ///
    /// Deadlines race against completion callbacks; the serialized loop
    /// resolves the race to whichever event it processes first, and the
    /// loser observes the changed status and becomes a no-op.
    pub(crate) fn handle_timer(&self, id: &TimerId) -> Vec<Effect> {
        match id.kind() {
            Some(TimerKind::PhaseDeadline { job_id, phase }) => {
                let Some(job) = self.get_job(job_id.as_str()) else {
                    return Vec::new();
                };
                if job.status.phase() != Some(phase) {
                    // Completion won the race.
                    return Vec::new();
                }
                tracing::warn!(
                    job_id = %job_id,
                    phase = %phase,
                    status = %job.status,
                    "phase deadline exceeded"
                );
                self.fail_effects(&job, "phase timeout".to_string())
            }

            Some(TimerKind::JobDeadline { job_id }) => {
                let Some(job) = self.get_job(job_id.as_str()) else {
                    return Vec::new();
                };
                // The outer cap applies while the job occupies a slot;
                // awaiting_approval disarms it.
                if !job.status.is_active() {
                    return Vec::new();
                }
                tracing::warn!(job_id = %job_id, status = %job.status, "job deadline exceeded");
                self.fail_effects(&job, "job timeout".to_string())
            }

            None => {
                tracing::warn!(timer_id = %id, "unrecognized timer fired");
                Vec::new()
            }
        }
    }
}
