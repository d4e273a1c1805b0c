// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The human approval gate.

use super::Engine;
use crate::engine::EngineError;
use icarus_core::{Clock, Event, JobStatus};

impl<C: Clock> Engine<C> {
    /// Resolve the approval gate for a job.
    ///
    /// Valid only in `awaiting_approval`; anything else is a conflict and
    /// leaves the job untouched, which makes replaying an approval safe
    /// exactly once.
    pub(crate) async fn approve(
        &mut self,
        job_id: &str,
        approved: bool,
        comment: Option<String>,
    ) -> Result<JobStatus, EngineError> {
        let job = self
            .get_job(job_id)
            .ok_or_else(|| EngineError::JobNotFound(job_id.to_string()))?;

        if job.status != JobStatus::AwaitingApproval {
            return Err(EngineError::ApprovalConflict {
                id: job_id.to_string(),
                status: job.status,
            });
        }

        let status = if approved { JobStatus::Approved } else { JobStatus::Rejected };
        tracing::info!(job_id = %job_id, decision = %status, comment = ?comment, "review decision");

        self.step(Event::JobAdvanced {
            id: job.id,
            status,
            error: None,
            comment,
            at_ms: self.clock.epoch_ms(),
        })
        .await;

        Ok(status)
    }
}
