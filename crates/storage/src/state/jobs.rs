// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job event handlers.

use super::MaterializedState;
use icarus_core::{Event, Job};

pub(crate) fn apply(state: &mut MaterializedState, event: &Event) {
    match event {
        Event::JobCreated { id, task, project_path, created_at_ms } => {
            // Guard against replay: creation is insert-once.
            if !state.jobs.contains_key(id.as_str()) {
                state.jobs.insert(
                    id.to_string(),
                    Job::new(*id, task.clone(), project_path.clone(), *created_at_ms),
                );
            }
        }

        Event::JobAdvanced { id, status, error, comment, at_ms } => {
            if let Some(job) = state.jobs.get_mut(id.as_str()) {
                // Illegal edges are ignored rather than applied; this is
                // what makes replayed duplicates no-ops.
                if job.status.can_advance_to(*status) {
                    job.advance(*status, error.clone(), comment.clone(), *at_ms);
                }
            }
        }

        Event::SandboxStarted { job_id, phase, sandbox_id } => {
            if let Some(job) = state.jobs.get_mut(job_id.as_str()) {
                // Only record the handle while the job is still in the
                // phase that asked for it; a late arrival after a timeout
                // must not resurrect a released handle.
                if job.status.phase() == Some(*phase) {
                    job.set_sandbox(*phase, sandbox_id.clone());
                }
            }
        }

        _ => {}
    }
}
