// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job identifier and state machine.

use crate::sandbox::{Phase, SandboxId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

crate::define_id! {
    /// Unique identifier for a submitted job.
    ///
    /// Generated at submission; used to track the job's state, query its
    /// status, and address it in callbacks and push channels.
    pub struct JobId("job-");
}

/// Upper bound on the user-supplied task text, in bytes.
pub const MAX_TASK_LEN: usize = 8192;

/// Job lifecycle states.
///
/// Transitions advance only along the edges encoded in
/// [`JobStatus::can_advance_to`]; everything else is a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Building,
    Checking,
    AwaitingApproval,
    Approved,
    Rejected,
    Completed,
    Failed,
}

crate::simple_display! {
    JobStatus {
        Pending => "pending",
        Building => "building",
        Checking => "checking",
        AwaitingApproval => "awaiting_approval",
        Approved => "approved",
        Rejected => "rejected",
        Completed => "completed",
        Failed => "failed",
    }
}

impl JobStatus {
    /// Terminal states never change once entered.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Rejected)
    }

    /// States that occupy an admission slot.
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Building | JobStatus::Checking | JobStatus::Approved)
    }

    /// The sandbox phase running while in this status, if any.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            JobStatus::Building => Some(Phase::Build),
            JobStatus::Checking => Some(Phase::Check),
            _ => None,
        }
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_advance_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Building)
                | (Pending, Failed)
                | (Building, Checking)
                | (Building, Failed)
                | (Checking, AwaitingApproval)
                | (Checking, Failed)
                | (AwaitingApproval, Approved)
                | (AwaitingApproval, Rejected)
                | (Approved, Completed)
                | (Approved, Failed)
        )
    }

    pub fn parse(s: &str) -> Option<JobStatus> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "building" => Some(JobStatus::Building),
            "checking" => Some(JobStatus::Checking),
            "awaiting_approval" => Some(JobStatus::AwaitingApproval),
            "approved" => Some(JobStatus::Approved),
            "rejected" => Some(JobStatus::Rejected),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

/// One submitted task and its progress through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// User-supplied task text, bounded by [`MAX_TASK_LEN`].
    pub task: String,
    /// Workspace mount target on the host.
    pub project_path: PathBuf,
    pub status: JobStatus,
    /// Builder sandbox handle; non-empty exactly while `building`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builder_sandbox_id: Option<SandboxId>,
    /// Checker sandbox handle; non-empty exactly while `checking`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checker_sandbox_id: Option<SandboxId>,
    pub created_at_ms: u64,
    /// Set exactly when the status becomes terminal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Reviewer comment recorded by the approval gate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_comment: Option<String>,
}

impl Job {
    pub fn new(id: JobId, task: String, project_path: PathBuf, created_at_ms: u64) -> Self {
        Self {
            id,
            task,
            project_path,
            status: JobStatus::Pending,
            builder_sandbox_id: None,
            checker_sandbox_id: None,
            created_at_ms,
            completed_at_ms: None,
            error_message: None,
            review_comment: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Per-job workspace volume name.
    pub fn workspace_volume(&self) -> String {
        format!("icarus_workspace_{}", self.id)
    }

    /// The sandbox handle for the currently running phase, if any.
    pub fn active_sandbox(&self) -> Option<(Phase, &SandboxId)> {
        match self.status {
            JobStatus::Building => self.builder_sandbox_id.as_ref().map(|s| (Phase::Build, s)),
            JobStatus::Checking => self.checker_sandbox_id.as_ref().map(|s| (Phase::Check, s)),
            _ => None,
        }
    }

    /// Record a sandbox handle for the given phase.
    pub fn set_sandbox(&mut self, phase: Phase, sandbox_id: SandboxId) {
        match phase {
            Phase::Build => self.builder_sandbox_id = Some(sandbox_id),
            Phase::Check => self.checker_sandbox_id = Some(sandbox_id),
        }
    }

    /// Advance the job's status, maintaining the handle and timestamp
    /// invariants. The caller must have checked [`JobStatus::can_advance_to`].
    pub fn advance(
        &mut self,
        status: JobStatus,
        error: Option<String>,
        comment: Option<String>,
        at_ms: u64,
    ) {
        // Leaving `building` releases the builder handle; the checker
        // handle is released on any exit from `checking`. The two never
        // coexist.
        if self.status == JobStatus::Building && status != JobStatus::Building {
            self.builder_sandbox_id = None;
        }
        if self.status == JobStatus::Checking && status != JobStatus::Checking {
            self.checker_sandbox_id = None;
        }

        self.status = status;
        if let Some(error) = error {
            self.error_message = Some(error);
        }
        if let Some(comment) = comment {
            self.review_comment = Some(comment);
        }
        if status.is_terminal() {
            self.builder_sandbox_id = None;
            self.checker_sandbox_id = None;
            self.completed_at_ms = Some(at_ms);
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
