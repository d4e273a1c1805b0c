// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error types.

use icarus_core::JobStatus;
use thiserror::Error;

/// Errors surfaced to gateway callers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("job {id} is {status}, not awaiting approval")]
    ApprovalConflict { id: String, status: JobStatus },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("engine is shutting down")]
    ShuttingDown,

    #[error("system under load, submission refused")]
    Saturated,

    #[error("engine unavailable")]
    Unavailable,
}
