// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker telemetry and audit records.

use crate::job::JobId;
use serde::{Deserialize, Serialize};

/// One worker heartbeat, appended per progress callback.
///
/// The latest sample per job is the served value; older samples are kept
/// in a bounded history ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub job_id: JobId,
    pub at_ms: u64,
    /// 0–100.
    pub cpu_percent: f64,
    pub ram_mb: f64,
    /// Tool the worker reported it is currently using; may be empty.
    #[serde(default)]
    pub current_tool: String,
}

/// Audit report produced by the checker, stored verbatim.
///
/// At most one per job; written when the checker's completion callback
/// carries a payload, immutable thereafter. The payload is opaque to the
/// control plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub job_id: JobId,
    pub payload: serde_json::Value,
    pub created_at_ms: u64,
}
