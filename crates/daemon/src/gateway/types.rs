// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire DTOs for the HTTP surface.
//!
//! Request bodies deserialize with optional fields and are validated
//! explicitly so malformed bodies answer 400 rather than a framework
//! rejection. Timestamps on the wire are epoch milliseconds.

use icarus_core::{AuditRecord, Job, JobStatus, TelemetrySample};
use serde::{Deserialize, Serialize};

/// `POST /jobs/spawn` request.
#[derive(Debug, Deserialize)]
pub struct SpawnJobRequest {
    pub task: Option<String>,
    pub project_path: Option<String>,
}

/// `POST /jobs/spawn` response.
#[derive(Debug, Serialize)]
pub struct SpawnJobResponse {
    pub job_id: String,
    /// Always `pending`: the job enters the queue; admission is the
    /// scheduler's decision.
    pub status: JobStatus,
    pub message: String,
}

/// `GET /jobs` entry.
#[derive(Debug, Serialize)]
pub struct JobSummary {
    pub job_id: String,
    pub task: String,
    pub status: JobStatus,
    pub created_at: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<u64>,
}

impl From<&Job> for JobSummary {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id.to_string(),
            task: job.task.clone(),
            status: job.status,
            created_at: job.created_at_ms,
            completed_at: job.completed_at_ms,
        }
    }
}

/// `GET /jobs/{id}/status` response.
#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub task: String,
    pub created_at: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl From<&Job> for JobStatusResponse {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id.to_string(),
            status: job.status,
            task: job.task.clone(),
            created_at: job.created_at_ms,
            completed_at: job.completed_at_ms,
            error_message: job.error_message.clone(),
        }
    }
}

/// `GET /jobs/{id}/telemetry` response. Zeros until the first sample.
#[derive(Debug, Serialize)]
pub struct TelemetryResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub cpu_usage: f64,
    pub ram_usage_mb: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_tool: Option<String>,
}

impl TelemetryResponse {
    pub fn new(job: &Job, sample: Option<&TelemetrySample>) -> Self {
        Self {
            job_id: job.id.to_string(),
            status: job.status,
            cpu_usage: sample.map_or(0.0, |s| s.cpu_percent),
            ram_usage_mb: sample.map_or(0.0, |s| s.ram_mb),
            current_tool: sample
                .map(|s| s.current_tool.clone())
                .filter(|tool| !tool.is_empty()),
        }
    }
}

/// `GET /jobs/{id}/audit` response.
#[derive(Debug, Serialize)]
pub struct AuditReportResponse {
    pub job_id: String,
    pub audit_report: serde_json::Value,
    pub created_at: u64,
}

impl From<&AuditRecord> for AuditReportResponse {
    fn from(record: &AuditRecord) -> Self {
        Self {
            job_id: record.job_id.to_string(),
            audit_report: record.payload.clone(),
            created_at: record.created_at_ms,
        }
    }
}

/// `POST /jobs/{id}/approve` request.
#[derive(Debug, Deserialize)]
pub struct ApprovalRequest {
    pub approved: Option<bool>,
    pub comment: Option<String>,
}

/// `POST /jobs/{id}/approve` response.
#[derive(Debug, Serialize)]
pub struct ApprovalResponse {
    pub message: String,
    pub status: JobStatus,
}

/// One worker callback, discriminated by the `status` field.
///
/// `status: "completed"` and `status: "error"` are terminal phase
/// reports; absence of `status` is a progress heartbeat. Any other
/// `status` value is an unknown shape and rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerCallback {
    Progress {
        current_tool: Option<String>,
        cpu_usage: Option<f64>,
        ram_usage_mb: Option<f64>,
    },
    Completion {
        audit_report: Option<serde_json::Value>,
    },
    Error {
        error: String,
    },
}

impl WorkerCallback {
    pub fn parse(value: &serde_json::Value) -> Result<WorkerCallback, String> {
        let Some(body) = value.as_object() else {
            return Err("callback body must be a JSON object".to_string());
        };

        match body.get("status") {
            None => Ok(WorkerCallback::Progress {
                current_tool: body
                    .get("current_tool")
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
                cpu_usage: body.get("cpu_usage").and_then(|v| v.as_f64()),
                ram_usage_mb: body.get("ram_usage_mb").and_then(|v| v.as_f64()),
            }),
            Some(serde_json::Value::String(status)) if status == "completed" => {
                Ok(WorkerCallback::Completion { audit_report: body.get("audit_report").cloned() })
            }
            Some(serde_json::Value::String(status)) if status == "error" => {
                let error = body
                    .get("error")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| "error callback requires an 'error' string".to_string())?;
                Ok(WorkerCallback::Error { error: error.to_string() })
            }
            Some(other) => Err(format!("unknown callback status: {}", other)),
        }
    }
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
