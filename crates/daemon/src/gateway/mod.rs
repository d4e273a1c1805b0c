// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP/WebSocket gateway.
//!
//! Stateless: every operation delegates to the engine handle or reads the
//! shared materialized state. Callbacks are not authenticated here; trust
//! derives from the sandbox network boundary.

mod stream;
mod types;

pub use types::WorkerCallback;

use crate::engine::{EngineError, EngineHandle};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use icarus_core::{Clock, Event, JobId, JobStatus, SystemClock};
use serde::Deserialize;
use serde_json::json;
use types::{
    ApprovalRequest, ApprovalResponse, AuditReportResponse, JobStatusResponse, JobSummary,
    SpawnJobRequest, SpawnJobResponse, TelemetryResponse,
};

/// Gateway error taxonomy, rendered as `{"error": ...}` JSON.
#[derive(Debug)]
pub(crate) enum ApiError {
    Invalid(String),
    NotFound(String),
    Conflict(String),
    Saturated,
    Unavailable,
}

impl From<EngineError> for ApiError {
    fn from(error: EngineError) -> Self {
        match &error {
            EngineError::JobNotFound(id) => ApiError::NotFound(format!("job {} not found", id)),
            EngineError::ApprovalConflict { .. } => ApiError::Conflict(error.to_string()),
            EngineError::InvalidRequest(message) => ApiError::Invalid(message.clone()),
            EngineError::Saturated => ApiError::Saturated,
            EngineError::ShuttingDown | EngineError::Unavailable => ApiError::Unavailable,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Invalid(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, message),
            ApiError::Saturated => {
                (StatusCode::SERVICE_UNAVAILABLE, "system under load".to_string())
            }
            ApiError::Unavailable => {
                (StatusCode::SERVICE_UNAVAILABLE, "orchestrator unavailable".to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Build the gateway router over an engine handle.
pub fn router(engine: EngineHandle) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/jobs/spawn", post(spawn_job))
        .route("/jobs", get(list_jobs))
        .route("/jobs/{id}/status", get(job_status))
        .route("/jobs/{id}/telemetry", get(job_telemetry))
        .route("/jobs/{id}/audit", get(job_audit))
        .route("/jobs/{id}/approve", post(approve_job))
        .route("/jobs/{id}/callback", post(worker_callback))
        .route("/jobs/{id}/stream", get(stream::stream_job))
        .with_state(engine)
}

/// Serve the gateway until the process exits.
pub async fn serve(
    listener: tokio::net::TcpListener,
    engine: EngineHandle,
) -> Result<(), std::io::Error> {
    axum::serve(listener, router(engine)).await
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "service": "ICARUS Orchestrator",
        "status": "operational",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn spawn_job(
    State(engine): State<EngineHandle>,
    Json(request): Json<SpawnJobRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let task = request
        .task
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Invalid("task is required".to_string()))?;
    let project_path = request
        .project_path
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::Invalid("project_path is required".to_string()))?;

    let job = engine.submit(task, project_path.into()).await?;

    Ok((
        StatusCode::CREATED,
        Json(SpawnJobResponse {
            job_id: job.id.to_string(),
            status: JobStatus::Pending,
            message: format!("job {} created and queued for execution", job.id),
        }),
    ))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    limit: Option<usize>,
    status: Option<String>,
}

async fn list_jobs(
    State(engine): State<EngineHandle>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<JobSummary>>, ApiError> {
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let status = match &query.status {
        None => None,
        Some(raw) => Some(
            JobStatus::parse(raw)
                .ok_or_else(|| ApiError::Invalid(format!("unknown status filter: {}", raw)))?,
        ),
    };

    let summaries = engine.with_state(|state| {
        state.jobs_newest_first(limit, status).into_iter().map(JobSummary::from).collect()
    });
    Ok(Json(summaries))
}

async fn job_status(
    State(engine): State<EngineHandle>,
    Path(id): Path<String>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let job = engine.job(&id).ok_or_else(|| ApiError::NotFound(format!("job {} not found", id)))?;
    Ok(Json(JobStatusResponse::from(&job)))
}

async fn job_telemetry(
    State(engine): State<EngineHandle>,
    Path(id): Path<String>,
) -> Result<Json<TelemetryResponse>, ApiError> {
    engine
        .with_state(|state| {
            let job = state.get_job(&id)?;
            Some(TelemetryResponse::new(job, state.latest_telemetry(&id)))
        })
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("job {} not found", id)))
}

async fn job_audit(
    State(engine): State<EngineHandle>,
    Path(id): Path<String>,
) -> Result<Json<AuditReportResponse>, ApiError> {
    engine
        .with_state(|state| state.audit(&id).map(AuditReportResponse::from))
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no audit report found for job {}", id)))
}

async fn approve_job(
    State(engine): State<EngineHandle>,
    Path(id): Path<String>,
    Json(request): Json<ApprovalRequest>,
) -> Result<Json<ApprovalResponse>, ApiError> {
    let approved = request
        .approved
        .ok_or_else(|| ApiError::Invalid("approved is required".to_string()))?;

    let status = engine.approve(&id, approved, request.comment).await?;

    let message = match status {
        JobStatus::Approved => format!("job {} approved", id),
        _ => format!("job {} rejected", id),
    };
    Ok(Json(ApprovalResponse { message, status }))
}

async fn worker_callback(
    State(engine): State<EngineHandle>,
    Path(id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let job = engine.job(&id).ok_or_else(|| ApiError::NotFound(format!("job {} not found", id)))?;
    let job_id: JobId = job.id;

    let callback = WorkerCallback::parse(&body).map_err(ApiError::Invalid)?;
    match callback {
        WorkerCallback::Progress { current_tool, cpu_usage, ram_usage_mb } => {
            let tool = current_tool.unwrap_or_default();
            engine
                .send_event(Event::TelemetrySampled {
                    job_id,
                    cpu_percent: cpu_usage.unwrap_or(0.0),
                    ram_mb: ram_usage_mb.unwrap_or(0.0),
                    current_tool: tool.clone(),
                    at_ms: SystemClock.epoch_ms(),
                })
                .await?;
            if !tool.is_empty() {
                engine.publish_log(&id, tool);
            }
        }
        WorkerCallback::Completion { audit_report } => {
            engine.send_event(Event::WorkerCompleted { job_id, audit_report }).await?;
        }
        WorkerCallback::Error { error } => {
            tracing::warn!(job_id = %id, error = %error, "worker reported error via callback");
            engine.send_event(Event::WorkerErrored { job_id, error }).await?;
        }
    }

    Ok(Json(json!({ "ok": true })))
}

#[cfg(test)]
#[path = "gateway_tests.rs"]
mod tests;
