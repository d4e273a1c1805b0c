// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Commit publisher — the external git interface behind the approval gate.
//!
//! The control plane treats publishing as opaque: on approval it hands the
//! job to the publisher and waits for a single success/failure report.

use async_trait::async_trait;
use icarus_core::JobId;
use std::path::Path;

/// Publishes an approved job's workspace to the version-control remote.
#[async_trait]
pub trait CommitPublisher: Send + Sync + 'static {
    /// Commit and push the delivered artifact. The error string becomes
    /// the job's `error_message` on failure.
    async fn publish(&self, job_id: &JobId, project_path: &Path) -> Result<(), String>;
}

/// Publishes by shelling out to git in the project checkout.
#[derive(Clone, Default)]
pub struct GitCliPublisher;

impl GitCliPublisher {
    pub fn new() -> Self {
        Self
    }
}

async fn run_git(args: &[&str], cwd: &Path) -> Result<String, String> {
    let output = tokio::process::Command::new("git")
        .args(args)
        .current_dir(cwd)
        .output()
        .await
        .map_err(|e| format!("failed to exec git: {}", e))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(format!("git {} failed: {}", args.first().unwrap_or(&""), stderr.trim()))
    }
}

#[async_trait]
impl CommitPublisher for GitCliPublisher {
    async fn publish(&self, job_id: &JobId, project_path: &Path) -> Result<(), String> {
        tracing::info!(job_id = %job_id, path = %project_path.display(), "publishing approved artifact");

        run_git(&["add", "-A"], project_path).await?;

        // An empty diff is a legitimate outcome (the task was a no-op);
        // only a dirty tree gets a commit.
        let status = run_git(&["status", "--porcelain"], project_path).await?;
        if status.is_empty() {
            tracing::info!(job_id = %job_id, "workspace unchanged, nothing to publish");
            return Ok(());
        }

        let message = format!("icarus: approved artifact for {}", job_id);
        run_git(&["commit", "-m", &message], project_path).await?;
        run_git(&["push"], project_path).await?;

        tracing::info!(job_id = %job_id, "artifact pushed");
        Ok(())
    }
}
