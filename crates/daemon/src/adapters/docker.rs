// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Docker sandbox driver — drives the docker CLI over subprocess calls.
//!
//! Containers are created with `--cpus`/`--memory` caps, a per-job
//! workspace volume at `/workspace`, and a `project=icarus` label.
//! Log tailing pipes `docker logs -f` line-by-line into a channel.

use crate::adapters::sandbox::{DriverError, SandboxDriver, SandboxEntry};
use async_trait::async_trait;
use icarus_core::{SandboxId, SandboxSpec, SandboxStatus, WORKSPACE_MOUNT_TARGET};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Buffer for in-flight log lines per tailer before backpressure.
const LOG_CHANNEL_CAPACITY: usize = 256;

#[derive(Clone, Default)]
pub struct DockerDriver;

impl DockerDriver {
    pub fn new() -> Self {
        Self
    }
}

/// Build the argument vector for `docker create` from a spec.
///
/// Split out of the trait impl so the flag layout is testable without a
/// docker daemon.
pub(crate) fn create_args(spec: &SandboxSpec) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "create".into(),
        "--name".into(),
        spec.name.clone(),
        "--label".into(),
        "project=icarus".into(),
        "--cpus".into(),
        format!("{}", spec.cpu_limit),
        "--memory".into(),
        format!("{}", spec.memory_limit_bytes),
        "--network".into(),
        spec.network_mode.clone(),
    ];
    let mount_type = match spec.mount.kind {
        icarus_core::MountKind::Volume => "volume",
        icarus_core::MountKind::Bind => "bind",
    };
    let mut mount = format!(
        "type={},source={},target={}",
        mount_type, spec.mount.source, WORKSPACE_MOUNT_TARGET
    );
    if spec.mount.read_only {
        mount.push_str(",readonly");
    }
    args.push("--mount".into());
    args.push(mount);
    for (key, value) in &spec.env {
        args.push("-e".into());
        args.push(format!("{}={}", key, value));
    }
    args.push(spec.image.clone());
    args
}

/// Map a docker stderr line to the driver error taxonomy.
fn classify_stderr(stderr: &str) -> Option<DriverError> {
    let lower = stderr.to_ascii_lowercase();
    if lower.contains("no such image")
        || lower.contains("pull access denied")
        || lower.contains("manifest unknown")
    {
        return Some(DriverError::ImageNotFound(stderr.to_string()));
    }
    if lower.contains("no space left") || lower.contains("cannot allocate memory") {
        return Some(DriverError::OutOfResources(stderr.to_string()));
    }
    if lower.contains("no such container") || lower.contains("no such volume") {
        return Some(DriverError::NotFound(stderr.to_string()));
    }
    if lower.contains("is not paused") || lower.contains("is already paused") {
        return Some(DriverError::StateInvalid(stderr.to_string()));
    }
    None
}

/// Run a docker CLI command and return stdout on success.
async fn run_docker(args: &[&str]) -> Result<String, DriverError> {
    let output = tokio::process::Command::new("docker")
        .args(args)
        .output()
        .await
        .map_err(|e| DriverError::Runtime(format!("failed to exec docker: {}", e)))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(classify_stderr(&stderr).unwrap_or_else(|| {
            DriverError::Runtime(format!(
                "docker {} failed: {}",
                args.first().unwrap_or(&""),
                stderr
            ))
        }))
    }
}

#[async_trait]
impl SandboxDriver for DockerDriver {
    async fn create(&self, spec: &SandboxSpec) -> Result<SandboxId, DriverError> {
        let args = create_args(spec);
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let id = run_docker(&arg_refs).await?;
        tracing::info!(name = %spec.name, sandbox_id = %icarus_core::short(&id, 12), "sandbox created");
        Ok(SandboxId::new(id))
    }

    async fn start(&self, id: &SandboxId) -> Result<(), DriverError> {
        run_docker(&["start", id.as_str()]).await.map(|_| ())
    }

    async fn inspect(&self, id: &SandboxId) -> Result<SandboxStatus, DriverError> {
        let out =
            run_docker(&["inspect", "-f", "{{.State.Status}} {{.State.ExitCode}}", id.as_str()])
                .await?;
        let mut parts = out.split_whitespace();
        let status = parts.next().unwrap_or_default();
        let exit_code = parts.next().and_then(|c| c.parse::<i32>().ok());
        Ok(match status {
            "running" => SandboxStatus::Running,
            "paused" => SandboxStatus::Paused,
            _ => SandboxStatus::Exited { exit_code },
        })
    }

    async fn pause(&self, id: &SandboxId) -> Result<(), DriverError> {
        run_docker(&["pause", id.as_str()]).await.map(|_| ())
    }

    async fn unpause(&self, id: &SandboxId) -> Result<(), DriverError> {
        run_docker(&["unpause", id.as_str()]).await.map(|_| ())
    }

    async fn kill(&self, id: &SandboxId) -> Result<(), DriverError> {
        match run_docker(&["kill", id.as_str()]).await {
            Ok(_) => Ok(()),
            // Killing a dead or missing sandbox is a success.
            Err(DriverError::NotFound(_)) | Err(DriverError::StateInvalid(_)) => Ok(()),
            Err(DriverError::Runtime(msg)) if msg.contains("is not running") => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn remove(&self, id: &SandboxId) -> Result<(), DriverError> {
        match run_docker(&["rm", "-f", id.as_str()]).await {
            Ok(_) | Err(DriverError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn list(&self, name_prefix: &str) -> Result<Vec<SandboxEntry>, DriverError> {
        let filter = format!("name={}", name_prefix);
        let out = run_docker(&[
            "ps",
            "--filter",
            &filter,
            "--format",
            "{{.ID}}\t{{.Names}}\t{{.State}}",
        ])
        .await?;

        let mut entries = Vec::new();
        for line in out.lines() {
            let mut cols = line.split('\t');
            let (Some(id), Some(name), Some(state)) = (cols.next(), cols.next(), cols.next())
            else {
                continue;
            };
            // `docker ps --filter name=` substring-matches; enforce the
            // prefix contract here.
            if !name.starts_with(name_prefix) {
                continue;
            }
            let status = match state {
                "running" => SandboxStatus::Running,
                "paused" => SandboxStatus::Paused,
                _ => SandboxStatus::Exited { exit_code: None },
            };
            entries.push(SandboxEntry { id: SandboxId::new(id), name: name.to_string(), status });
        }
        Ok(entries)
    }

    async fn tail_logs(&self, id: &SandboxId) -> Result<mpsc::Receiver<String>, DriverError> {
        let mut child = tokio::process::Command::new("docker")
            .args(["logs", "-f", id.as_str()])
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| DriverError::Runtime(format!("failed to exec docker logs: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DriverError::Runtime("docker logs produced no stdout".into()))?;

        let (tx, rx) = mpsc::channel(LOG_CHANNEL_CAPACITY);
        let sandbox = id.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tx.send(line).await.is_err() {
                    break;
                }
            }
            // The stream ends when the sandbox exits; reap the child.
            let _ = child.wait().await;
            tracing::debug!(sandbox_id = %sandbox.short(), "log tail ended");
        });
        Ok(rx)
    }

    async fn create_volume(&self, name: &str) -> Result<(), DriverError> {
        run_docker(&["volume", "create", name]).await.map(|_| ())
    }

    async fn remove_volume(&self, name: &str) -> Result<(), DriverError> {
        match run_docker(&["volume", "rm", name]).await {
            Ok(_) | Err(DriverError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
#[path = "docker_tests.rs"]
mod tests;
