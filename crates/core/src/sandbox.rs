// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sandbox types: phases, handles, and creation specs.
//!
//! A sandbox is an isolated worker container referenced by an opaque
//! handle. The engine never talks to the container runtime directly;
//! everything goes through the driver interface in the daemon crate.

use serde::{Deserialize, Serialize};

/// Name prefix for every sandbox the engine creates.
///
/// The sentinel enumerates by this prefix so its pause/resume side effects
/// never touch unrelated containers on the host.
pub const SANDBOX_NAME_PREFIX: &str = "icarus_";

/// Pipeline phase, each a single-sandbox execution with its own deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Build,
    Check,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Build => "build",
            Phase::Check => "check",
        }
    }

    pub fn parse(s: &str) -> Option<Phase> {
        match s {
            "build" => Some(Phase::Build),
            "check" => Some(Phase::Check),
            _ => None,
        }
    }
}

crate::simple_display! {
    Phase {
        Build => "build",
        Check => "check",
    }
}

/// Opaque handle to a sandbox, as issued by the container runtime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SandboxId(String);

impl SandboxId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the handle truncated for log lines.
    pub fn short(&self) -> &str {
        crate::id::short(&self.0, 12)
    }
}

impl std::fmt::Display for SandboxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SandboxId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SandboxId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Runtime status of a sandbox as reported by inspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxStatus {
    Running,
    Paused,
    Exited { exit_code: Option<i32> },
}

impl SandboxStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, SandboxStatus::Running)
    }
}

/// How a workspace is attached to a sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MountKind {
    /// Managed per-job volume, created and destroyed by the engine.
    Volume,
    /// Operator-managed host directory; never destroyed by the engine.
    Bind,
}

/// Workspace mount for a sandbox.
///
/// The builder mounts read-write, the checker read-only. The target inside
/// the container is always `/workspace`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountSpec {
    pub kind: MountKind,
    /// Volume name (`icarus_workspace_{job_id}`) or bind source path.
    pub source: String,
    pub read_only: bool,
}

pub const WORKSPACE_MOUNT_TARGET: &str = "/workspace";

/// Everything the driver needs to create a sandbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxSpec {
    /// Container name, always [`SANDBOX_NAME_PREFIX`]-prefixed.
    pub name: String,
    pub image: String,
    /// Fractional cores (best-effort cap enforced by the runtime).
    pub cpu_limit: f64,
    /// Memory cap in bytes (best-effort cap enforced by the runtime).
    pub memory_limit_bytes: u64,
    pub network_mode: String,
    /// Environment injected into the worker (`JOB_ID`, `TASK`,
    /// `ORCHESTRATOR_CALLBACK`, pass-through credentials).
    pub env: Vec<(String, String)>,
    pub mount: MountSpec,
}
