// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sandbox driver interface.
//!
//! A thin capability layer over the container runtime. The engine and
//! sentinel depend only on this trait; the docker implementation lives in
//! [`crate::adapters::docker`].

use async_trait::async_trait;
use icarus_core::{SandboxId, SandboxSpec, SandboxStatus};
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors surfaced by the sandbox driver.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DriverError {
    #[error("image not found: {0}")]
    ImageNotFound(String),
    #[error("out of resources: {0}")]
    OutOfResources(String),
    #[error("sandbox not found: {0}")]
    NotFound(String),
    #[error("invalid sandbox state: {0}")]
    StateInvalid(String),
    #[error("runtime error: {0}")]
    Runtime(String),
}

/// One live sandbox as reported by `list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxEntry {
    pub id: SandboxId,
    pub name: String,
    pub status: SandboxStatus,
}

/// Capability layer over the container runtime.
///
/// CPU and memory limits are best-effort caps enforced by the runtime;
/// callers do not re-check them.
#[async_trait]
pub trait SandboxDriver: Send + Sync + 'static {
    /// Create a sandbox from a creation spec. Does not start it.
    async fn create(&self, spec: &SandboxSpec) -> Result<SandboxId, DriverError>;

    async fn start(&self, id: &SandboxId) -> Result<(), DriverError>;

    async fn inspect(&self, id: &SandboxId) -> Result<SandboxStatus, DriverError>;

    async fn pause(&self, id: &SandboxId) -> Result<(), DriverError>;

    async fn unpause(&self, id: &SandboxId) -> Result<(), DriverError>;

    /// Kill a sandbox. Idempotent: killing a dead or missing sandbox
    /// succeeds.
    async fn kill(&self, id: &SandboxId) -> Result<(), DriverError>;

    /// Remove a sandbox. Idempotent: removing a missing sandbox succeeds.
    async fn remove(&self, id: &SandboxId) -> Result<(), DriverError>;

    /// Live sandboxes whose name starts with `name_prefix`.
    async fn list(&self, name_prefix: &str) -> Result<Vec<SandboxEntry>, DriverError>;

    /// Follow the sandbox's log stream. The receiver yields lines until
    /// the sandbox exits, then closes.
    async fn tail_logs(&self, id: &SandboxId) -> Result<mpsc::Receiver<String>, DriverError>;

    /// Create a named workspace volume. Creating an existing volume
    /// succeeds.
    async fn create_volume(&self, name: &str) -> Result<(), DriverError>;

    /// Remove a named workspace volume. Removing a missing volume
    /// succeeds.
    async fn remove_volume(&self, name: &str) -> Result<(), DriverError>;
}
