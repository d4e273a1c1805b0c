// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake adapters for engine, sentinel, and gateway tests.

use crate::adapters::sandbox::{DriverError, SandboxDriver, SandboxEntry};
use crate::adapters::CommitPublisher;
use async_trait::async_trait;
use icarus_core::{JobId, SandboxId, SandboxSpec, SandboxStatus};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;

/// A recorded driver invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    Create(String),
    Start(SandboxId),
    Pause(SandboxId),
    Unpause(SandboxId),
    Kill(SandboxId),
    Remove(SandboxId),
    CreateVolume(String),
    RemoveVolume(String),
}

#[derive(Default)]
struct FakeDriverState {
    calls: Vec<DriverCall>,
    containers: HashMap<String, SandboxEntry>,
    next_create_error: Option<DriverError>,
    counter: u64,
}

/// In-memory sandbox driver that records calls and simulates container
/// state.
#[derive(Clone, Default)]
pub struct FakeSandboxDriver {
    state: Arc<Mutex<FakeDriverState>>,
}

impl FakeSandboxDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.state.lock().calls.clone()
    }

    /// Queue an error for the next `create` call.
    pub fn fail_next_create(&self, error: DriverError) {
        self.state.lock().next_create_error = Some(error);
    }

    /// Register a running sandbox directly (for sentinel tests).
    pub fn add_running(&self, id: &str, name: &str) {
        let mut state = self.state.lock();
        state.containers.insert(
            id.to_string(),
            SandboxEntry {
                id: SandboxId::new(id),
                name: name.to_string(),
                status: SandboxStatus::Running,
            },
        );
    }

    pub fn status_of(&self, id: &str) -> Option<SandboxStatus> {
        self.state.lock().containers.get(id).map(|e| e.status)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state.lock().containers.contains_key(id)
    }
}

#[async_trait]
impl SandboxDriver for FakeSandboxDriver {
    async fn create(&self, spec: &SandboxSpec) -> Result<SandboxId, DriverError> {
        let mut state = self.state.lock();
        state.calls.push(DriverCall::Create(spec.name.clone()));
        if let Some(error) = state.next_create_error.take() {
            return Err(error);
        }
        state.counter += 1;
        let id = SandboxId::new(format!("sb-{}", state.counter));
        state.containers.insert(
            id.as_str().to_string(),
            SandboxEntry {
                id: id.clone(),
                name: spec.name.clone(),
                status: SandboxStatus::Exited { exit_code: None },
            },
        );
        Ok(id)
    }

    async fn start(&self, id: &SandboxId) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        state.calls.push(DriverCall::Start(id.clone()));
        match state.containers.get_mut(id.as_str()) {
            Some(entry) => {
                entry.status = SandboxStatus::Running;
                Ok(())
            }
            None => Err(DriverError::NotFound(id.to_string())),
        }
    }

    async fn inspect(&self, id: &SandboxId) -> Result<SandboxStatus, DriverError> {
        self.state
            .lock()
            .containers
            .get(id.as_str())
            .map(|e| e.status)
            .ok_or_else(|| DriverError::NotFound(id.to_string()))
    }

    async fn pause(&self, id: &SandboxId) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        state.calls.push(DriverCall::Pause(id.clone()));
        match state.containers.get_mut(id.as_str()) {
            Some(entry) if entry.status == SandboxStatus::Running => {
                entry.status = SandboxStatus::Paused;
                Ok(())
            }
            Some(_) => Err(DriverError::StateInvalid(id.to_string())),
            None => Err(DriverError::NotFound(id.to_string())),
        }
    }

    async fn unpause(&self, id: &SandboxId) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        state.calls.push(DriverCall::Unpause(id.clone()));
        match state.containers.get_mut(id.as_str()) {
            Some(entry) if entry.status == SandboxStatus::Paused => {
                entry.status = SandboxStatus::Running;
                Ok(())
            }
            Some(_) => Err(DriverError::StateInvalid(id.to_string())),
            None => Err(DriverError::NotFound(id.to_string())),
        }
    }

    async fn kill(&self, id: &SandboxId) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        state.calls.push(DriverCall::Kill(id.clone()));
        if let Some(entry) = state.containers.get_mut(id.as_str()) {
            entry.status = SandboxStatus::Exited { exit_code: Some(137) };
        }
        // Idempotent: missing sandbox is a success.
        Ok(())
    }

    async fn remove(&self, id: &SandboxId) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        state.calls.push(DriverCall::Remove(id.clone()));
        state.containers.remove(id.as_str());
        Ok(())
    }

    async fn list(&self, name_prefix: &str) -> Result<Vec<SandboxEntry>, DriverError> {
        Ok(self
            .state
            .lock()
            .containers
            .values()
            .filter(|e| e.name.starts_with(name_prefix))
            .cloned()
            .collect())
    }

    async fn tail_logs(&self, _id: &SandboxId) -> Result<mpsc::Receiver<String>, DriverError> {
        let (_tx, rx) = mpsc::channel(1);
        Ok(rx)
    }

    async fn create_volume(&self, name: &str) -> Result<(), DriverError> {
        self.state.lock().calls.push(DriverCall::CreateVolume(name.to_string()));
        Ok(())
    }

    async fn remove_volume(&self, name: &str) -> Result<(), DriverError> {
        self.state.lock().calls.push(DriverCall::RemoveVolume(name.to_string()));
        Ok(())
    }
}

/// Commit publisher with scriptable outcomes.
#[derive(Clone, Default)]
pub struct FakeCommitPublisher {
    published: Arc<Mutex<Vec<JobId>>>,
    fail_with: Arc<Mutex<Option<String>>>,
}

impl FakeCommitPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(&self, message: &str) {
        *self.fail_with.lock() = Some(message.to_string());
    }

    pub fn published(&self) -> Vec<JobId> {
        self.published.lock().clone()
    }
}

#[async_trait]
impl CommitPublisher for FakeCommitPublisher {
    async fn publish(&self, job_id: &JobId, _project_path: &Path) -> Result<(), String> {
        if let Some(message) = self.fail_with.lock().clone() {
            return Err(message);
        }
        self.published.lock().push(*job_id);
        Ok(())
    }
}
