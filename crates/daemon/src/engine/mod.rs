// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ICARUS execution engine: admission, phase sequencing, approval gate.

mod broadcast;
mod error;
mod executor;
mod runtime;
mod scheduler;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use broadcast::{BroadcastHub, StreamMessage, SUBSCRIBER_BUFFER};
pub use error::EngineError;
pub use runtime::{Engine, EngineDeps};

use icarus_core::{Event, Job, JobStatus};
use icarus_storage::MaterializedState;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Mailbox messages for the engine actor loop.
///
/// All Job mutation is serialized through this mailbox; the gateway's
/// commands round-trip with a oneshot reply.
pub enum EngineMsg {
    Event(Event),
    Submit {
        task: String,
        project_path: PathBuf,
        reply: oneshot::Sender<Result<Job, EngineError>>,
    },
    Approve {
        job_id: String,
        approved: bool,
        comment: Option<String>,
        reply: oneshot::Sender<Result<JobStatus, EngineError>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable handle the gateway uses to reach the engine.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineMsg>,
    state: Arc<Mutex<MaterializedState>>,
    hub: BroadcastHub,
}

impl EngineHandle {
    pub(crate) fn new(
        tx: mpsc::Sender<EngineMsg>,
        state: Arc<Mutex<MaterializedState>>,
        hub: BroadcastHub,
    ) -> Self {
        Self { tx, state, hub }
    }

    pub async fn submit(&self, task: String, project_path: PathBuf) -> Result<Job, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(EngineMsg::Submit { task, project_path, reply })
            .await
            .map_err(|_| EngineError::Unavailable)?;
        rx.await.map_err(|_| EngineError::Unavailable)?
    }

    pub async fn approve(
        &self,
        job_id: &str,
        approved: bool,
        comment: Option<String>,
    ) -> Result<JobStatus, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(EngineMsg::Approve { job_id: job_id.to_string(), approved, comment, reply })
            .await
            .map_err(|_| EngineError::Unavailable)?;
        rx.await.map_err(|_| EngineError::Unavailable)?
    }

    /// Feed a callback-derived event into the engine loop.
    pub async fn send_event(&self, event: Event) -> Result<(), EngineError> {
        self.tx.send(EngineMsg::Event(event)).await.map_err(|_| EngineError::Unavailable)
    }

    /// Request graceful shutdown; resolves when the loop has drained.
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(EngineMsg::Shutdown { reply }).await.map_err(|_| EngineError::Unavailable)?;
        rx.await.map_err(|_| EngineError::Unavailable)
    }

    pub fn job(&self, job_id: &str) -> Option<Job> {
        self.state.lock().get_job(job_id).cloned()
    }

    /// Serialized read access to the materialized state.
    pub fn with_state<T>(&self, f: impl FnOnce(&MaterializedState) -> T) -> T {
        let state = self.state.lock();
        f(&state)
    }

    pub fn subscribe(&self, job_id: &str) -> mpsc::Receiver<StreamMessage> {
        self.hub.subscribe(job_id)
    }

    pub fn publish_log(&self, job_id: &str, message: String) {
        self.hub.publish_log(job_id, message);
    }
}
