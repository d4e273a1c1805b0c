// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-job fan-out to push-channel subscribers.
//!
//! Every subscriber gets its own bounded buffer; a slow subscriber whose
//! buffer fills is disconnected rather than allowed to stall the
//! pipeline. Subscribers that connect after a terminal transition receive
//! that terminal status immediately and then the channel closes.

use icarus_core::JobStatus;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Per-subscriber buffer capacity, in messages.
pub const SUBSCRIBER_BUFFER: usize = 64;

/// How long a job's channel stays open after its terminal transition.
const CLOSE_GRACE: Duration = Duration::from_millis(500);

/// One message on a job's push channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamMessage {
    StatusUpdate { status: JobStatus },
    Log { message: String },
}

#[derive(Default)]
struct JobChannel {
    subscribers: Vec<mpsc::Sender<StreamMessage>>,
    /// Recorded terminal status; set once, kept so late subscribers still
    /// observe it.
    terminal: Option<JobStatus>,
}

/// Owner of all per-job broadcasters. One instance per process.
#[derive(Clone, Default)]
pub struct BroadcastHub {
    inner: Arc<Mutex<HashMap<String, JobChannel>>>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new subscriber to a job's channel.
    ///
    /// After a terminal transition the receiver yields exactly the
    /// terminal status and then closes.
    pub fn subscribe(&self, job_id: &str) -> mpsc::Receiver<StreamMessage> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let mut inner = self.inner.lock();
        let channel = inner.entry(job_id.to_string()).or_default();
        match channel.terminal {
            Some(status) => {
                // Dropping tx right after closes the stream behind the
                // terminal message.
                let _ = tx.try_send(StreamMessage::StatusUpdate { status });
            }
            None => channel.subscribers.push(tx),
        }
        rx
    }

    /// Publish a status transition to every subscriber of the job.
    pub fn publish_status(&self, job_id: &str, status: JobStatus) {
        let mut inner = self.inner.lock();
        let channel = inner.entry(job_id.to_string()).or_default();
        if status.is_terminal() {
            channel.terminal = Some(status);
        }
        fanout(&mut channel.subscribers, StreamMessage::StatusUpdate { status }, job_id);
    }

    /// Forward a log line, best-effort. Nothing is sent after the
    /// terminal transition; the terminal status stays the last message.
    pub fn publish_log(&self, job_id: &str, message: String) {
        let mut inner = self.inner.lock();
        if let Some(channel) = inner.get_mut(job_id) {
            if channel.terminal.is_none() {
                fanout(&mut channel.subscribers, StreamMessage::Log { message }, job_id);
            }
        }
    }

    /// Close the job's channel after a brief grace, letting in-flight
    /// subscribers drain the terminal message.
    pub fn close_after_grace(&self, job_id: &str) {
        let hub = self.clone();
        let job_id = job_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(CLOSE_GRACE).await;
            if let Some(channel) = hub.inner.lock().get_mut(&job_id) {
                channel.subscribers.clear();
            }
        });
    }

    /// Drop every subscriber on every channel (graceful shutdown).
    pub fn close_all(&self) {
        for channel in self.inner.lock().values_mut() {
            channel.subscribers.clear();
        }
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self, job_id: &str) -> usize {
        self.inner.lock().get(job_id).map_or(0, |c| c.subscribers.len())
    }
}

/// Send to each subscriber, dropping closed receivers and laggards.
fn fanout(subscribers: &mut Vec<mpsc::Sender<StreamMessage>>, message: StreamMessage, job_id: &str) {
    subscribers.retain(|tx| match tx.try_send(message.clone()) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Closed(_)) => false,
        Err(mpsc::error::TrySendError::Full(_)) => {
            tracing::warn!(job_id = %job_id, "dropping laggard subscriber");
            false
        }
    });
}

#[cfg(test)]
#[path = "broadcast_tests.rs"]
mod tests;
