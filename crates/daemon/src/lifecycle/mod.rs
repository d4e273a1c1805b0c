// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: startup, recovery, shutdown.

mod startup;

pub use startup::{startup, startup_with, StartupResult};

use crate::config::ConfigError;
use icarus_storage::{save_snapshot, Snapshot, SnapshotError, WalError};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

/// Lifecycle errors. Any of these at startup refuses to start the daemon.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("could not determine state directory (set --state-dir or HOME)")]
    NoStateDir,

    #[error("failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("failed to bind {0}: {1}")]
    BindFailed(String, std::io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("WAL error: {0}")]
    Wal(#[from] WalError),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Filesystem layout under the state directory.
#[derive(Debug, Clone)]
pub struct Paths {
    pub state_dir: PathBuf,
    pub lock_path: PathBuf,
    pub wal_path: PathBuf,
    pub snapshot_path: PathBuf,
}

impl Paths {
    pub fn under(state_dir: PathBuf) -> Self {
        Self {
            lock_path: state_dir.join("daemon.pid"),
            wal_path: state_dir.join("wal").join("events.wal"),
            snapshot_path: state_dir.join("snapshot.json"),
            state_dir,
        }
    }
}

/// Default state directory: `$XDG_STATE_HOME/icarus` or
/// `~/.local/state/icarus`.
pub fn default_state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("XDG_STATE_HOME") {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir).join("icarus"));
        }
    }
    std::env::var("HOME")
        .map(|home| PathBuf::from(home).join(".local/state/icarus"))
        .map_err(|_| LifecycleError::NoStateDir)
}

/// Run the daemon until a shutdown signal, then drain and snapshot.
pub async fn run(config: crate::config::Config, state_dir: PathBuf) -> Result<(), LifecycleError> {
    let started = startup(&config, state_dir).await?;
    let handle = started.handle.clone();
    let paths = started.paths.clone();

    info!(
        addr = %format!("{}:{}", config.orchestrator.host, config.orchestrator.port),
        "ICARUS orchestrator ready"
    );

    let server = tokio::spawn(crate::gateway::serve(started.listener, handle.clone()));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
        result = server => {
            warn!(?result, "gateway exited unexpectedly");
        }
    }

    // Drain the engine: refuse admissions, kill live sandboxes, fail
    // in-flight jobs, close push channels.
    if let Err(e) = handle.shutdown().await {
        warn!(error = %e, "engine shutdown incomplete");
    }

    // Final snapshot so the next startup skips WAL replay.
    let seq = started.wal.lock().processed_seq();
    if seq > 0 {
        let snapshot = Snapshot::new(seq, started.state.lock().clone());
        match save_snapshot(&paths.snapshot_path, &snapshot) {
            Ok(()) => info!(seq, "saved shutdown snapshot"),
            Err(e) => warn!(error = %e, "failed to save shutdown snapshot"),
        }
    }

    if paths.lock_path.exists() {
        let _ = std::fs::remove_file(&paths.lock_path);
    }

    info!("shutdown complete");
    Ok(())
}
