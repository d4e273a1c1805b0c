// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup and recovery.

use super::{LifecycleError, Paths};
use crate::adapters::{CommitPublisher, DockerDriver, GitCliPublisher, SandboxDriver};
use crate::config::Config;
use crate::engine::{BroadcastHub, Engine, EngineDeps, EngineHandle};
use crate::sentinel::{Sentinel, SysinfoSampler};
use fs2::FileExt;
use icarus_core::{Clock, Event, JobStatus, SystemClock};
use icarus_storage::{load_snapshot, MaterializedState, Wal};
use parking_lot::Mutex;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Everything a running daemon needs after startup.
pub struct StartupResult {
    pub paths: Paths,
    pub handle: EngineHandle,
    pub listener: tokio::net::TcpListener,
    pub state: Arc<Mutex<MaterializedState>>,
    pub wal: Arc<Mutex<Wal>>,
    /// Held to maintain the exclusive pid-file lock; released on drop.
    #[allow(dead_code)]
    lock_file: std::fs::File,
    pub engine_task: tokio::task::JoinHandle<()>,
}

/// Start the daemon with the production adapters.
pub async fn startup(config: &Config, state_dir: PathBuf) -> Result<StartupResult, LifecycleError> {
    let driver = Arc::new(DockerDriver::new());
    let publisher = Arc::new(GitCliPublisher::new());
    startup_with(config, state_dir, driver, publisher).await
}

/// Startup with injectable adapters (used directly by tests).
pub async fn startup_with(
    config: &Config,
    state_dir: PathBuf,
    driver: Arc<dyn SandboxDriver>,
    publisher: Arc<dyn CommitPublisher>,
) -> Result<StartupResult, LifecycleError> {
    let paths = Paths::under(state_dir);
    std::fs::create_dir_all(&paths.state_dir)?;

    // Acquire the lock first to prevent two daemons racing over the same
    // state. Open without truncating so a losing candidate doesn't wipe
    // the running daemon's pid.
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&paths.lock_path)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;
    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file;

    // Recover state: snapshot plus WAL tail.
    let (mut state, processed_seq) = match load_snapshot(&paths.snapshot_path)? {
        Some(snapshot) => {
            info!(seq = snapshot.seq, jobs = snapshot.state.jobs.len(), "loaded snapshot");
            (snapshot.state, snapshot.seq)
        }
        None => {
            info!("no snapshot found, starting with empty state");
            (MaterializedState::default(), 0)
        }
    };

    let mut wal = Wal::open(&paths.wal_path, processed_seq)?;
    let tail = wal.entries_after(processed_seq)?;
    let replayed = tail.len();
    let mut last_seq = processed_seq;
    for entry in tail {
        state.apply_event(&entry.event);
        last_seq = entry.seq;
    }
    wal.mark_processed(last_seq);
    if replayed > 0 {
        info!(replayed, after_seq = processed_seq, "replayed WAL events");
    }
    info!(jobs = state.jobs.len(), "recovered state");

    // Orphan recovery: every job still in a non-terminal status has no
    // live worker loop behind it anymore. Tear down whatever the previous
    // process left behind and fail the job. Deliberately no adoption.
    let clock = SystemClock;
    let orphans: Vec<_> = state.live_jobs().into_iter().cloned().collect();
    for job in orphans {
        for sandbox_id in
            job.builder_sandbox_id.iter().chain(job.checker_sandbox_id.iter())
        {
            if let Err(e) = driver.kill(sandbox_id).await {
                warn!(job_id = %job.id, error = %e, "orphan sandbox kill failed");
            }
            let _ = driver.remove(sandbox_id).await;
        }
        if let Err(e) = driver.remove_volume(&job.workspace_volume()).await {
            warn!(job_id = %job.id, error = %e, "orphan workspace cleanup failed");
        }

        let event = Event::JobAdvanced {
            id: job.id,
            status: JobStatus::Failed,
            error: Some("orphaned on restart".to_string()),
            comment: None,
            at_ms: clock.epoch_ms(),
        };
        let seq = wal.append(&event)?;
        wal.mark_processed(seq);
        state.apply_event(&event);
        info!(job_id = %job.id, "failed orphaned job");
    }
    wal.flush()?;

    let state = Arc::new(Mutex::new(state));
    let wal = Arc::new(Mutex::new(wal));

    // Sentinel: disabled pins the level to GREEN with no side effects.
    let sentinel_handle = if config.sentinel.enabled {
        Sentinel::new(
            config.sentinel.clone(),
            Arc::new(SysinfoSampler::new()),
            Arc::clone(&driver),
            clock.clone(),
        )
        .spawn()
    } else {
        info!("sentinel disabled; admission level pinned to GREEN");
        Sentinel::<SystemClock>::disabled_handle(&clock)
    };

    let hub = BroadcastHub::new();
    let (engine, handle, mailbox) = Engine::new(
        EngineDeps {
            driver,
            publisher,
            state: Arc::clone(&state),
            wal: Arc::clone(&wal),
            level_rx: sentinel_handle.subscribe(),
        },
        config.clone(),
        hub,
        clock,
    );
    let engine_task = tokio::spawn(engine.run(mailbox));

    // Bind last, once everything behind the socket is ready.
    let addr = format!("{}:{}", config.orchestrator.host, config.orchestrator.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| LifecycleError::BindFailed(addr, e))?;

    Ok(StartupResult { paths, handle, listener, state, wal, lock_file, engine_task })
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
