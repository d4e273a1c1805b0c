// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! System sentinel — host resource monitoring and worker protection.
//!
//! Samples host CPU/RAM/disk on a fixed cadence and publishes an
//! admission level. Entering RED pauses every running icarus sandbox;
//! leaving RED resumes exactly the set it paused. The sentinel never
//! terminates or destroys sandboxes.

mod sampler;

pub use sampler::{HostSampler, SysinfoSampler};

use crate::adapters::SandboxDriver;
use crate::config::SentinelConfig;
use icarus_core::{AdmissionLevel, Clock, HostSample, SandboxId, Thresholds, SANDBOX_NAME_PREFIX};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Read-side handle: current level and latest sample.
#[derive(Clone)]
pub struct SentinelHandle {
    level_rx: watch::Receiver<AdmissionLevel>,
    latest: Arc<Mutex<HostSample>>,
    // Keeps the channel open when the sentinel is disabled and no loop
    // holds the sender.
    _level_tx: Arc<watch::Sender<AdmissionLevel>>,
}

impl SentinelHandle {
    pub fn level(&self) -> AdmissionLevel {
        *self.level_rx.borrow()
    }

    pub fn stats(&self) -> HostSample {
        self.latest.lock().clone()
    }

    /// A fresh receiver for select-loop integration.
    pub fn subscribe(&self) -> watch::Receiver<AdmissionLevel> {
        self.level_rx.clone()
    }
}

/// The monitoring loop and its pause bookkeeping.
pub struct Sentinel<C: Clock> {
    config: SentinelConfig,
    sampler: Arc<dyn HostSampler>,
    driver: Arc<dyn SandboxDriver>,
    clock: C,
    level_tx: Arc<watch::Sender<AdmissionLevel>>,
    latest: Arc<Mutex<HostSample>>,
    /// Sandboxes this sentinel paused on the RED edge. Owned exclusively
    /// here.
    paused_set: Mutex<Vec<SandboxId>>,
}

impl<C: Clock> Sentinel<C> {
    pub fn new(
        config: SentinelConfig,
        sampler: Arc<dyn HostSampler>,
        driver: Arc<dyn SandboxDriver>,
        clock: C,
    ) -> Self {
        let latest = Arc::new(Mutex::new(HostSample::zero(clock.epoch_ms())));
        let (level_tx, _) = watch::channel(AdmissionLevel::Green);
        Self { config, sampler, driver, clock, level_tx: Arc::new(level_tx), latest, paused_set: Mutex::new(Vec::new()) }
    }

    pub fn handle(&self) -> SentinelHandle {
        SentinelHandle {
            level_rx: self.level_tx.subscribe(),
            latest: Arc::clone(&self.latest),
            _level_tx: Arc::clone(&self.level_tx),
        }
    }

    /// A handle pinned to GREEN, used when `sentinel.enabled = false`.
    pub fn disabled_handle(clock: &C) -> SentinelHandle {
        let (level_tx, level_rx) = watch::channel(AdmissionLevel::Green);
        SentinelHandle {
            level_rx,
            latest: Arc::new(Mutex::new(HostSample::zero(clock.epoch_ms()))),
            _level_tx: Arc::new(level_tx),
        }
    }

    /// Spawn the poll loop; returns the read handle.
    pub fn spawn(self) -> SentinelHandle {
        let handle = self.handle();
        let interval = Duration::from_secs(self.config.poll_interval_seconds.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.poll_once().await;
            }
        });
        handle
    }

    fn thresholds(&self) -> Thresholds {
        Thresholds { yellow: self.config.yellow_threshold, red: self.config.red_threshold }
    }

    /// One poll: sample, classify, run edge side effects, publish.
    pub(crate) async fn poll_once(&self) {
        let sample = self.sampler.sample(self.clock.epoch_ms());
        let level = AdmissionLevel::classify(sample.max_usage(), &self.thresholds());
        *self.latest.lock() = sample.clone();

        let previous = *self.level_tx.borrow();
        if level == previous {
            return;
        }

        match (previous, level) {
            (_, AdmissionLevel::Red) => {
                tracing::warn!(
                    cpu = sample.cpu_percent,
                    ram = sample.ram_percent,
                    "RED alert: pausing running workers"
                );
                self.pause_running_workers().await;
            }
            (AdmissionLevel::Red, _) => {
                tracing::info!(level = %level, "leaving RED: resuming paused workers");
                self.resume_paused_workers().await;
            }
            _ => {
                tracing::info!(from = %previous, to = %level, "admission level changed");
            }
        }

        // Publish after the side effects so an observer acting on RED
        // finds the workers already pausing.
        let _ = self.level_tx.send(level);
    }

    /// Pause every running icarus sandbox and remember the set.
    async fn pause_running_workers(&self) {
        let entries = match self.driver.list(SANDBOX_NAME_PREFIX).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!(error = %e, "failed to enumerate sandboxes for RED pause");
                return;
            }
        };

        let mut paused = Vec::new();
        for entry in entries {
            if !entry.status.is_running() {
                continue;
            }
            match self.driver.pause(&entry.id).await {
                Ok(()) => {
                    tracing::info!(sandbox_id = %entry.id.short(), name = %entry.name, "paused");
                    paused.push(entry.id);
                }
                Err(e) => {
                    tracing::error!(sandbox_id = %entry.id.short(), error = %e, "pause failed");
                }
            }
        }
        tracing::warn!(count = paused.len(), "RED mitigation complete");
        self.paused_set.lock().extend(paused);
    }

    /// Resume everything in `paused_set` and clear it.
    ///
    /// A member killed meanwhile (phase timeout during the pause) fails
    /// its unpause; that is logged and skipped.
    async fn resume_paused_workers(&self) {
        let paused: Vec<SandboxId> = std::mem::take(&mut *self.paused_set.lock());
        for id in paused {
            match self.driver.unpause(&id).await {
                Ok(()) => tracing::info!(sandbox_id = %id.short(), "resumed"),
                Err(e) => {
                    tracing::warn!(sandbox_id = %id.short(), error = %e, "resume skipped")
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn paused_set_len(&self) -> usize {
        self.paused_set.lock().len()
    }
}

#[cfg(test)]
#[path = "sentinel_tests.rs"]
mod tests;
