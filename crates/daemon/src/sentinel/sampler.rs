// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host resource samplers.

use icarus_core::HostSample;
use parking_lot::Mutex;
use sysinfo::{Disks, System};

/// Source of host resource figures, injectable for tests.
pub trait HostSampler: Send + Sync + 'static {
    fn sample(&self, at_ms: u64) -> HostSample;
}

/// Real sampler backed by sysinfo.
///
/// CPU usage is computed from the delta between refreshes, so the first
/// sample after startup reads near zero; the poll cadence makes every
/// later sample meaningful.
pub struct SysinfoSampler {
    system: Mutex<System>,
}

impl SysinfoSampler {
    pub fn new() -> Self {
        Self { system: Mutex::new(System::new()) }
    }
}

impl Default for SysinfoSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl HostSampler for SysinfoSampler {
    fn sample(&self, at_ms: u64) -> HostSample {
        let mut system = self.system.lock();
        system.refresh_cpu_usage();
        system.refresh_memory();

        let total = system.total_memory() as f64;
        let used = system.used_memory() as f64;
        let ram_percent = if total > 0.0 { used / total * 100.0 } else { 0.0 };

        let disks = Disks::new_with_refreshed_list();
        let (disk_total, disk_free) = disks
            .list()
            .iter()
            .fold((0u64, 0u64), |(t, f), d| (t + d.total_space(), f + d.available_space()));
        let disk_percent = if disk_total > 0 {
            (disk_total - disk_free) as f64 / disk_total as f64 * 100.0
        } else {
            0.0
        };

        HostSample {
            at_ms,
            cpu_percent: system.global_cpu_usage() as f64,
            cpu_count: system.cpus().len().max(1),
            ram_percent,
            ram_total_mb: total / (1024.0 * 1024.0),
            ram_used_mb: used / (1024.0 * 1024.0),
            disk_percent,
            disk_free_gb: disk_free as f64 / (1024.0 * 1024.0 * 1024.0),
        }
    }
}
