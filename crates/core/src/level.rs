// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Admission levels derived from host resource samples.

use serde::{Deserialize, Serialize};

/// Sentinel output, derived from host CPU/RAM usage.
///
/// GREEN permits admission, YELLOW is advisory, RED blocks admission and
/// pauses running workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdmissionLevel {
    Green,
    Yellow,
    Red,
}

crate::simple_display! {
    AdmissionLevel {
        Green => "GREEN",
        Yellow => "YELLOW",
        Red => "RED",
    }
}

/// Percent thresholds separating the levels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub yellow: f64,
    pub red: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self { yellow: 80.0, red: 90.0 }
    }
}

impl AdmissionLevel {
    /// Classify the max of CPU% and RAM% against the thresholds.
    ///
    /// Boundary values belong to the higher level: exactly `yellow` is
    /// YELLOW, exactly `red` is RED.
    pub fn classify(max_usage: f64, thresholds: &Thresholds) -> AdmissionLevel {
        if max_usage >= thresholds.red {
            AdmissionLevel::Red
        } else if max_usage >= thresholds.yellow {
            AdmissionLevel::Yellow
        } else {
            AdmissionLevel::Green
        }
    }
}

/// One host resource sample.
///
/// Disk usage is reported but deliberately excluded from the level
/// decision; disk exhaustion surfaces through the sandbox driver's write
/// failures instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostSample {
    pub at_ms: u64,
    pub cpu_percent: f64,
    pub cpu_count: usize,
    pub ram_percent: f64,
    pub ram_total_mb: f64,
    pub ram_used_mb: f64,
    pub disk_percent: f64,
    pub disk_free_gb: f64,
}

impl HostSample {
    /// The usage figure the level decision is based on.
    pub fn max_usage(&self) -> f64 {
        self.cpu_percent.max(self.ram_percent)
    }

    /// Safe all-zero sample, used before the first poll and on sampler failure.
    pub fn zero(at_ms: u64) -> Self {
        Self {
            at_ms,
            cpu_percent: 0.0,
            cpu_count: 1,
            ram_percent: 0.0,
            ram_total_mb: 0.0,
            ram_used_mb: 0.0,
            disk_percent: 0.0,
            disk_free_gb: 0.0,
        }
    }
}

#[cfg(test)]
#[path = "level_tests.rs"]
mod tests;
