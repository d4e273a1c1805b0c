// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration.
//!
//! Options come from a YAML file; every recognized option can be
//! overridden by an environment variable of the same name uppercased with
//! dots replaced by underscores (`orchestrator.port` →
//! `ORCHESTRATOR_PORT`). Missing file means defaults; an unparseable file
//! or override refuses startup.

use icarus_core::Phase;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("failed to parse config file {0}: {1}")]
    Parse(PathBuf, serde_yaml::Error),
    #[error("invalid value for {0}: {1:?}")]
    InvalidOverride(&'static str, String),
    #[error("invalid memory limit {0:?} (expected bytes or a k/m/g suffix)")]
    InvalidMemoryLimit(String),
}

/// Gateway bind and engine limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub host: String,
    pub port: u16,
    /// Admission-control slot count.
    pub max_concurrent_jobs: usize,
    /// Outer cap on a job's total wall time, distinct from per-phase
    /// deadlines; whichever fires first terminates the job.
    pub job_timeout_seconds: u64,
    /// Opt-in: answer 503 on submission when the sentinel is RED and the
    /// pending queue is already at the slot count.
    pub refuse_when_saturated: bool,
    /// Base URL workers use to reach the callback endpoint. The default
    /// works for Docker Desktop style setups; deployments on a raw bridge
    /// network set the bridge gateway address here.
    pub callback_base: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            max_concurrent_jobs: 2,
            job_timeout_seconds: 1800,
            refuse_when_saturated: false,
            callback_base: "http://host.docker.internal:8000".to_string(),
        }
    }
}

/// Sentinel thresholds and cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelConfig {
    /// When false, the level is permanently GREEN and no pause side
    /// effects occur.
    pub enabled: bool,
    pub yellow_threshold: f64,
    pub red_threshold: f64,
    pub poll_interval_seconds: u64,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self { enabled: true, yellow_threshold: 80.0, red_threshold: 90.0, poll_interval_seconds: 5 }
    }
}

/// Sandbox creation parameters for one agent type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub image_name: String,
    /// Fractional cores.
    pub cpu_limit: f64,
    /// Docker-style size string: plain bytes or `512m` / `2g`.
    pub memory_limit: String,
    /// Phase deadline in seconds.
    pub timeout_seconds: u64,
    pub network_mode: String,
    /// Environment variable names passed through from the daemon's own
    /// environment into the sandbox (LLM/search credentials).
    pub pass_env: Vec<String>,
}

impl AgentConfig {
    fn builder_default() -> Self {
        Self {
            image_name: "icarus-builder:latest".to_string(),
            cpu_limit: 2.0,
            memory_limit: "2g".to_string(),
            timeout_seconds: 600,
            network_mode: "bridge".to_string(),
            pass_env: Vec::new(),
        }
    }

    fn checker_default() -> Self {
        Self {
            image_name: "icarus-checker:latest".to_string(),
            cpu_limit: 1.0,
            memory_limit: "1g".to_string(),
            timeout_seconds: 300,
            network_mode: "bridge".to_string(),
            pass_env: Vec::new(),
        }
    }

    pub fn memory_limit_bytes(&self) -> Result<u64, ConfigError> {
        parse_memory_limit(&self.memory_limit)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::builder_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentsConfig {
    #[serde(default = "AgentConfig::builder_default")]
    pub builder: AgentConfig,
    #[serde(default = "AgentConfig::checker_default")]
    pub checker: AgentConfig,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self { builder: AgentConfig::builder_default(), checker: AgentConfig::checker_default() }
    }
}

/// Workspace volume policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    pub base_path: PathBuf,
    /// "volume" (managed docker volumes) or "bind" (host directories).
    pub mount_type: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self { base_path: PathBuf::from("/var/lib/icarus/workspaces"), mount_type: "volume".into() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub orchestrator: OrchestratorConfig,
    pub sentinel: SentinelConfig,
    pub agents: AgentsConfig,
    pub workspace: WorkspaceConfig,
}

impl Config {
    /// Load from the YAML file (defaults if absent), then apply
    /// environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
            serde_yaml::from_str(&raw).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?
        } else {
            Config::default()
        };
        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        // Validate eagerly so a bad memory limit refuses startup instead
        // of failing the first spawn.
        config.agents.builder.memory_limit_bytes()?;
        config.agents.checker.memory_limit_bytes()?;
        Ok(config)
    }

    /// The agent config for a phase.
    pub fn agent(&self, phase: Phase) -> &AgentConfig {
        match phase {
            Phase::Build => &self.agents.builder,
            Phase::Check => &self.agents.checker,
        }
    }

    /// Apply environment overrides from the given lookup (injectable for
    /// tests).
    pub fn apply_env_overrides(
        &mut self,
        get: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        fn parse<T: std::str::FromStr>(
            name: &'static str,
            raw: String,
        ) -> Result<T, ConfigError> {
            raw.trim().parse().map_err(|_| ConfigError::InvalidOverride(name, raw))
        }

        if let Some(v) = get("ORCHESTRATOR_HOST") {
            self.orchestrator.host = v;
        }
        if let Some(v) = get("ORCHESTRATOR_PORT") {
            self.orchestrator.port = parse("ORCHESTRATOR_PORT", v)?;
        }
        if let Some(v) = get("ORCHESTRATOR_MAX_CONCURRENT_JOBS") {
            self.orchestrator.max_concurrent_jobs = parse("ORCHESTRATOR_MAX_CONCURRENT_JOBS", v)?;
        }
        if let Some(v) = get("ORCHESTRATOR_JOB_TIMEOUT_SECONDS") {
            self.orchestrator.job_timeout_seconds = parse("ORCHESTRATOR_JOB_TIMEOUT_SECONDS", v)?;
        }
        if let Some(v) = get("ORCHESTRATOR_CALLBACK_BASE") {
            self.orchestrator.callback_base = v;
        }
        if let Some(v) = get("SENTINEL_ENABLED") {
            self.sentinel.enabled = parse("SENTINEL_ENABLED", v)?;
        }
        if let Some(v) = get("SENTINEL_YELLOW_THRESHOLD") {
            self.sentinel.yellow_threshold = parse("SENTINEL_YELLOW_THRESHOLD", v)?;
        }
        if let Some(v) = get("SENTINEL_RED_THRESHOLD") {
            self.sentinel.red_threshold = parse("SENTINEL_RED_THRESHOLD", v)?;
        }
        if let Some(v) = get("SENTINEL_POLL_INTERVAL_SECONDS") {
            self.sentinel.poll_interval_seconds = parse("SENTINEL_POLL_INTERVAL_SECONDS", v)?;
        }
        Ok(())
    }
}

/// Parse a docker-style memory size: plain bytes or a `k`/`m`/`g` suffix.
pub fn parse_memory_limit(raw: &str) -> Result<u64, ConfigError> {
    let s = raw.trim().to_ascii_lowercase();
    if s.is_empty() {
        return Err(ConfigError::InvalidMemoryLimit(raw.to_string()));
    }
    let (digits, multiplier) = match s.as_bytes()[s.len() - 1] {
        b'k' => (&s[..s.len() - 1], 1024u64),
        b'm' => (&s[..s.len() - 1], 1024 * 1024),
        b'g' => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        _ => (s.as_str(), 1),
    };
    digits
        .parse::<u64>()
        .map(|n| n * multiplier)
        .map_err(|_| ConfigError::InvalidMemoryLimit(raw.to_string()))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
