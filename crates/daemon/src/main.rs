// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ICARUS orchestrator daemon entry point.

use anyhow::Context;
use clap::Parser;
use icarus_daemon::config::Config;
use icarus_daemon::lifecycle;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "icarus-daemon", version, about = "ICARUS orchestrator + sentinel control plane")]
struct Args {
    /// Path to the YAML configuration file.
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// State directory (WAL, snapshots, pid file).
    #[arg(long)]
    state_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    // Configuration and store availability are subsystem-fatal: refuse to
    // start with a non-zero exit and an explanatory message.
    let config = Config::load(&args.config)
        .with_context(|| format!("invalid configuration at {}", args.config.display()))?;

    let state_dir = match args.state_dir {
        Some(dir) => dir,
        None => lifecycle::default_state_dir().context("no usable state directory")?,
    };

    lifecycle::run(config, state_dir).await.context("orchestrator failed")?;
    Ok(())
}
