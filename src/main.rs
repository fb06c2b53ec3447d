//! Host Agent - health, metrics, command execution and self-tests over HTTP
//!
//! A small daemon that exposes a host to remote tooling. It reports health
//! and system information, runs ad-hoc commands under a timeout, and keeps a
//! registry of named self-tests that can be listed, run and polled.
//!
//! ## Endpoints
//!
//! - `GET  /health`
//! - `GET  /api/v1/system/info`
//! - `POST /api/v1/cmd/exec`
//! - `GET  /api/v1/tests/list`
//! - `POST /api/v1/tests/run/{test_id}`
//! - `GET  /api/v1/tests/results/{test_id}`
//!
//! ## Usage
//!
//! ```bash
//! # Start on the default port
//! host-agent
//!
//! # Custom port and verbose logging
//! host-agent --port 8080 --log-level debug
//!
//! # Load a configuration file and also log to disk
//! host-agent --config /etc/host-agent/config.yaml --log-path /var/log/host-agent.log
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info};

mod cli;
mod config;
mod executor;
mod metrics;
mod models;
mod operations;
mod registry;
mod server;
mod utils;

use cli::Args;
use config::EnvConfig;
use operations::OperationSettings;
use registry::Registry;
use server::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let env = EnvConfig::load();
    let (mut config, source) = config::load_layered(args.config.as_deref(), &env)?;
    config.apply_overrides(args.port, args.log_level.as_deref());
    config.validate()?;

    utils::init_logger(config.log_level(), args.log_path.as_deref())?;

    match &source {
        Some(path) => info!("Loaded configuration from {}", path.display()),
        None => info!("No configuration file found, using defaults"),
    }
    if env.has_any() {
        debug!("Applied HOST_AGENT_* environment overrides");
    }
    debug!("Effective configuration: {:?}", config);

    let registry = Arc::new(Registry::new());
    operations::register_builtin(&registry, &OperationSettings::from(&config));

    let addr: SocketAddr = format!("{}:{}", args.host, config.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", args.host, config.port))?;

    info!("Starting host agent v{}", env!("CARGO_PKG_VERSION"));
    server::serve(addr, AppState::new(registry)).await
}
