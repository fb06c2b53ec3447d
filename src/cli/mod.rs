//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::Parser;
use std::path::PathBuf;

/// Host agent serving health, system info, command execution and self-tests
#[derive(Parser, Debug)]
#[command(name = "host-agent")]
#[command(version)]
#[command(about = "Host agent for health checks, metrics, command execution and self-tests")]
#[command(long_about = None)]
pub struct Args {
    /// HTTP port (default: 65535)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Log level: debug, info, warn, error
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Also append logs to this file
    #[arg(long)]
    pub log_path: Option<PathBuf>,

    /// Configuration file (JSON or YAML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}
