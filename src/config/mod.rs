//! Configuration module
//!
//! Handles loading and managing configuration. Sources are layered:
//! defaults, then a config file, then `HOST_AGENT_*` environment variables,
//! then command-line flags.

#![allow(dead_code)]

mod env;
mod file;

pub use env::EnvConfig;
pub use file::load_layered;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::utils::LogLevel;

/// Agent configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// HTTP listen port
    pub port: u16,

    /// Log level (debug, info, warn, error)
    pub log_level: String,

    /// Default timeout in seconds for commands run by self-tests
    #[serde(rename = "test_timeout")]
    pub test_timeout_secs: u64,

    /// Default working directory for commands run by self-tests
    pub work_dir: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            port: 65535,
            log_level: "info".to_string(),
            test_timeout_secs: 60,
            work_dir: Some(std::env::temp_dir()),
        }
    }
}

impl AgentConfig {
    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = if file::is_yaml_file(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
        };

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if file::is_yaml_file(path) {
            serde_yaml::to_string(self).context("Failed to serialize config")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize config")?
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("Invalid port 0");
        }
        if LogLevel::from_str(&self.log_level).is_none() {
            anyhow::bail!(
                "Unknown log level '{}'. Valid levels: trace, debug, info, warn, error",
                self.log_level
            );
        }
        if self.test_timeout_secs == 0 {
            anyhow::bail!("Test timeout must be at least 1 second");
        }
        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env(&mut self, env: &EnvConfig) {
        if let Some(port) = env.port {
            self.port = port;
        }
        if let Some(level) = &env.log_level {
            self.log_level = level.clone();
        }
        if let Some(timeout) = env.test_timeout {
            self.test_timeout_secs = timeout;
        }
        if let Some(dir) = &env.work_dir {
            self.work_dir = Some(PathBuf::from(dir));
        }
    }

    /// Apply command-line overrides
    pub fn apply_overrides(&mut self, port: Option<u16>, log_level: Option<&str>) {
        if let Some(port) = port {
            self.port = port;
        }
        if let Some(level) = log_level {
            self.log_level = level.to_string();
        }
    }

    pub fn log_level(&self) -> LogLevel {
        LogLevel::from_str(&self.log_level).unwrap_or(LogLevel::Info)
    }
}
