//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;

/// Environment variable prefix
const ENV_PREFIX: &str = "HOST_AGENT";

/// Environment configuration from environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// Port from HOST_AGENT_PORT
    pub port: Option<u16>,
    /// Log level from HOST_AGENT_LOG_LEVEL
    pub log_level: Option<String>,
    /// Test timeout from HOST_AGENT_TEST_TIMEOUT
    pub test_timeout: Option<u64>,
    /// Work directory from HOST_AGENT_WORK_DIR
    pub work_dir: Option<String>,
    /// Config file from HOST_AGENT_CONFIG
    pub config_file: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            port: get_env_parse("PORT"),
            log_level: get_env("LOG_LEVEL"),
            test_timeout: get_env_parse("TEST_TIMEOUT"),
            work_dir: get_env("WORK_DIR"),
            config_file: get_env("CONFIG"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.port.is_some()
            || self.log_level.is_some()
            || self.test_timeout.is_some()
            || self.work_dir.is_some()
            || self.config_file.is_some()
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}"))
        .ok()
        .filter(|v| !v.is_empty())
}

/// Get environment variable and parse to type
fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.parse().ok())
}
