//! Configuration file management
//!
//! Handles finding and loading configuration files.

use anyhow::Result;
use std::path::{Path, PathBuf};

use super::{AgentConfig, EnvConfig};

/// Configuration file locations (in order of precedence)
const CONFIG_LOCATIONS: &[&str] = &[
    "./host-agent.json",
    "./host-agent.yaml",
    "./config.json",
    "../config.json",
    "/etc/host-agent/config.json",
    "~/.host-agent/config.json",
];

/// Find configuration file in standard locations
pub fn find() -> Option<PathBuf> {
    CONFIG_LOCATIONS
        .iter()
        .map(|location| expand_path(location))
        .find(|path| path.is_file())
}

/// Resolve configuration from file and environment
///
/// An explicit path (argument first, then `HOST_AGENT_CONFIG`) must load.
/// Otherwise the first file found in the standard locations is used, falling
/// back to defaults. Returns the config and the file it came from.
pub fn load_layered(
    explicit: Option<&Path>,
    env: &EnvConfig,
) -> Result<(AgentConfig, Option<PathBuf>)> {
    let explicit = explicit
        .map(Path::to_path_buf)
        .or_else(|| env.config_file.as_deref().map(expand_path));

    let (mut config, source) = match explicit {
        Some(path) => (AgentConfig::load(&path)?, Some(path)),
        None => match find() {
            Some(path) => (AgentConfig::load(&path)?, Some(path)),
            None => (AgentConfig::default(), None),
        },
    };

    config.apply_env(env);
    Ok((config, source))
}

/// Expand `~/` to the home directory
pub(super) fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Check if file is YAML based on extension
pub(super) fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}
