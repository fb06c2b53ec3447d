//! Built-in operations
//!
//! Self-tests registered with the agent at startup.
//!
//! ## Operations
//!
//! - `disk-info`: mounted disks with capacity and usage
//! - `system-info`: host, CPU, memory and root disk snapshot
//! - `memory-info`: memory and swap usage
//! - `shell-command`: runs a command given in the request parameters

mod disk;
mod shell;
mod system;

pub use disk::disk_info;
pub use shell::shell_command;
pub use system::{memory_info, system_info};

use std::path::PathBuf;
use tracing::{error, info};

use crate::config::AgentConfig;
use crate::registry::Registry;

/// Settings the built-in operations draw from the agent configuration
#[derive(Clone, Debug)]
pub struct OperationSettings {
    /// Default timeout for commands run by operations
    pub timeout_secs: u64,

    /// Default working directory for commands run by operations
    pub work_dir: Option<PathBuf>,
}

impl Default for OperationSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            work_dir: None,
        }
    }
}

impl From<&AgentConfig> for OperationSettings {
    fn from(config: &AgentConfig) -> Self {
        Self {
            timeout_secs: config.test_timeout_secs,
            work_dir: config.work_dir.clone(),
        }
    }
}

/// Register every built-in operation
///
/// A failed registration is logged and skipped; it never aborts startup.
pub fn register_builtin(registry: &Registry, settings: &OperationSettings) {
    let operations = vec![
        disk_info(),
        system_info(),
        memory_info(),
        shell_command(settings.clone()),
    ];

    for operation in operations {
        let id = operation.id.clone();
        if let Err(e) = registry.register(operation) {
            error!("Failed to register operation {}: {}", id, e);
        }
    }

    info!("Registered {} operations", registry.len());
}
