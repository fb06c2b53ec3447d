//! Host and memory information operations

use crate::executor::ExecutionContext;
use crate::metrics::{self, format_bytes, MemoryInfo, SystemInfo};
use crate::models::{Operation, OperationResult};

pub fn system_info() -> Operation {
    Operation::new(
        "system-info",
        "System Information",
        "Collects host, CPU, memory and root disk information",
        |ctx| async move {
            let result = OperationResult::start("system-info");
            let info = tokio::select! {
                joined = tokio::task::spawn_blocking(metrics::collect_system_info) => joined,
                () = ctx.cancelled() => return result.cancel(),
            };

            match info.map(|info| (system_summary(&info), serde_json::to_value(info))) {
                Ok((summary, Ok(data))) => result.with_output(summary).with_data(data).complete(),
                Ok((_, Err(e))) => result.fail(format!("failed to encode system info: {e}")),
                Err(e) => result.fail(format!("system info collection failed: {e}")),
            }
        },
    )
}

pub fn memory_info() -> Operation {
    Operation::new(
        "memory-info",
        "Memory Information",
        "Reports memory and swap usage",
        |ctx| async move {
            let result = OperationResult::start("memory-info");
            let memory = tokio::select! {
                joined = tokio::task::spawn_blocking(metrics::collect_memory) => joined,
                () = ctx.cancelled() => return result.cancel(),
            };

            match memory.map(|m| (memory_summary(&m), serde_json::to_value(m))) {
                Ok((summary, Ok(data))) => result.with_output(summary).with_data(data).complete(),
                Ok((_, Err(e))) => result.fail(format!("failed to encode memory info: {e}")),
                Err(e) => result.fail(format!("memory collection failed: {e}")),
            }
        },
    )
}

fn system_summary(info: &SystemInfo) -> String {
    format!(
        "Host: {} ({} / {})\nCPU: {} x {}\nMemory: {} total, {} free\nDisk: {} total, {} free\nUptime: {}s",
        info.hostname,
        info.os,
        info.platform,
        info.cpu_count,
        info.cpu_model,
        format_bytes(info.memory_total),
        format_bytes(info.memory_free),
        format_bytes(info.disk_total),
        format_bytes(info.disk_free),
        info.uptime
    )
}

fn memory_summary(memory: &MemoryInfo) -> String {
    format!(
        "Memory: {} total, {} available ({:.1}% used)\nSwap: {} total, {} free",
        format_bytes(memory.total),
        format_bytes(memory.available),
        memory.used_percent,
        format_bytes(memory.swap_total),
        format_bytes(memory.swap_free)
    )
}
