//! Host metrics collection
//!
//! Snapshots of host, CPU, memory and disk information. Collection is
//! blocking; async callers should go through `spawn_blocking`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use sysinfo::{Disk, Disks, System};

/// Host metrics snapshot
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SystemInfo {
    pub hostname: String,
    pub os: String,
    pub platform: String,
    pub cpu_count: usize,
    pub cpu_model: String,
    pub memory_total: u64,
    pub memory_free: u64,
    pub disk_total: u64,
    pub disk_free: u64,
    pub uptime: u64,
}

/// Memory and swap snapshot
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MemoryInfo {
    pub total: u64,
    pub free: u64,
    pub available: u64,
    pub used: u64,
    pub used_percent: f64,
    pub swap_total: u64,
    pub swap_free: u64,
}

/// A single mounted disk
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiskInfo {
    pub name: String,
    pub mount_point: String,
    pub file_system: String,
    pub kind: String,
    pub removable: bool,
    pub total: u64,
    pub free: u64,
    pub used_percent: f64,
}

impl DiskInfo {
    fn from_disk(disk: &Disk) -> Self {
        let total = disk.total_space();
        let free = disk.available_space();
        Self {
            name: disk.name().to_string_lossy().into_owned(),
            mount_point: disk.mount_point().display().to_string(),
            file_system: disk.file_system().to_string_lossy().into_owned(),
            kind: format!("{:?}", disk.kind()),
            removable: disk.is_removable(),
            total,
            free,
            used_percent: used_percent(total, free),
        }
    }
}

/// Collect the host snapshot served by the system info endpoint
pub fn collect_system_info() -> SystemInfo {
    let sys = System::new_all();
    let disks = collect_disks();
    let root = disks
        .iter()
        .find(|d| Path::new(&d.mount_point) == Path::new("/"))
        .or_else(|| disks.first());

    SystemInfo {
        hostname: System::host_name().unwrap_or_default(),
        os: std::env::consts::OS.to_string(),
        platform: System::name().unwrap_or_else(|| std::env::consts::OS.to_string()),
        cpu_count: sys.cpus().len(),
        cpu_model: sys
            .cpus()
            .first()
            .map(|cpu| cpu.brand().trim().to_string())
            .unwrap_or_default(),
        memory_total: sys.total_memory(),
        memory_free: sys.free_memory(),
        disk_total: root.map(|d| d.total).unwrap_or(0),
        disk_free: root.map(|d| d.free).unwrap_or(0),
        uptime: System::uptime(),
    }
}

pub fn collect_memory() -> MemoryInfo {
    let mut sys = System::new();
    sys.refresh_memory();

    let total = sys.total_memory();
    let available = sys.available_memory();
    MemoryInfo {
        total,
        free: sys.free_memory(),
        available,
        used: sys.used_memory(),
        used_percent: used_percent(total, available),
        swap_total: sys.total_swap(),
        swap_free: sys.free_swap(),
    }
}

pub fn collect_disks() -> Vec<DiskInfo> {
    Disks::new_with_refreshed_list()
        .list()
        .iter()
        .map(DiskInfo::from_disk)
        .collect()
}

/// Percentage of `total` not covered by `free`, rounded to one decimal
pub fn used_percent(total: u64, free: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let used = total.saturating_sub(free) as f64;
    (used / total as f64 * 1000.0).round() / 10.0
}

/// Human-readable byte count
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
