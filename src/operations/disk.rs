//! Disk information operation

use serde_json::json;

use crate::executor::ExecutionContext;
use crate::metrics::{collect_disks, format_bytes, DiskInfo};
use crate::models::{Operation, OperationResult};

const ID: &str = "disk-info";

pub fn disk_info() -> Operation {
    Operation::new(
        ID,
        "Disk Information",
        "Collects basic information about the host's disks",
        run,
    )
}

async fn run(ctx: ExecutionContext) -> OperationResult {
    let result = OperationResult::start(ID);

    let disks = tokio::select! {
        joined = tokio::task::spawn_blocking(collect_disks) => joined,
        () = ctx.cancelled() => return result.cancel(),
    };

    match disks {
        Ok(disks) => result
            .with_output(summary(&disks))
            .with_data(json!({ "count": disks.len(), "disks": disks }))
            .complete(),
        Err(e) => result.fail(format!("disk collection failed: {e}")),
    }
}

fn summary(disks: &[DiskInfo]) -> String {
    let mut lines = vec![format!("Disk count: {}", disks.len())];
    for (i, disk) in disks.iter().enumerate() {
        lines.push(format!(
            "{}. {} on {} ({}, {} total, {} free, {:.1}% used)",
            i + 1,
            disk.name,
            disk.mount_point,
            disk.file_system,
            format_bytes(disk.total),
            format_bytes(disk.free),
            disk.used_percent
        ));
    }
    lines.join("\n")
}
