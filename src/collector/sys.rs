// src/collector/sys.rs
//! System-level info: timestamp, hostname, boot time and uptime.

use crate::snapshot::Snapshot;
use sysinfo::System;

/// Function to generate a timestamp in epoch time.
pub fn get_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Function to extract hostname of the system.
pub fn get_hostname() -> String {
    System::host_name().unwrap_or_else(|| "unknown".to_string())
}

/// Function to extract boot time and the uptime derived from it.
pub fn get_system_info() -> Snapshot {
    let boot_time = System::boot_time();
    let mut data = Snapshot::new();
    data.insert("boot_time", boot_time);
    data.insert("uptime_seconds", get_timestamp().saturating_sub(boot_time));
    data
}
