// src/collector/memory.rs
//! Memory and swap usage.

use crate::snapshot::{Snapshot, round1};
use sysinfo::System;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Function to extract memory totals in MB and usage percentages.
///
/// `sys` must have had its memory refreshed.
pub fn get_memory_usage(sys: &System) -> Snapshot {
    let total = sys.total_memory();
    let available = sys.available_memory();

    let mut data = Snapshot::new();
    data.insert("memory_total_mb", total / BYTES_PER_MB);
    data.insert("memory_used_mb", sys.used_memory() / BYTES_PER_MB);
    data.insert("memory_free_mb", sys.free_memory() / BYTES_PER_MB);
    data.insert(
        "memory_percent",
        percent(total.saturating_sub(available), total),
    );
    data.insert("swap_percent", percent(sys.used_swap(), sys.total_swap()));
    data
}

/// `part / whole` as a percentage with one decimal, zero for an empty whole.
pub(crate) fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round1(part as f64 / whole as f64 * 100.0)
}
