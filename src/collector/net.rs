// src/collector/net.rs
//! Network traffic counters.

use crate::snapshot::Snapshot;
use sysinfo::Networks;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Function to get bytes sent and received since boot, summed over all
/// interfaces, in MB.
pub fn get_if_data() -> Snapshot {
    let networks = Networks::new_with_refreshed_list();

    let (sent, recv) = networks
        .iter()
        .fold((0u64, 0u64), |(tx, rx), (_name, data)| {
            (
                tx.saturating_add(data.total_transmitted()),
                rx.saturating_add(data.total_received()),
            )
        });

    let mut data = Snapshot::new();
    data.insert("net_bytes_sent_mb", sent / BYTES_PER_MB);
    data.insert("net_bytes_recv_mb", recv / BYTES_PER_MB);
    data
}
