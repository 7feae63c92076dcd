// src/collector/disk.rs
//! Root filesystem usage.

use super::memory::percent;
use crate::snapshot::Snapshot;

const BYTES_PER_GB: u64 = 1024 * 1024 * 1024;

/// Block counts of one filesystem, already scaled to bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsSpace {
    pub total: u64,
    /// Free including the blocks reserved for root.
    pub free: u64,
    /// Free to unprivileged users.
    pub available: u64,
}

/// Function to turn filesystem space into the root usage metrics.
///
/// Reserved blocks count as used but not as capacity:
/// `used = total - free`, percent is `used / (used + available)`.
pub fn root_usage(space: FsSpace) -> Snapshot {
    let used = space.total.saturating_sub(space.free);
    let mut data = Snapshot::new();
    data.insert("disk_root_usage_percent", percent(used, used + space.available));
    data.insert("disk_root_free_gb", space.available / BYTES_PER_GB);
    data
}

/// Function to get usage of the filesystem mounted at `/`.
///
/// Empty when `/` cannot be queried.
#[cfg(unix)]
pub fn get_disk_usage() -> Snapshot {
    use nix::sys::statvfs::statvfs;
    use tracing::debug;

    let stat = match statvfs("/") {
        Ok(stat) => stat,
        Err(e) => {
            debug!("statvfs on /: {e}");
            return Snapshot::new();
        }
    };

    let fragment = u64::from(stat.fragment_size());
    root_usage(FsSpace {
        total: u64::from(stat.blocks()) * fragment,
        free: u64::from(stat.blocks_free()) * fragment,
        available: u64::from(stat.blocks_available()) * fragment,
    })
}

/// Function to get usage of the volume mounted at `/`.
///
/// Reserved space is not reported here, so `free` equals `available`.
#[cfg(not(unix))]
pub fn get_disk_usage() -> Snapshot {
    use std::path::Path;
    use sysinfo::Disks;

    let disks = Disks::new_with_refreshed_list();
    disks
        .iter()
        .find(|disk| disk.mount_point() == Path::new("/"))
        .map(|root| {
            root_usage(FsSpace {
                total: root.total_space(),
                free: root.available_space(),
                available: root.available_space(),
            })
        })
        .unwrap_or_default()
}
