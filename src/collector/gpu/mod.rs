// src/collector/gpu/mod.rs
//! GPU metrics from the NVIDIA management library and the DRM class.

pub mod drm;
pub mod nvidia;

pub use drm::{DRM_ROOT, GpuVendor, get_drm_stats};
pub use nvidia::{DeviceReading, GpuManagement, get_nvidia_stats, init_nvml};

use crate::snapshot::Snapshot;
use std::path::Path;

/// Function to collect every GPU metric available on this host.
///
/// `nvml` is `None` when the management library failed to initialize.
pub fn get_gpu_stats(nvml: Option<&dyn GpuManagement>, drm_root: &Path) -> Snapshot {
    let mut data = Snapshot::new();
    if let Some(nvml) = nvml {
        data.merge(get_nvidia_stats(nvml));
    }
    data.merge(get_drm_stats(drm_root));
    data
}
