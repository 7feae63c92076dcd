// src/collector/mod.rs
//! Metric collection: one probe per hardware domain, merged per poll cycle.

pub mod cpu;
pub mod disk;
pub mod gpu;
pub mod memory;
pub mod net;
pub mod power;
pub mod sys;
pub mod sysfs;

pub use cpu::{get_cpu_freq, get_cpu_load, get_cpu_temperature, get_cpu_usage};
pub use disk::get_disk_usage;
pub use gpu::{DeviceReading, GpuManagement, GpuVendor, get_gpu_stats};
pub use memory::get_memory_usage;
pub use net::get_if_data;
pub use power::PowerSampler;
pub use sys::{get_hostname, get_system_info, get_timestamp};

use crate::snapshot::Snapshot;
use std::path::PathBuf;
use std::time::Instant;
use sysinfo::System;
use tracing::trace;

/// Elapsed time used when two polls land closer together than this.
pub const MIN_ELAPSED_SECS: f64 = 0.001;

/// Which platform-gated probes run on this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    pub linux: bool,
    pub x86: bool,
}

impl Platform {
    pub fn detect() -> Self {
        Self {
            linux: cfg!(target_os = "linux"),
            x86: cfg!(any(target_arch = "x86_64", target_arch = "x86")),
        }
    }

    /// CPU temperature comes from Linux hwmon.
    pub fn has_cpu_temperature(&self) -> bool {
        self.linux
    }

    /// RAPL counters and GPU probing are x86 Linux only.
    pub fn has_rapl(&self) -> bool {
        self.linux && self.x86
    }
}

/// Roots of the pseudo-file trees the probes read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysfsPaths {
    pub hwmon: PathBuf,
    pub powercap: PathBuf,
    pub drm: PathBuf,
}

impl Default for SysfsPaths {
    fn default() -> Self {
        Self {
            hwmon: PathBuf::from(cpu::HWMON_ROOT),
            powercap: PathBuf::from(power::RAPL_ROOT),
            drm: PathBuf::from(gpu::DRM_ROOT),
        }
    }
}

/// Owns everything that must survive between polls: the sysinfo handle (CPU
/// usage is a delta between refreshes), RAPL baselines, the NVML handle and
/// the time of the previous poll.
///
/// Must not be polled concurrently; `collect` takes `&mut self` for that.
pub struct Monitor {
    sys: System,
    platform: Platform,
    paths: SysfsPaths,
    power: PowerSampler,
    nvml: Option<Box<dyn GpuManagement>>,
    last_poll: Instant,
}

impl Monitor {
    /// Monitor for the running host, NVML initialized once here.
    pub fn new() -> Self {
        let platform = Platform::detect();
        let nvml = if platform.has_rapl() {
            gpu::init_nvml()
        } else {
            None
        };
        Self::with_sources(platform, SysfsPaths::default(), nvml)
    }

    /// Monitor reading from explicit roots, for tests and unusual mounts.
    pub fn with_sources(
        platform: Platform,
        paths: SysfsPaths,
        nvml: Option<Box<dyn GpuManagement>>,
    ) -> Self {
        let mut sys = System::new();
        sys.refresh_cpu();
        Self {
            sys,
            platform,
            power: PowerSampler::new(paths.powercap.clone()),
            paths,
            nvml,
            last_poll: Instant::now(),
        }
    }

    pub fn collect(&mut self) -> Snapshot {
        self.collect_at(Instant::now())
    }

    /// Runs every probe once and returns the merged snapshot; `now` is the
    /// poll time used for rate derivation.
    pub fn collect_at(&mut self, now: Instant) -> Snapshot {
        let elapsed_secs = now
            .saturating_duration_since(self.last_poll)
            .as_secs_f64()
            .max(MIN_ELAPSED_SECS);

        self.sys.refresh_cpu();
        self.sys.refresh_memory();

        let mut snapshot = Snapshot::new();
        snapshot.merge(self.get_cpu_stats(elapsed_secs));
        snapshot.merge(get_memory_usage(&self.sys));
        snapshot.merge(get_disk_usage());
        snapshot.merge(get_if_data());
        snapshot.merge(get_system_info());
        if self.platform.has_rapl() {
            snapshot.merge(get_gpu_stats(self.nvml.as_deref(), &self.paths.drm));
        }

        self.last_poll = now;
        trace!("collected {} metrics over {elapsed_secs:.3}s", snapshot.len());
        snapshot
    }

    fn get_cpu_stats(&mut self, elapsed_secs: f64) -> Snapshot {
        let mut data = get_cpu_usage(&self.sys);
        data.merge(get_cpu_freq(&self.sys));
        data.merge(get_cpu_load());
        if self.platform.has_cpu_temperature() {
            data.merge(get_cpu_temperature(&self.paths.hwmon));
        }
        if self.platform.has_rapl() {
            data.merge(self.power.sample(elapsed_secs));
        }
        data
    }
}
