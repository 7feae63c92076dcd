// src/collector/gpu/nvidia.rs
//! NVIDIA cards through NVML.

use crate::snapshot::Snapshot;
use nvml_wrapper::Nvml;
use nvml_wrapper::enum_wrappers::device::TemperatureSensor;
use nvml_wrapper::error::NvmlError;
use tracing::{debug, info};

/// One device's readings; `None` means the device does not support that query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceReading {
    /// Percent of time a kernel was running.
    pub utilization: Option<u32>,
    /// `(used, total)` in bytes.
    pub memory: Option<(u64, u64)>,
    /// Degrees Celsius.
    pub temperature: Option<u32>,
    /// Milliwatts.
    pub power_mw: Option<u32>,
}

/// A vendor management library that was initialized for this process.
pub trait GpuManagement: Send {
    fn device_count(&self) -> Option<u32>;
    /// Reads every query of device `index` through a single handle; `None`
    /// when no handle could be obtained.
    fn read_device(&self, index: u32) -> Option<DeviceReading>;
}

/// NVML handle that was successfully initialized.
pub struct NvmlManagement {
    nvml: Nvml,
}

/// Function to initialize NVML once for the process lifetime.
///
/// Hosts without the NVIDIA driver end up here with `None`; the caller never
/// retries.
pub fn init_nvml() -> Option<Box<dyn GpuManagement>> {
    match Nvml::init() {
        Ok(nvml) => {
            info!("NVML initialized, NVIDIA GPU metrics enabled");
            Some(Box::new(NvmlManagement { nvml }))
        }
        Err(e) => {
            info!("NVML unavailable, NVIDIA GPU metrics disabled: {e}");
            None
        }
    }
}

fn supported<T>(query: &str, index: u32, result: Result<T, NvmlError>) -> Option<T> {
    result
        .inspect_err(|e| debug!("NVML {query} on device {index}: {e}"))
        .ok()
}

impl GpuManagement for NvmlManagement {
    fn device_count(&self) -> Option<u32> {
        self.nvml
            .device_count()
            .inspect_err(|e| debug!("NVML device count: {e}"))
            .ok()
    }

    fn read_device(&self, index: u32) -> Option<DeviceReading> {
        let device = supported("handle", index, self.nvml.device_by_index(index))?;
        Some(DeviceReading {
            utilization: supported("utilization", index, device.utilization_rates())
                .map(|u| u.gpu),
            memory: supported("memory", index, device.memory_info()).map(|m| (m.used, m.total)),
            temperature: supported(
                "temperature",
                index,
                device.temperature(TemperatureSensor::Gpu),
            ),
            power_mw: supported("power", index, device.power_usage()),
        })
    }
}

/// Function to read every NVIDIA device once.
pub fn get_nvidia_stats(nvml: &dyn GpuManagement) -> Snapshot {
    let mut data = Snapshot::new();
    let Some(count) = nvml.device_count() else {
        return data;
    };

    for i in 0..count {
        let Some(reading) = nvml.read_device(i) else {
            continue;
        };
        if let Some(util) = reading.utilization {
            data.insert(format!("gpu_nvidia_{i}_usage_percent"), util);
        }
        if let Some((used, total)) = reading.memory.filter(|(_, total)| *total > 0) {
            data.insert(
                format!("gpu_nvidia_{i}_memory_percent"),
                used as f64 / total as f64 * 100.0,
            );
        }
        if let Some(temp) = reading.temperature {
            data.insert(format!("gpu_nvidia_{i}_temp_c"), temp);
        }
        if let Some(mw) = reading.power_mw {
            data.insert(format!("gpu_nvidia_{i}_power_watts"), f64::from(mw) / 1000.0);
        }
    }

    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::MetricValue;
    use std::cell::Cell;

    struct FakeNvml {
        power: bool,
        reads: Cell<u32>,
    }

    impl FakeNvml {
        fn new(power: bool) -> Self {
            Self {
                power,
                reads: Cell::new(0),
            }
        }
    }

    impl GpuManagement for FakeNvml {
        fn device_count(&self) -> Option<u32> {
            Some(2)
        }
        fn read_device(&self, index: u32) -> Option<DeviceReading> {
            self.reads.set(self.reads.get() + 1);
            Some(DeviceReading {
                utilization: Some(10 * (index + 1)),
                memory: Some((1 << 30, 3 << 30)),
                temperature: Some(61),
                power_mw: (self.power && index == 0).then_some(125_500),
            })
        }
    }

    #[test]
    fn test_reads_every_device() {
        let nvml = FakeNvml::new(true);
        let data = get_nvidia_stats(&nvml);

        assert_eq!(data.get("gpu_nvidia_0_usage_percent"), Some(&MetricValue::Int(10)));
        assert_eq!(data.get("gpu_nvidia_1_usage_percent"), Some(&MetricValue::Int(20)));
        let memory = data.get("gpu_nvidia_0_memory_percent").unwrap().as_f64();
        assert!((memory - 100.0 / 3.0).abs() < 1e-9, "raw ratio, not rounded");
        assert_eq!(data.get("gpu_nvidia_1_temp_c"), Some(&MetricValue::Int(61)));
        assert_eq!(data.get("gpu_nvidia_0_power_watts"), Some(&MetricValue::Float(125.5)));
        assert!(!data.contains_key("gpu_nvidia_1_power_watts"));
        assert_eq!(nvml.reads.get(), 2, "one handle per device per cycle");
    }

    #[test]
    fn test_device_without_handle_is_skipped() {
        struct NoHandles;
        impl GpuManagement for NoHandles {
            fn device_count(&self) -> Option<u32> {
                Some(1)
            }
            fn read_device(&self, _index: u32) -> Option<DeviceReading> {
                None
            }
        }

        assert!(get_nvidia_stats(&NoHandles).is_empty());
    }

    #[test]
    fn test_power_is_optional() {
        let data = get_nvidia_stats(&FakeNvml::new(false));
        assert_eq!(data.len(), 6);
        assert!(data.keys().all(|k| !k.ends_with("_power_watts")));
    }
}
