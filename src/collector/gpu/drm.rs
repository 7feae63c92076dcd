// src/collector/gpu/drm.rs
//! Intel and AMD cards read from `/sys/class/drm/card<N>`.

use crate::collector::sysfs::{self, file_name, list_dir, probe};
use crate::snapshot::Snapshot;
use std::path::Path;

/// Default root of the DRM class.
pub const DRM_ROOT: &str = "/sys/class/drm";

/// PCI vendor of a card, resolved once from `device/vendor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuVendor {
    Intel,
    Amd,
    Unknown,
}

impl GpuVendor {
    pub fn from_pci_id(id: &str) -> Self {
        match id.trim().to_ascii_lowercase().as_str() {
            "0x8086" => GpuVendor::Intel,
            "0x1002" => GpuVendor::Amd,
            _ => GpuVendor::Unknown,
        }
    }
}

/// Power files in order of preference; the first one present wins.
const AMD_POWER_FILES: [&str; 2] = ["power1_average", "power1_input"];

/// Function to scan every card and dispatch on its vendor.
///
/// Cards without a readable vendor file are skipped.
pub fn get_drm_stats(drm_root: &Path) -> Snapshot {
    let mut data = Snapshot::new();

    for card in list_dir(drm_root, is_card) {
        let Some(vendor) = probe(sysfs::read_trimmed(&card.join("device/vendor"))) else {
            continue;
        };
        match GpuVendor::from_pci_id(&vendor) {
            GpuVendor::Intel => data.merge(get_intel_stats(&card)),
            GpuVendor::Amd => data.merge(get_amd_stats(&card)),
            GpuVendor::Unknown => {}
        }
    }

    data
}

/// `card0` is a card, `card0-DP-1` is one of its connectors.
fn is_card(name: &str) -> bool {
    name.strip_prefix("card")
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

/// Function to read the actual GT frequency of an Intel card.
fn get_intel_stats(card: &Path) -> Snapshot {
    let name = file_name(card);
    let mut data = Snapshot::new();
    if let Some(mhz) = probe(sysfs::read_value::<u64>(&card.join("gt_act_freq_mhz"))) {
        data.insert(format!("gpu_intel_{name}_freq_mhz"), mhz);
    }
    data
}

/// Function to read usage, temperature and power of an AMD card.
fn get_amd_stats(card: &Path) -> Snapshot {
    let name = file_name(card);
    let device = card.join("device");
    let mut data = Snapshot::new();

    if let Some(busy) = probe(sysfs::read_value::<u64>(&device.join("gpu_busy_percent"))) {
        data.insert(format!("gpu_amd_{name}_usage_percent"), busy);
    }

    let temp_key = format!("gpu_amd_{name}_temp_c");
    let power_key = format!("gpu_amd_{name}_power_watts");

    for hwmon in list_dir(&device.join("hwmon"), |n| n.starts_with("hwmon")) {
        if !data.contains_key(&temp_key) {
            if let Some(millideg) = probe(sysfs::read_value::<i64>(&hwmon.join("temp1_input"))) {
                data.insert(temp_key.clone(), millideg as f64 / 1000.0);
            }
        }
        if !data.contains_key(&power_key) {
            let microwatts = AMD_POWER_FILES
                .iter()
                .map(|f| hwmon.join(f))
                .find(|p| p.exists())
                .and_then(|p| probe(sysfs::read_value::<u64>(&p)));
            if let Some(uw) = microwatts {
                data.insert(power_key.clone(), uw as f64 / 1_000_000.0);
            }
        }
    }

    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::MetricValue;
    use std::fs;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_vendor_from_pci_id() {
        assert_eq!(GpuVendor::from_pci_id("0x8086\n"), GpuVendor::Intel);
        assert_eq!(GpuVendor::from_pci_id("0x1002"), GpuVendor::Amd);
        assert_eq!(GpuVendor::from_pci_id("0x10de"), GpuVendor::Unknown);
    }

    #[test]
    fn test_is_card() {
        assert!(is_card("card0"));
        assert!(is_card("card12"));
        assert!(!is_card("card"));
        assert!(!is_card("card0-DP-1"));
        assert!(!is_card("renderD128"));
    }

    #[test]
    fn test_amd_card() {
        let root = TempDir::new().unwrap();
        let card = root.path().join("card0");
        write(&card.join("device/vendor"), "0x1002\n");
        write(&card.join("device/gpu_busy_percent"), "50\n");
        write(&card.join("device/hwmon/hwmon4/temp1_input"), "35000\n");
        write(&card.join("device/hwmon/hwmon4/power1_average"), "50000000\n");

        let data = get_drm_stats(root.path());

        assert_eq!(data.get("gpu_amd_card0_usage_percent"), Some(&MetricValue::Int(50)));
        assert_eq!(data.get("gpu_amd_card0_temp_c"), Some(&MetricValue::Float(35.0)));
        assert_eq!(data.get("gpu_amd_card0_power_watts"), Some(&MetricValue::Float(50.0)));
    }

    #[test]
    fn test_amd_power_prefers_average() {
        let root = TempDir::new().unwrap();
        let card = root.path().join("card1");
        write(&card.join("device/vendor"), "0x1002");
        write(&card.join("device/hwmon/hwmon0/power1_average"), "20000000");
        write(&card.join("device/hwmon/hwmon0/power1_input"), "90000000");

        let data = get_drm_stats(root.path());
        assert_eq!(data.get("gpu_amd_card1_power_watts"), Some(&MetricValue::Float(20.0)));
    }

    #[test]
    fn test_amd_power_falls_back_to_input() {
        let root = TempDir::new().unwrap();
        let card = root.path().join("card1");
        write(&card.join("device/vendor"), "0x1002");
        write(&card.join("device/hwmon/hwmon0/power1_input"), "12500000");

        let data = get_drm_stats(root.path());
        assert_eq!(data.get("gpu_amd_card1_power_watts"), Some(&MetricValue::Float(12.5)));
        assert!(!data.contains_key("gpu_amd_card1_usage_percent"));
    }

    #[test]
    fn test_malformed_value_skips_only_that_value() {
        let root = TempDir::new().unwrap();
        let card = root.path().join("card0");
        write(&card.join("device/vendor"), "0x1002");
        write(&card.join("device/gpu_busy_percent"), "busy");
        write(&card.join("device/hwmon/hwmon0/temp1_input"), "41000");

        let data = get_drm_stats(root.path());
        assert!(!data.contains_key("gpu_amd_card0_usage_percent"));
        assert_eq!(data.get("gpu_amd_card0_temp_c"), Some(&MetricValue::Float(41.0)));
    }

    #[test]
    fn test_intel_card() {
        let root = TempDir::new().unwrap();
        let card = root.path().join("card0");
        write(&card.join("device/vendor"), "0x8086\n");
        write(&card.join("gt_act_freq_mhz"), "1150\n");
        // Intel cards only report frequency through this path.
        write(&card.join("device/gpu_busy_percent"), "10\n");

        let data = get_drm_stats(root.path());
        assert_eq!(data.len(), 1);
        assert_eq!(data.get("gpu_intel_card0_freq_mhz"), Some(&MetricValue::Int(1150)));
    }

    #[test]
    fn test_cards_without_vendor_or_unknown_vendor_are_skipped() {
        let root = TempDir::new().unwrap();
        write(&root.path().join("card0/device/vendor"), "0x1002");
        write(&root.path().join("card0/device/gpu_busy_percent"), "50");
        write(&root.path().join("card1/device/gpu_busy_percent"), "70");
        write(&root.path().join("card2/device/vendor"), "0x10de");
        write(&root.path().join("card2/device/gpu_busy_percent"), "90");
        write(&root.path().join("card0-DP-1/device/vendor"), "0x1002");

        let data = get_drm_stats(root.path());
        assert_eq!(data.len(), 1);
        assert_eq!(data.get("gpu_amd_card0_usage_percent"), Some(&MetricValue::Int(50)));
    }

    #[test]
    fn test_missing_root() {
        assert!(get_drm_stats(Path::new("/nonexistent/drm")).is_empty());
    }
}
