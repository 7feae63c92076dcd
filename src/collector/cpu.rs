// src/collector/cpu.rs
//! CPU usage, frequency, load average and temperature.

use super::sysfs::{self, file_name, list_dir, probe};
use crate::snapshot::{Snapshot, round1};
use std::path::{Path, PathBuf};
use sysinfo::System;

/// Default root of the hardware-monitor class.
pub const HWMON_ROOT: &str = "/sys/class/hwmon";

/// Function to extract overall and per-core utilization.
///
/// `sys` must have had its CPU list refreshed; the first refresh of a
/// `System` always reports zero usage.
pub fn get_cpu_usage(sys: &System) -> Snapshot {
    let mut data = Snapshot::new();
    data.insert(
        "cpu_usage_percent",
        round1(f64::from(sys.global_cpu_info().cpu_usage())),
    );
    for (i, cpu) in sys.cpus().iter().enumerate() {
        data.insert(
            format!("cpu_core_{i}_usage_percent"),
            round1(f64::from(cpu.cpu_usage())),
        );
    }
    data
}

/// Function to extract the mean current frequency across cores in MHz.
///
/// Omitted when the platform reports no frequency.
pub fn get_cpu_freq(sys: &System) -> Snapshot {
    let mut data = Snapshot::new();
    let freqs: Vec<u64> = sys
        .cpus()
        .iter()
        .map(|cpu| cpu.frequency())
        .filter(|f| *f > 0)
        .collect();
    if !freqs.is_empty() {
        let mean = freqs.iter().sum::<u64>() as f64 / freqs.len() as f64;
        data.insert("cpu_freq_current", round1(mean));
    }
    data
}

/// Function to extract the 1/5/15 minute load averages.
#[cfg(unix)]
pub fn get_cpu_load() -> Snapshot {
    let load = System::load_average();
    let mut data = Snapshot::new();
    data.insert("load_1m", load.one);
    data.insert("load_5m", load.five);
    data.insert("load_15m", load.fifteen);
    data
}

#[cfg(not(unix))]
pub fn get_cpu_load() -> Snapshot {
    Snapshot::new()
}

/// Function to extract CPU temperatures from hwmon chips.
///
/// Every `coretemp` chip (one per package) yields one `cpu_temp_<label>` per
/// input; when there is none, a `cpu_thermal` chip (single-board computers)
/// yields a single `cpu_temp`.
pub fn get_cpu_temperature(hwmon_root: &Path) -> Snapshot {
    let mut data = Snapshot::new();
    let chips = list_dir(hwmon_root, |n| n.starts_with("hwmon"));

    let coretemp = chips_named(&chips, "coretemp");
    if !coretemp.is_empty() {
        for chip in coretemp {
            data.merge(get_coretemp_inputs(chip));
        }
    } else if let Some(chip) = chips_named(&chips, "cpu_thermal").first() {
        if let Some(millideg) = probe(sysfs::read_value::<i64>(&chip.join("temp1_input"))) {
            data.insert("cpu_temp", millideg as f64 / 1000.0);
        }
    }

    data
}

/// Chips whose `name` file reads `wanted`.
fn chips_named<'a>(chips: &'a [PathBuf], wanted: &str) -> Vec<&'a Path> {
    chips
        .iter()
        .filter(|chip| probe(sysfs::read_trimmed(&chip.join("name"))).as_deref() == Some(wanted))
        .map(PathBuf::as_path)
        .collect()
}

/// Reads every `temp*_input` of one coretemp chip, keyed by its label.
fn get_coretemp_inputs(chip: &Path) -> Snapshot {
    let mut data = Snapshot::new();
    for input in list_dir(chip, |n| n.starts_with("temp") && n.ends_with("_input")) {
        let Some(millideg) = probe(sysfs::read_value::<i64>(&input)) else {
            continue;
        };
        let label_path = chip.join(file_name(&input).replace("_input", "_label"));
        let label = probe(sysfs::read_trimmed(&label_path))
            .filter(|l| !l.is_empty())
            .map(|l| sanitize_label(&l))
            .unwrap_or_else(|| "cpu_temp".to_string());
        data.insert(format!("cpu_temp_{label}"), millideg as f64 / 1000.0);
    }
    data
}

/// Lower-cases a sensor label and replaces spaces so it can be part of a key.
fn sanitize_label(label: &str) -> String {
    label.trim().to_lowercase().replace(' ', "_")
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
    fn test_coretemp_labels() {
        let root = TempDir::new().unwrap();
        let chip = root.path().join("hwmon3");
        write(&chip.join("name"), "coretemp\n");
        write(&chip.join("temp1_input"), "54000\n");
        write(&chip.join("temp1_label"), "Package id 0\n");
        write(&chip.join("temp2_input"), "51500\n");
        write(&chip.join("temp2_label"), "Core 0\n");
        write(&chip.join("temp3_input"), "49000\n");

        let data = get_cpu_temperature(root.path());

        assert_eq!(data.get("cpu_temp_package_id_0"), Some(&MetricValue::Float(54.0)));
        assert_eq!(data.get("cpu_temp_core_0"), Some(&MetricValue::Float(51.5)));
        assert_eq!(data.get("cpu_temp_cpu_temp"), Some(&MetricValue::Float(49.0)));
    }

    #[test]
    fn test_every_coretemp_package_is_read() {
        let root = TempDir::new().unwrap();
        for (chip, package, millideg) in [("hwmon1", 0, "61000"), ("hwmon2", 1, "58000")] {
            let dir = root.path().join(chip);
            write(&dir.join("name"), "coretemp\n");
            write(&dir.join("temp1_input"), millideg);
            write(&dir.join("temp1_label"), &format!("Package id {package}\n"));
        }
        // A board sensor must not shadow the packages.
        write(&root.path().join("hwmon0/name"), "cpu_thermal\n");
        write(&root.path().join("hwmon0/temp1_input"), "40000\n");

        let data = get_cpu_temperature(root.path());

        assert_eq!(data.get("cpu_temp_package_id_0"), Some(&MetricValue::Float(61.0)));
        assert_eq!(data.get("cpu_temp_package_id_1"), Some(&MetricValue::Float(58.0)));
        assert!(!data.contains_key("cpu_temp"));
    }

    #[test]
    fn test_cpu_thermal_fallback() {
        let root = TempDir::new().unwrap();
        write(&root.path().join("hwmon0/name"), "cpu_thermal\n");
        write(&root.path().join("hwmon0/temp1_input"), "47236\n");
        write(&root.path().join("hwmon1/name"), "nvme\n");
        write(&root.path().join("hwmon1/temp1_input"), "30000\n");

        let data = get_cpu_temperature(root.path());

        assert_eq!(data.len(), 1);
        let temp = data.get("cpu_temp").unwrap().as_f64();
        assert!((temp - 47.236).abs() < 1e-9);
    }

    #[test]
    fn test_no_cpu_chip_yields_nothing() {
        let root = TempDir::new().unwrap();
        write(&root.path().join("hwmon0/name"), "acpitz\n");
        write(&root.path().join("hwmon0/temp1_input"), "27800\n");

        assert!(get_cpu_temperature(root.path()).is_empty());
        assert!(get_cpu_temperature(Path::new("/nonexistent/hwmon")).is_empty());
    }

    #[test]
    fn test_cpu_usage_keys() {
        let mut sys = System::new();
        sys.refresh_cpu();
        let data = get_cpu_usage(&sys);

        assert!(data.contains_key("cpu_usage_percent"));
        for i in 0..sys.cpus().len() {
            assert!(data.contains_key(&format!("cpu_core_{i}_usage_percent")));
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_cpu_load_keys() {
        let data = get_cpu_load();
        for key in ["load_1m", "load_5m", "load_15m"] {
            assert!(data.get(key).unwrap().as_f64() >= 0.0);
        }
    }
}
