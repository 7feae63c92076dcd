// src/collector/power.rs
//! CPU package power derived from RAPL energy counters.
//!
//! The kernel exposes one directory per power domain under
//! `/sys/class/powercap/intel-rapl/intel-rapl:N`, each carrying a `name`
//! (e.g. `package-0`) and a cumulative `energy_uj` counter. Watts are the
//! counter delta over the time elapsed since the previous sample.

use super::sysfs::{self, list_dir, probe};
use crate::snapshot::{Snapshot, round2};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Default root of the RAPL powercap tree.
pub const RAPL_ROOT: &str = "/sys/class/powercap/intel-rapl";

const DOMAIN_PREFIX: &str = "intel-rapl:";

/// Holds the previous energy reading of every power domain seen so far.
#[derive(Debug, Clone)]
pub struct PowerSampler {
    root: PathBuf,
    last_energy_uj: HashMap<PathBuf, u64>,
}

impl PowerSampler {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            last_energy_uj: HashMap::new(),
        }
    }

    /// Number of domains that currently hold a baseline.
    pub fn tracked_domains(&self) -> usize {
        self.last_energy_uj.len()
    }

    /// Reads every domain once and returns `cpu_power_<name>_watts` for each
    /// domain that already had a baseline and whose counter did not go back.
    ///
    /// The stored baseline is replaced on every successful read, including
    /// the first one and the one following a counter reset.
    pub fn sample(&mut self, elapsed_secs: f64) -> Snapshot {
        let mut data = Snapshot::new();

        for domain in list_dir(&self.root, |n| n.starts_with(DOMAIN_PREFIX)) {
            let Some((name, energy_uj)) = read_domain(&domain) else {
                continue;
            };

            if let Some(previous) = self.last_energy_uj.get(&domain) {
                if let Some(watts) = watts_between(*previous, energy_uj, elapsed_secs) {
                    data.insert(format!("cpu_power_{name}_watts"), watts);
                }
            }

            self.last_energy_uj.insert(domain, energy_uj);
        }

        data
    }
}

/// Reads `(name, energy_uj)` of one domain; both must be present.
fn read_domain(domain: &Path) -> Option<(String, u64)> {
    let name = probe(sysfs::read_trimmed(&domain.join("name")))?;
    let energy_uj = probe(sysfs::read_value::<u64>(&domain.join("energy_uj")))?;
    Some((name, energy_uj))
}

/// Average power between two counter readings, `None` on a counter reset.
pub fn watts_between(previous_uj: u64, current_uj: u64, elapsed_secs: f64) -> Option<f64> {
    let delta_uj = current_uj.checked_sub(previous_uj)?;
    Some(round2((delta_uj as f64 / 1_000_000.0) / elapsed_secs))
}
