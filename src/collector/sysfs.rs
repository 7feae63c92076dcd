// src/collector/sysfs.rs
//! Helpers for reading single values out of sysfs pseudo-files.

use crate::error::ProbeError;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, trace};

/// Reads a pseudo-file and returns its trimmed content.
pub fn read_trimmed(path: &Path) -> Result<String, ProbeError> {
    if !path.exists() {
        return Err(ProbeError::NotAvailable {
            path: path.display().to_string(),
        });
    }
    fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|e| ProbeError::Read {
            path: path.display().to_string(),
            source: e,
        })
}

/// Reads a pseudo-file and parses it as a number.
pub fn read_value<T>(path: &Path) -> Result<T, ProbeError>
where
    T: FromStr,
    T::Err: Display,
{
    let content = read_trimmed(path)?;
    content.parse::<T>().map_err(|e| ProbeError::Parse {
        path: path.display().to_string(),
        detail: format!("'{content}': {e}"),
    })
}

/// Collapses a probe result into value-or-absent.
///
/// Absence is the normal case on most hosts and is only traced; a present but
/// unreadable value is worth a debug line.
pub fn probe<T>(result: Result<T, ProbeError>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e @ ProbeError::NotAvailable { .. }) => {
            trace!("{e}");
            None
        }
        Err(e) => {
            debug!("skipping value: {e}");
            None
        }
    }
}

/// Lists entries of `dir` whose file name satisfies `filter`, sorted by name.
///
/// A missing or unreadable directory yields an empty list.
pub fn list_dir<F>(dir: &Path, filter: F) -> Vec<PathBuf>
where
    F: Fn(&str) -> bool,
{
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut paths: Vec<PathBuf> = entries
        .flatten()
        .filter(|entry| filter(&entry.file_name().to_string_lossy()))
        .map(|entry| entry.path())
        .collect();
    paths.sort();
    paths
}

/// File name of a path as an owned string.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
