// src/error.rs
//! Error types for probing and publishing.

use std::io;

/// Failure to obtain a single value from a pseudo-file.
///
/// Never leaves a probe: `collector::sysfs::probe` turns it into an absent value.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// The file does not exist on this host.
    #[error("sysfs path not found: {path}")]
    NotAvailable { path: String },

    /// The file exists but could not be read.
    #[error("failed to read {path}: {source}")]
    Read { path: String, source: io::Error },

    /// The file content is not the expected number.
    #[error("failed to parse value from {path}: {detail}")]
    Parse { path: String, detail: String },
}

/// Errors surfaced by the agent loop and the transports.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to serialize payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("broker client: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, AgentError>;
