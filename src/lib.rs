// src/lib.rs
//! Host telemetry agent: samples CPU, memory, disk, network and GPU metrics
//! and publishes them with self-describing discovery documents.

pub mod agent;
pub mod collector;
pub mod config;
pub mod discovery;
pub mod error;
pub mod snapshot;
pub mod transport;

pub use agent::Agent;
pub use collector::Monitor;
pub use discovery::{DiscoveryPublisher, classify};
pub use error::{AgentError, ProbeError, Result};
pub use snapshot::{MetricValue, Snapshot};
