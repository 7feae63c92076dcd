// src/agent.rs
//! The poll loop: warm up, register sensors, then publish state forever.

use crate::collector::Monitor;
use crate::discovery::DiscoveryPublisher;
use crate::error::Result;
use crate::transport::Transport;
use std::time::Duration;
use tracing::{error, info};

/// Pause between the warm-up read and the discovery read, so rate-derived
/// metrics exist in the snapshot used for discovery.
pub const WARM_UP: Duration = Duration::from_secs(1);

pub struct Agent<T> {
    monitor: Monitor,
    publisher: DiscoveryPublisher,
    transport: T,
    interval: Duration,
}

impl<T: Transport> Agent<T> {
    pub fn new(
        monitor: Monitor,
        publisher: DiscoveryPublisher,
        transport: T,
        interval: Duration,
    ) -> Self {
        Self {
            monitor,
            publisher,
            transport,
            interval,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Takes the baseline read, waits `warm_up`, then publishes discovery
    /// for every key of the second read.
    pub async fn register(&mut self, warm_up: Duration) -> Result<usize> {
        self.monitor.collect();
        tokio::time::sleep(warm_up).await;
        let snapshot = self.monitor.collect();
        self.publisher
            .publish_discovery(&self.transport, &snapshot)
            .await
    }

    /// One state update.
    pub async fn poll_once(&mut self) -> Result<()> {
        let snapshot = self.monitor.collect();
        self.publisher.publish_state(&self.transport, &snapshot).await
    }

    /// Registers sensors then polls until the process ends. A failed cycle is
    /// logged and the next one runs on schedule.
    pub async fn run(mut self) -> Result<()> {
        info!("performing initial discovery");
        self.register(WARM_UP).await?;

        info!("starting main loop with interval: {}s", self.interval.as_secs());
        loop {
            if let Err(e) = self.poll_once().await {
                error!("error in main loop: {e}");
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}
