// src/main.rs
use clap::Parser;
use tinymonitord::config::{Config, TransportKind};
use tinymonitord::transport::{DryRunTransport, MqttTransport, UdpTransport, mqtt_options};
use tinymonitord::{Agent, DiscoveryPublisher, Monitor};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::parse();
    let device_name = config.device_name();

    info!("starting system monitor for device: {device_name}");

    let monitor = Monitor::new();
    let publisher = DiscoveryPublisher::new(config.discovery_prefix.clone(), &device_name);

    if config.dry_run {
        info!("dry run, nothing will be sent");
        Agent::new(monitor, publisher, DryRunTransport, config.interval())
            .run()
            .await?;
    } else {
        info!("connecting to broker: {}:{}", config.broker, config.port);
        let credentials = config.credentials();
        let tls = config.tls();
        match config.transport {
            TransportKind::Mqtt => {
                let options = mqtt_options(
                    &config.client_id(),
                    &config.broker,
                    config.port,
                    credentials.as_ref(),
                    tls.as_ref(),
                )?;
                Agent::new(monitor, publisher, MqttTransport::connect(options), config.interval())
                    .run()
                    .await?;
            }
            TransportKind::Udp => {
                let transport =
                    UdpTransport::connect(&config.broker, config.port, credentials.as_ref(), tls.as_ref())
                        .await?;
                Agent::new(monitor, publisher, transport, config.interval())
                    .run()
                    .await?;
            }
        }
    }

    Ok(())
}
