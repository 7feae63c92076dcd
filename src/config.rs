// src/config.rs
//! Command line and environment configuration.

use crate::collector::get_hostname;
use crate::discovery::DEFAULT_DISCOVERY_PREFIX;
use crate::transport::{Credentials, TlsOptions};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// Wire used to reach the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransportKind {
    /// MQTT session, optionally over TLS.
    Mqtt,
    /// JSON datagrams to a local relay, plain text only.
    Udp,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "tinymonitord", version, about = "Publish host metrics with broker discovery")]
pub struct Config {
    /// Broker host name or address.
    #[arg(long, env = "MQTT_BROKER", default_value = "localhost")]
    pub broker: String,

    #[arg(long, env = "MQTT_PORT", default_value_t = 1883)]
    pub port: u16,

    #[arg(long, env = "TRANSPORT", value_enum, default_value_t = TransportKind::Mqtt)]
    pub transport: TransportKind,

    #[arg(long, env = "MQTT_USER")]
    pub user: Option<String>,

    #[arg(long, env = "MQTT_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    #[arg(long, env = "MQTT_USE_TLS")]
    pub tls: bool,

    #[arg(long, env = "MQTT_TLS_CA_CERTS")]
    pub tls_ca_certs: Option<PathBuf>,

    #[arg(long, env = "MQTT_TLS_CERTFILE")]
    pub tls_certfile: Option<PathBuf>,

    #[arg(long, env = "MQTT_TLS_KEYFILE")]
    pub tls_keyfile: Option<PathBuf>,

    /// Skip certificate verification.
    #[arg(long, env = "MQTT_TLS_INSECURE")]
    pub tls_insecure: bool,

    /// Seconds between state updates.
    #[arg(
        long,
        env = "UPDATE_INTERVAL",
        default_value_t = 10,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub interval: u64,

    /// Display name of this host; defaults to the host name.
    #[arg(long, env = "DEVICE_NAME")]
    pub device_name: Option<String>,

    #[arg(long, env = "DISCOVERY_PREFIX", default_value = DEFAULT_DISCOVERY_PREFIX)]
    pub discovery_prefix: String,

    /// Log messages instead of sending them.
    #[arg(long, env = "DRY_RUN")]
    pub dry_run: bool,
}

impl Config {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    /// Client identifier of the broker session.
    pub fn client_id(&self) -> String {
        format!("tinymonitord-{}", std::process::id())
    }

    pub fn device_name(&self) -> String {
        self.device_name.clone().unwrap_or_else(get_hostname)
    }

    /// Credentials only when both user and password are set.
    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.user, &self.password) {
            (Some(username), Some(password)) => Some(Credentials {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        }
    }

    pub fn tls(&self) -> Option<TlsOptions> {
        self.tls.then(|| TlsOptions {
            ca_certs: self.tls_ca_certs.clone(),
            certfile: self.tls_certfile.clone(),
            keyfile: self.tls_keyfile.clone(),
            insecure: self.tls_insecure,
        })
    }
}
