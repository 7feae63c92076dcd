// src/transport.rs
//! Outbound message transports.
//!
//! The agent only needs `publish`; connection management stays inside each
//! transport.

use crate::error::{AgentError, Result};
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Keep-alive interval of the broker session.
pub const KEEP_ALIVE: Duration = Duration::from_secs(60);

/// Publishes that may wait in the client queue while the broker is away.
const REQUEST_CAPACITY: usize = 64;

/// Pause before the event loop retries a failed connection.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Broker login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// TLS material for the broker connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsOptions {
    pub ca_certs: Option<PathBuf>,
    pub certfile: Option<PathBuf>,
    pub keyfile: Option<PathBuf>,
    pub insecure: bool,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Hands one message to the transport. Returns once it is queued or
    /// written locally; delivery is not awaited.
    async fn publish(&self, topic: &str, payload: &[u8], retained: bool) -> Result<()>;
}

/// Builds the session options for `broker:port`.
///
/// TLS material is read from disk here so that a missing file fails at
/// startup instead of on every reconnect.
pub fn mqtt_options(
    client_id: &str,
    broker: &str,
    port: u16,
    credentials: Option<&Credentials>,
    tls: Option<&TlsOptions>,
) -> Result<MqttOptions> {
    let mut options = MqttOptions::new(client_id, broker, port);
    options.set_keep_alive(KEEP_ALIVE);
    if let Some(login) = credentials {
        options.set_credentials(login.username.clone(), login.password.clone());
    }
    if let Some(tls) = tls {
        options.set_transport(tls_transport(tls)?);
    }
    Ok(options)
}

fn tls_transport(tls: &TlsOptions) -> Result<rumqttc::Transport> {
    if tls.insecure {
        return Err(AgentError::Config(
            "disabling certificate verification is not supported, pass --tls-ca-certs instead"
                .into(),
        ));
    }

    let client_auth = match (&tls.certfile, &tls.keyfile) {
        (Some(cert), Some(key)) => Some((fs::read(cert)?, fs::read(key)?)),
        (None, None) => None,
        _ => {
            return Err(AgentError::Config(
                "--tls-certfile and --tls-keyfile must be given together".into(),
            ));
        }
    };

    match &tls.ca_certs {
        Some(ca) => Ok(rumqttc::Transport::tls(fs::read(ca)?, client_auth, None)),
        None if client_auth.is_none() => Ok(rumqttc::Transport::tls_with_default_config()),
        None => Err(AgentError::Config(
            "a client certificate needs --tls-ca-certs".into(),
        )),
    }
}

/// MQTT session to the broker.
///
/// The client event loop runs on its own task and reconnects on failure;
/// publishes are queued meanwhile and dropped once the queue is full.
pub struct MqttTransport {
    client: AsyncClient,
    event_loop: JoinHandle<()>,
}

impl MqttTransport {
    /// Starts the session. Returns before the broker has answered.
    pub fn connect(options: MqttOptions) -> Self {
        let (broker, port) = options.broker_address();
        let (client, mut events) = AsyncClient::new(options, REQUEST_CAPACITY);

        let event_loop = tokio::spawn(async move {
            loop {
                match events.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("connected to broker {broker}:{port}");
                    }
                    Ok(event) => debug!("broker event: {event:?}"),
                    Err(e) => {
                        warn!("broker connection {broker}:{port}: {e}");
                        tokio::time::sleep(RECONNECT_DELAY).await;
                    }
                }
            }
        });

        Self { client, event_loop }
    }
}

impl Drop for MqttTransport {
    fn drop(&mut self) {
        self.event_loop.abort();
    }
}

#[async_trait]
impl Transport for MqttTransport {
    async fn publish(&self, topic: &str, payload: &[u8], retained: bool) -> Result<()> {
        match self
            .client
            .try_publish(topic, QoS::AtMostOnce, retained, payload.to_vec())
        {
            Ok(()) => Ok(()),
            Err(rumqttc::ClientError::TryRequest(_)) => {
                warn!("broker queue full, dropping message for {topic}");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Datagram carrying one published message.
#[derive(Debug, Serialize)]
struct Envelope<'a> {
    topic: &'a str,
    retain: bool,
    payload: serde_json::Value,
}

/// Sends each publish as a JSON datagram to a relay listening on
/// `broker:port`. Plain text only.
pub struct UdpTransport {
    socket: UdpSocket,
    target: String,
}

impl UdpTransport {
    pub async fn connect(
        broker: &str,
        port: u16,
        credentials: Option<&Credentials>,
        tls: Option<&TlsOptions>,
    ) -> Result<Self> {
        if tls.is_some() {
            return Err(AgentError::Config(
                "TLS was requested but the UDP transport cannot encrypt".into(),
            ));
        }
        if credentials.is_some() {
            warn!("credentials are not used by the UDP transport");
        }

        let target = format!("{broker}:{port}");
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(&target).await?;
        info!("sending metrics to UDP {target}");

        Ok(Self { socket, target })
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn publish(&self, topic: &str, payload: &[u8], retained: bool) -> Result<()> {
        let envelope = Envelope {
            topic,
            retain: retained,
            payload: serde_json::from_slice(payload)?,
        };
        let bytes = serde_json::to_vec(&envelope)?;
        let sent = self.socket.send(&bytes).await?;
        if sent != bytes.len() {
            return Err(AgentError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                format!("short datagram to {}: {sent}/{} bytes", self.target, bytes.len()),
            )));
        }
        Ok(())
    }
}

/// Logs every publish instead of sending it.
#[derive(Debug, Default)]
pub struct DryRunTransport;

#[async_trait]
impl Transport for DryRunTransport {
    async fn publish(&self, topic: &str, payload: &[u8], retained: bool) -> Result<()> {
        info!(
            "[dry-run] {topic} (retain={retained}): {}",
            String::from_utf8_lossy(payload)
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_udp_envelope() {
        let relay = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = relay.local_addr().unwrap().port();

        let transport = UdpTransport::connect("127.0.0.1", port, None, None)
            .await
            .unwrap();
        transport
            .publish("homeassistant/sensor/box/state", br#"{"load_1m":0.5}"#, false)
            .await
            .unwrap();

        let mut buf = [0u8; 1024];
        let n = relay.recv(&mut buf).await.unwrap();
        let datagram: serde_json::Value = serde_json::from_slice(&buf[..n]).unwrap();

        assert_eq!(datagram["topic"], "homeassistant/sensor/box/state");
        assert_eq!(datagram["retain"], false);
        assert_eq!(datagram["payload"]["load_1m"], 0.5);
    }

    #[tokio::test]
    async fn test_udp_rejects_non_json_payload() {
        let relay = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = relay.local_addr().unwrap().port();
        let transport = UdpTransport::connect("127.0.0.1", port, None, None)
            .await
            .unwrap();

        let result = transport.publish("t", b"not json", true).await;
        assert!(matches!(result, Err(AgentError::Json(_))));
    }

    #[tokio::test]
    async fn test_udp_refuses_tls() {
        let result = UdpTransport::connect("127.0.0.1", 9, None, Some(&TlsOptions::default())).await;
        assert!(matches!(result, Err(AgentError::Config(_))));
    }

    #[test]
    fn test_mqtt_options_plain() {
        let login = Credentials {
            username: "agent".into(),
            password: "s3cret".into(),
        };
        let options = mqtt_options("tinymonitord-box", "mqtt.lan", 1883, Some(&login), None).unwrap();

        assert_eq!(options.broker_address(), ("mqtt.lan".to_string(), 1883));
        assert_eq!(options.client_id(), "tinymonitord-box");
        assert_eq!(options.keep_alive(), KEEP_ALIVE);
    }

    #[test]
    fn test_mqtt_options_with_ca() {
        let dir = tempfile::TempDir::new().unwrap();
        let ca = dir.path().join("ca.crt");
        fs::write(&ca, "-----BEGIN CERTIFICATE-----\n").unwrap();

        let tls = TlsOptions {
            ca_certs: Some(ca),
            ..TlsOptions::default()
        };
        assert!(mqtt_options("id", "mqtt.lan", 8883, None, Some(&tls)).is_ok());
    }

    #[test]
    fn test_mqtt_tls_errors() {
        let insecure = TlsOptions {
            insecure: true,
            ..TlsOptions::default()
        };
        assert!(matches!(
            mqtt_options("id", "h", 8883, None, Some(&insecure)),
            Err(AgentError::Config(_))
        ));

        let half_pair = TlsOptions {
            certfile: Some(PathBuf::from("/etc/client.crt")),
            ..TlsOptions::default()
        };
        assert!(matches!(
            mqtt_options("id", "h", 8883, None, Some(&half_pair)),
            Err(AgentError::Config(_))
        ));

        let missing_ca = TlsOptions {
            ca_certs: Some(PathBuf::from("/nonexistent/ca.crt")),
            ..TlsOptions::default()
        };
        assert!(matches!(
            mqtt_options("id", "h", 8883, None, Some(&missing_ca)),
            Err(AgentError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_mqtt_publish_queues_while_disconnected() {
        // Nothing listens on port 1; publishes wait in the client queue.
        let options = mqtt_options("id", "127.0.0.1", 1, None, None).unwrap();
        let transport = MqttTransport::connect(options);

        for _ in 0..REQUEST_CAPACITY + 8 {
            transport
                .publish("homeassistant/sensor/box/state", b"{}", false)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_dry_run_accepts_everything() {
        let transport = DryRunTransport;
        assert!(transport.publish("t", b"{}", true).await.is_ok());
    }
}
