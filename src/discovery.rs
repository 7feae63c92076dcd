// src/discovery.rs
//! Home Assistant style discovery: one retained config document per metric,
//! followed by unretained state updates on a single shared topic.

use crate::error::Result;
use crate::snapshot::Snapshot;
use crate::transport::Transport;
use serde::Serialize;
use tracing::{debug, info};

pub const DEFAULT_DISCOVERY_PREFIX: &str = "homeassistant";

const STATE_CLASS_MEASUREMENT: &str = "measurement";
const STATE_CLASS_TOTAL_INCREASING: &str = "total_increasing";

/// How a rule matches a metric key.
#[derive(Debug, Clone, Copy)]
enum Pattern {
    Suffix(&'static str),
    Contains(&'static str),
}

impl Pattern {
    fn matches(self, key: &str) -> bool {
        match self {
            Pattern::Suffix(s) => key.ends_with(s),
            Pattern::Contains(s) => key.contains(s),
        }
    }
}

struct Rule {
    patterns: &'static [Pattern],
    unit: &'static str,
    device_class: Option<&'static str>,
    state_class: &'static str,
}

/// Evaluated top to bottom, first match wins. A key such as
/// `gpu_nvidia_0_temp_c_percent` matches more than one rule, so the order is
/// part of the output.
const RULES: &[Rule] = &[
    Rule {
        patterns: &[Pattern::Suffix("_percent")],
        unit: "%",
        device_class: None,
        state_class: STATE_CLASS_MEASUREMENT,
    },
    Rule {
        patterns: &[Pattern::Contains("_mb")],
        unit: "MB",
        device_class: Some("data_size"),
        state_class: STATE_CLASS_MEASUREMENT,
    },
    Rule {
        patterns: &[Pattern::Contains("_gb")],
        unit: "GB",
        device_class: Some("data_size"),
        state_class: STATE_CLASS_MEASUREMENT,
    },
    Rule {
        patterns: &[Pattern::Suffix("_c"), Pattern::Contains("temp")],
        unit: "°C",
        device_class: Some("temperature"),
        state_class: STATE_CLASS_MEASUREMENT,
    },
    Rule {
        patterns: &[Pattern::Contains("_watts")],
        unit: "W",
        device_class: Some("power"),
        state_class: STATE_CLASS_MEASUREMENT,
    },
    Rule {
        patterns: &[Pattern::Contains("_freq")],
        unit: "MHz",
        device_class: Some("frequency"),
        state_class: STATE_CLASS_MEASUREMENT,
    },
    Rule {
        patterns: &[Pattern::Contains("uptime")],
        unit: "s",
        device_class: Some("duration"),
        state_class: STATE_CLASS_TOTAL_INCREASING,
    },
];

/// Unit and class metadata inferred from a metric key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub unit: Option<&'static str>,
    pub device_class: Option<&'static str>,
    pub state_class: &'static str,
}

/// Maps a metric key to its unit, device class and state class.
pub fn classify(key: &str) -> Classification {
    RULES
        .iter()
        .find(|rule| rule.patterns.iter().any(|p| p.matches(key)))
        .map(|rule| Classification {
            unit: Some(rule.unit),
            device_class: rule.device_class,
            state_class: rule.state_class,
        })
        .unwrap_or(Classification {
            unit: None,
            device_class: None,
            state_class: STATE_CLASS_MEASUREMENT,
        })
}

/// Device block shared by every discovery document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceIdentity {
    pub identifiers: Vec<String>,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    pub sw_version: String,
}

impl DeviceIdentity {
    pub fn new(device_name: &str) -> Self {
        Self {
            identifiers: vec![device_id(device_name)],
            name: device_name.to_string(),
            manufacturer: "tinymonitord".to_string(),
            model: "Host Monitor".to_string(),
            sw_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn id(&self) -> &str {
        self.identifiers.first().map(String::as_str).unwrap_or_default()
    }
}

/// Stable device id: lower-cased, spaces replaced by underscores.
pub fn device_id(device_name: &str) -> String {
    device_name.to_lowercase().replace(' ', "_")
}

/// Capitalizes every letter that follows a non-letter, lower-cases the rest.
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_is_letter = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if prev_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(c);
            prev_is_letter = false;
        }
    }
    out
}

/// Template extracting `key` from the state payload. Subscript form, since
/// keys such as `cpu_power_package-0_watts` are not valid attribute names.
fn value_template(key: &str) -> String {
    format!("{{{{ value_json['{key}'] }}}}")
}

/// Configuration message describing one metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveryDocument {
    pub name: String,
    pub state_topic: String,
    pub value_template: String,
    pub unique_id: String,
    pub device: DeviceIdentity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<&'static str>,
    pub state_class: &'static str,
}

/// Builds topics and documents for one device and sends them through a
/// [`Transport`].
#[derive(Debug, Clone)]
pub struct DiscoveryPublisher {
    prefix: String,
    device: DeviceIdentity,
}

impl DiscoveryPublisher {
    pub fn new(prefix: impl Into<String>, device_name: &str) -> Self {
        Self {
            prefix: prefix.into(),
            device: DeviceIdentity::new(device_name),
        }
    }

    /// `{prefix}/sensor/{device_id}/state`
    pub fn state_topic(&self) -> String {
        format!("{}/sensor/{}/state", self.prefix, self.device.id())
    }

    /// `{prefix}/sensor/{device_id}/{key}/config`
    pub fn config_topic(&self, key: &str) -> String {
        format!("{}/sensor/{}/{key}/config", self.prefix, self.device.id())
    }

    /// Document describing `key`.
    pub fn document(&self, key: &str) -> DiscoveryDocument {
        let class = classify(key);
        DiscoveryDocument {
            name: format!("{} {}", self.device.name, title_case(&key.replace('_', " "))),
            state_topic: self.state_topic(),
            value_template: value_template(key),
            unique_id: format!("{}_{key}", self.device.id()),
            device: self.device.clone(),
            unit_of_measurement: class.unit,
            device_class: class.device_class,
            state_class: class.state_class,
        }
    }

    /// One `(config topic, document)` pair per key of `snapshot`.
    pub fn documents(&self, snapshot: &Snapshot) -> Vec<(String, DiscoveryDocument)> {
        snapshot
            .keys()
            .map(|key| (self.config_topic(key), self.document(key)))
            .collect()
    }

    /// Publishes a retained config document for every key; returns how many
    /// were sent.
    pub async fn publish_discovery<T>(&self, transport: &T, snapshot: &Snapshot) -> Result<usize>
    where
        T: Transport + ?Sized,
    {
        let documents = self.documents(snapshot);
        for (topic, document) in &documents {
            let payload = serde_json::to_vec(document)?;
            transport.publish(topic, &payload, true).await?;
        }
        info!("published {} discovery documents", documents.len());
        Ok(documents.len())
    }

    /// Publishes the whole snapshot as one unretained payload.
    pub async fn publish_state<T>(&self, transport: &T, snapshot: &Snapshot) -> Result<()>
    where
        T: Transport + ?Sized,
    {
        let payload = serde_json::to_vec(snapshot)?;
        transport.publish(&self.state_topic(), &payload, false).await?;
        debug!("published state ({} bytes)", payload.len());
        Ok(())
    }
}
