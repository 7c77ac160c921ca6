use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::Result;

/// Label and annotation sets. Ordered so that rendered issue bodies are stable.
pub type KV = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Firing,
    Resolved,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Firing => "firing",
            AlertStatus::Resolved => "resolved",
        }
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// AlertManager webhook payload (version 4)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    #[serde(default)]
    pub version: String,
    #[serde(rename = "groupKey", default)]
    pub group_key: String,
    #[serde(rename = "truncatedAlerts", default, skip_serializing_if = "Option::is_none")]
    pub truncated_alerts: Option<u64>,
    pub status: AlertStatus,
    #[serde(default)]
    pub receiver: String,
    #[serde(rename = "groupLabels", default)]
    pub group_labels: KV,
    #[serde(rename = "commonLabels", default)]
    pub common_labels: KV,
    #[serde(rename = "commonAnnotations", default)]
    pub common_annotations: KV,
    #[serde(rename = "externalURL", default)]
    pub external_url: String,
    #[serde(default)]
    pub alerts: Vec<AlertEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEntry {
    pub status: AlertStatus,
    #[serde(default)]
    pub labels: KV,
    #[serde(default)]
    pub annotations: KV,
    #[serde(rename = "startsAt")]
    pub starts_at: DateTime<Utc>,
    #[serde(rename = "endsAt", default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(rename = "generatorURL", default)]
    pub generator_url: String,
    #[serde(default)]
    pub fingerprint: String,
}

impl Notification {
    /// Decodes a raw webhook body. The content type is not checked; Alertmanager
    /// always sends JSON.
    pub fn decode(body: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(body)?)
    }

    pub fn alert_name(&self) -> &str {
        self.group_labels
            .get("alertname")
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Opaque identifier derived from the group key, embedded in issue bodies
    /// for traceability.
    pub fn id(&self) -> String {
        let mut id = String::with_capacity(2 + self.group_key.len() * 2);
        id.push_str("0x");
        for byte in self.group_key.as_bytes() {
            id.push_str(&format!("{:02x}", byte));
        }
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    const PAYLOAD: &str = r#"{
        "version": "4",
        "groupKey": "{}:{alertname=\"DiskRunningFull\"}",
        "status": "firing",
        "receiver": "webhook",
        "groupLabels": {"alertname": "DiskRunningFull"},
        "commonLabels": {"alertname": "DiskRunningFull", "repo": "infra"},
        "commonAnnotations": {},
        "externalURL": "http://localhost:9093",
        "alerts": [
            {
                "status": "firing",
                "labels": {"dev": "sda3", "instance": "example4", "alertname": "DiskRunningFull"},
                "annotations": {"description": "This is how to handle the alert"},
                "startsAt": "2017-06-28T01:40:00Z",
                "endsAt": "0001-01-01T00:00:00Z",
                "generatorURL": "http://generator.url/"
            }
        ]
    }"#;

    #[test]
    fn decodes_alertmanager_payload() {
        let msg = Notification::decode(PAYLOAD.as_bytes()).unwrap();
        assert_eq!(msg.status, AlertStatus::Firing);
        assert_eq!(msg.alert_name(), "DiskRunningFull");
        assert_eq!(msg.common_labels.get("repo").map(String::as_str), Some("infra"));
        assert_eq!(msg.alerts.len(), 1);
        assert_eq!(msg.alerts[0].generator_url, "http://generator.url/");
        assert_eq!(msg.alerts[0].fingerprint, "");
    }

    #[test]
    fn rejects_malformed_json() {
        let mut body = PAYLOAD.to_string();
        body.push_str("}{");
        let err = Notification::decode(body.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn rejects_unknown_status() {
        let body = PAYLOAD.replacen("\"status\": \"firing\"", "\"status\": \"pending\"", 1);
        assert!(Notification::decode(body.as_bytes()).is_err());
    }

    #[test]
    fn id_is_hex_of_group_key() {
        let mut msg = Notification::decode(PAYLOAD.as_bytes()).unwrap();
        msg.group_key = "{}:a".to_string();
        assert_eq!(msg.id(), "0x7b7d3a61");
    }
}
