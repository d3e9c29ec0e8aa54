//! Core types for the a3s-hooks system
//!
//! Webhook and request ids are opaque strings. Records use camelCase JSON
//! when they are persisted or published.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Generate a fresh webhook identifier
pub fn new_webhook_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Generate a fresh request identifier
///
/// UUIDv7, so ids read roughly in arrival order. Log ordering does not
/// depend on it: stores break timestamp ties by insertion.
pub fn new_request_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

/// Liveness flag stored alongside each webhook id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Registered,
    Removed,
}

impl Liveness {
    /// Value written into the store
    pub fn as_flag(&self) -> &'static str {
        match self {
            Liveness::Registered => "true",
            Liveness::Removed => "false",
        }
    }

    /// Parse a stored value; anything but `"true"` counts as removed
    pub fn from_flag(flag: &str) -> Self {
        if flag == "true" {
            Liveness::Registered
        } else {
            Liveness::Removed
        }
    }
}

/// One inbound call recorded against a webhook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookRequest {
    /// Request id, monotonic with arrival order
    pub id: String,

    /// Owning webhook
    pub webhook_id: String,

    /// Opaque payload, never parsed here
    #[serde(with = "payload_base64")]
    pub payload: Bytes,

    /// Arrival time, used only for ordering
    pub received_at: DateTime<Utc>,
}

impl WebhookRequest {
    /// Stamp a new request with a fresh id and the current time
    pub fn new(webhook_id: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            id: new_request_id(),
            webhook_id: webhook_id.into(),
            payload: payload.into(),
            received_at: Utc::now(),
        }
    }

    /// Sort key within the owning webhook's log (Unix milliseconds)
    pub fn score(&self) -> i64 {
        self.received_at.timestamp_millis()
    }

    /// Payload as UTF-8, if it is valid text
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}

mod payload_base64 {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(payload: &Bytes, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(payload))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(d)?;
        STANDARD
            .decode(encoded)
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}
