//! 事件信封
//!
//! 每类 Broker 事件对应一种带时间戳的记录，以 JSON 编码后交给下游 Sink。
//! 字段名对下游消费方是稳定契约。

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SinkError;

/// 事件类别，每个类别可绑定独立的下游
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Started,
    Stopped,
    Connect,
    Disconnect,
    SessionEstablished,
    Published,
    Subscribed,
    Unsubscribed,
    WillSent,
}

impl EventCategory {
    pub const ALL: [EventCategory; 9] = [
        EventCategory::Started,
        EventCategory::Stopped,
        EventCategory::Connect,
        EventCategory::Disconnect,
        EventCategory::SessionEstablished,
        EventCategory::Published,
        EventCategory::Subscribed,
        EventCategory::Unsubscribed,
        EventCategory::WillSent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::Started => "started",
            EventCategory::Stopped => "stopped",
            EventCategory::Connect => "connect",
            EventCategory::Disconnect => "disconnect",
            EventCategory::SessionEstablished => "session_established",
            EventCategory::Published => "published",
            EventCategory::Subscribed => "subscribed",
            EventCategory::Unsubscribed => "unsubscribed",
            EventCategory::WillSent => "will_sent",
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectEvent {
    pub client_id: String,
    pub username: String,
    #[serde(default)]
    pub remote_addr: Option<String>,
    pub clean_start: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisconnectEvent {
    pub client_id: String,
    pub username: String,
    #[serde(default)]
    pub reason: Option<String>,
    pub expired: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub client_id: String,
    pub username: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishEvent {
    pub client_id: String,
    pub username: String,
    pub topic: String,
    #[serde(with = "base64_payload")]
    pub payload: Vec<u8>,
    pub qos: u8,
    pub retain: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionEvent {
    pub client_id: String,
    pub username: String,
    pub topic: String,
    #[serde(default)]
    pub qos: Option<u8>,
    pub timestamp: DateTime<Utc>,
}

/// 事件信封
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventEnvelope {
    Started(LifecycleEvent),
    Stopped(LifecycleEvent),
    Connect(ConnectEvent),
    Disconnect(DisconnectEvent),
    SessionEstablished(SessionEvent),
    Published(PublishEvent),
    Subscribed(SubscriptionEvent),
    Unsubscribed(SubscriptionEvent),
    WillSent(PublishEvent),
}

impl EventEnvelope {
    pub fn category(&self) -> EventCategory {
        match self {
            EventEnvelope::Started(_) => EventCategory::Started,
            EventEnvelope::Stopped(_) => EventCategory::Stopped,
            EventEnvelope::Connect(_) => EventCategory::Connect,
            EventEnvelope::Disconnect(_) => EventCategory::Disconnect,
            EventEnvelope::SessionEstablished(_) => EventCategory::SessionEstablished,
            EventEnvelope::Published(_) => EventCategory::Published,
            EventEnvelope::Subscribed(_) => EventCategory::Subscribed,
            EventEnvelope::Unsubscribed(_) => EventCategory::Unsubscribed,
            EventEnvelope::WillSent(_) => EventCategory::WillSent,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            EventEnvelope::Started(event) | EventEnvelope::Stopped(event) => event.timestamp,
            EventEnvelope::Connect(event) => event.timestamp,
            EventEnvelope::Disconnect(event) => event.timestamp,
            EventEnvelope::SessionEstablished(event) => event.timestamp,
            EventEnvelope::Published(event) | EventEnvelope::WillSent(event) => event.timestamp,
            EventEnvelope::Subscribed(event) | EventEnvelope::Unsubscribed(event) => {
                event.timestamp
            }
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, SinkError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, SinkError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

mod base64_payload {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(payload: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(payload))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)
    }
}
