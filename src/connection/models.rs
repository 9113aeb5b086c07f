use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use strum_macros::{AsRefStr, Display};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Opaque identifier assigned to a transport session when it is accepted
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// What a connection has registered as.
///
/// A connection starts `Unregistered` and is classified exactly once; it never
/// goes back and never switches between `Device` and `Client`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    Unregistered,
    Device,
    Client,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceMetadata {
    pub device_type: String,
    pub capabilities: serde_json::Value,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientMetadata {
    pub client_type: String,
    pub player_name: String,
}

/// Registration details kept for a connection, stored but not interpreted
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionMetadata {
    Device(DeviceMetadata),
    Client(ClientMetadata),
}

/// Outbound half of a transport session.
///
/// The socket task owns the receiving end; dropping the last `Transport`
/// closes the channel, which makes that task close the socket.
#[derive(Debug)]
pub struct Transport {
    sender: mpsc::UnboundedSender<String>,
}

impl Transport {
    pub fn new(sender: mpsc::UnboundedSender<String>) -> Self {
        Self { sender }
    }

    pub fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Best-effort write; returns false when the peer is already gone
    pub fn send(&self, frame: String) -> bool {
        self.is_open() && self.sender.send(frame).is_ok()
    }
}

/// One live transport session as tracked by the registry
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    pub role: Role,
    /// deviceId or clientId, depending on `role`
    pub identity: Option<String>,
    pub metadata: Option<ConnectionMetadata>,
    pub connected_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    transport: Transport,
}

impl Connection {
    pub fn new(id: ConnectionId, transport: Transport, now: DateTime<Utc>) -> Self {
        Self {
            id,
            role: Role::Unregistered,
            identity: None,
            metadata: None,
            connected_at: now,
            last_seen: now,
            transport,
        }
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    pub fn send(&self, frame: String) -> bool {
        self.transport.send(frame)
    }

    pub fn device_metadata(&self) -> Option<&DeviceMetadata> {
        match &self.metadata {
            Some(ConnectionMetadata::Device(metadata)) => Some(metadata),
            _ => None,
        }
    }
}
