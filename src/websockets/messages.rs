use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum_macros::{Display, EnumString};

use crate::connection::{ClientMetadata, DeviceMetadata, Role};
use crate::room::{Room, RoomCounts};
use crate::shared::HubError;

/// Inbound message types, as carried in the `type` tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum MessageType {
    DeviceRegistration,
    ClientRegistration,
    ControlData,
    CreateRoom,
    JoinRoom,
    LeaveRoom,
    GameCommand,
    Pong,
}

impl MessageType {
    /// Whether a connection in `role` may send this message type
    pub fn permits(self, role: Role) -> bool {
        match self {
            MessageType::DeviceRegistration => matches!(role, Role::Unregistered | Role::Device),
            MessageType::ClientRegistration => matches!(role, Role::Unregistered | Role::Client),
            MessageType::ControlData => role == Role::Device,
            MessageType::CreateRoom | MessageType::GameCommand => role == Role::Client,
            MessageType::JoinRoom | MessageType::LeaveRoom => {
                matches!(role, Role::Device | Role::Client)
            }
            MessageType::Pong => true,
        }
    }

    /// Error text sent back when `permits` fails
    pub fn denial_reason(self) -> &'static str {
        match self {
            MessageType::DeviceRegistration => "Connection already registered as a client",
            MessageType::ClientRegistration => "Connection already registered as a device",
            MessageType::ControlData => "Only devices can send control data",
            MessageType::CreateRoom => "Only clients can create rooms",
            MessageType::GameCommand => "Only clients can send game commands",
            MessageType::JoinRoom | MessageType::LeaveRoom => "Register before joining a room",
            MessageType::Pong => "Not permitted",
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    message_type: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRegistration {
    pub device_id: String,
    #[serde(flatten)]
    pub metadata: DeviceMetadata,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRegistration {
    pub client_id: String,
    #[serde(flatten)]
    pub metadata: ClientMetadata,
}

/// One sample of controller input
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlData {
    /// Raw potentiometer reading
    pub steering: i64,
    pub normalized_steering: f64,
    pub button: bool,
    /// Device-side timestamp, forwarded untouched
    pub timestamp: i64,
}

/// Decoded inbound frame
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    DeviceRegistration(DeviceRegistration),
    ClientRegistration(ClientRegistration),
    ControlData(ControlData),
    #[serde(rename_all = "camelCase")]
    CreateRoom {
        #[serde(default)]
        room_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    JoinRoom { room_id: String },
    #[serde(rename_all = "camelCase")]
    LeaveRoom { room_id: String },
    GameCommand {
        command: String,
        #[serde(default)]
        data: Option<serde_json::Value>,
    },
    #[serde(rename_all = "camelCase")]
    Pong {
        #[serde(default)]
        client_id: Option<String>,
        #[serde(default)]
        device_id: Option<String>,
    },
}

impl InboundMessage {
    /// Reads only the `type` tag of a frame
    pub fn peek_type(frame: &str) -> Result<MessageType, HubError> {
        let envelope: Envelope = serde_json::from_str(frame)
            .map_err(|e| HubError::MalformedMessage(e.to_string()))?;
        MessageType::from_str(&envelope.message_type)
            .map_err(|_| HubError::UnknownMessageType(envelope.message_type))
    }

    /// Decodes a full frame whose type is already known to be valid
    pub fn decode(frame: &str) -> Result<Self, HubError> {
        serde_json::from_str(frame).map_err(|e| HubError::MalformedMessage(e.to_string()))
    }
}

/// Device details announced to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub device_id: String,
    pub device_type: String,
    pub capabilities: serde_json::Value,
}

/// Every event the hub sends to a peer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundEvent {
    #[serde(rename_all = "camelCase")]
    ConnectionEstablished { client_id: String, timestamp: i64 },
    #[serde(rename_all = "camelCase")]
    RegistrationSuccess {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        device_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        available_devices: Option<Vec<String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    DeviceConnected { device: DeviceInfo },
    #[serde(rename_all = "camelCase")]
    DeviceDisconnected { device_id: String },
    #[serde(rename_all = "camelCase")]
    RoomCreated { room_id: String, room: Room },
    #[serde(rename_all = "camelCase")]
    RoomJoined { room_id: String, room: RoomCounts },
    #[serde(rename_all = "camelCase")]
    RoomLeft { room_id: String },
    #[serde(rename_all = "camelCase")]
    ControlUpdate {
        device_id: String,
        steering: i64,
        normalized_steering: f64,
        button: bool,
        timestamp: i64,
    },
    GameFeedback {
        command: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
        timestamp: i64,
    },
    Ping { timestamp: i64 },
    Error { error: String, timestamp: i64 },
}

/// Helper functions for creating events
impl OutboundEvent {
    pub fn connection_established(connection_id: &str, now: DateTime<Utc>) -> Self {
        Self::ConnectionEstablished {
            client_id: connection_id.to_string(),
            timestamp: now.timestamp_millis(),
        }
    }

    pub fn device_registered(device_id: &str) -> Self {
        Self::RegistrationSuccess {
            device_id: Some(device_id.to_string()),
            client_id: None,
            available_devices: None,
            message: Some("Device registered successfully".to_string()),
        }
    }

    pub fn client_registered(client_id: &str, available_devices: Vec<String>) -> Self {
        Self::RegistrationSuccess {
            device_id: None,
            client_id: Some(client_id.to_string()),
            available_devices: Some(available_devices),
            message: None,
        }
    }

    pub fn device_connected(device_id: &str, metadata: &DeviceMetadata) -> Self {
        Self::DeviceConnected {
            device: DeviceInfo {
                device_id: device_id.to_string(),
                device_type: metadata.device_type.clone(),
                capabilities: metadata.capabilities.clone(),
            },
        }
    }

    pub fn device_disconnected(device_id: &str) -> Self {
        Self::DeviceDisconnected {
            device_id: device_id.to_string(),
        }
    }

    pub fn room_created(room: &Room) -> Self {
        Self::RoomCreated {
            room_id: room.room_id.clone(),
            room: room.clone(),
        }
    }

    pub fn room_joined(room: &Room) -> Self {
        Self::RoomJoined {
            room_id: room.room_id.clone(),
            room: room.counts(),
        }
    }

    pub fn control_update(device_id: &str, control: &ControlData) -> Self {
        Self::ControlUpdate {
            device_id: device_id.to_string(),
            steering: control.steering,
            normalized_steering: control.normalized_steering,
            button: control.button,
            timestamp: control.timestamp,
        }
    }

    pub fn game_feedback(
        command: String,
        data: Option<serde_json::Value>,
        now: DateTime<Utc>,
    ) -> Self {
        Self::GameFeedback {
            command,
            data,
            timestamp: now.timestamp_millis(),
        }
    }

    pub fn ping(now: DateTime<Utc>) -> Self {
        Self::Ping {
            timestamp: now.timestamp_millis(),
        }
    }

    pub fn error(error: &HubError, now: DateTime<Utc>) -> Self {
        Self::Error {
            error: error.to_string(),
            timestamp: now.timestamp_millis(),
        }
    }
}
