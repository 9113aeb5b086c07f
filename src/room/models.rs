use chrono::{DateTime, Utc};
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a room. `Active` is reserved; routing never sets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Waiting,
    Active,
}

/// An ephemeral group of clients and devices whose traffic is routed among its members
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub room_id: String,
    /// clientId of the creator
    pub created_by: String,
    /// clientIds, in join order
    pub players: Vec<String>,
    /// deviceIds, in join order
    pub devices: Vec<String>,
    pub status: RoomStatus,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl Room {
    /// Creates a waiting room whose only member is its creator
    pub fn new(room_id: String, creator_client_id: String, now: DateTime<Utc>) -> Self {
        Self {
            room_id,
            created_by: creator_client_id.clone(),
            players: vec![creator_client_id],
            devices: vec![],
            status: RoomStatus::Waiting,
            created_at: now,
        }
    }

    /// Generates an id of the form `room_XXXXXX`
    pub fn generate_id() -> String {
        let suffix: String = rand::rng()
            .sample_iter(Alphanumeric)
            .take(6)
            .map(|b| char::from(b).to_ascii_uppercase())
            .collect();
        format!("room_{}", suffix)
    }

    pub fn has_player(&self, client_id: &str) -> bool {
        self.players.iter().any(|p| p == client_id)
    }

    pub fn has_device(&self, device_id: &str) -> bool {
        self.devices.iter().any(|d| d == device_id)
    }

    pub fn add_player(&mut self, client_id: &str) {
        if !self.has_player(client_id) {
            self.players.push(client_id.to_string());
        }
    }

    pub fn add_device(&mut self, device_id: &str) {
        if !self.has_device(device_id) {
            self.devices.push(device_id.to_string());
        }
    }

    /// Returns true if the client was a member
    pub fn remove_player(&mut self, client_id: &str) -> bool {
        let before = self.players.len();
        self.players.retain(|p| p != client_id);
        self.players.len() != before
    }

    /// Returns true if the device was a member
    pub fn remove_device(&mut self, device_id: &str) -> bool {
        let before = self.devices.len();
        self.devices.retain(|d| d != device_id);
        self.devices.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty() && self.devices.is_empty()
    }

    pub fn counts(&self) -> RoomCounts {
        RoomCounts {
            players: self.players.len(),
            devices: self.devices.len(),
        }
    }
}

/// Membership counts reported after a join
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomCounts {
    pub players: usize,
    pub devices: usize,
}
