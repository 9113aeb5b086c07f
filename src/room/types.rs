use serde::{Deserialize, Serialize};

use super::models::{Room, RoomStatus};

/// Room entry returned by the inspection API
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub room_id: String,
    pub players: usize,
    pub devices: usize,
    pub status: RoomStatus,
}

impl From<&Room> for RoomSummary {
    fn from(room: &Room) -> Self {
        Self {
            room_id: room.room_id.clone(),
            players: room.players.len(),
            devices: room.devices.len(),
            status: room.status,
        }
    }
}
