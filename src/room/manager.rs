use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

use super::models::Room;
use crate::connection::Role;
use crate::shared::HubError;

/// Owns every room and its membership.
///
/// Rooms are kept ordered by id so lookups by member always scan in the same
/// order. Each identity is a member of at most one room: creating or joining a
/// room first removes the identity from wherever it was.
#[derive(Debug, Default)]
pub struct RoomManager {
    rooms: BTreeMap<String, Room>,
}

impl RoomManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a room owned by `creator_client_id`.
    ///
    /// A missing or empty `requested_id` gets a generated one. A requested id
    /// that is already taken is rejected and the existing room is untouched.
    #[instrument(skip(self, now))]
    pub fn create_room(
        &mut self,
        requested_id: Option<&str>,
        creator_client_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Room, HubError> {
        let room_id = match requested_id.filter(|id| !id.is_empty()) {
            Some(id) if self.rooms.contains_key(id) => {
                debug!(room_id = %id, "Requested room id already in use");
                return Err(HubError::RoomAlreadyExists(id.to_string()));
            }
            Some(id) => id.to_string(),
            None => self.generate_unique_id(),
        };

        self.remove_identity(creator_client_id, Role::Client);

        let room = Room::new(room_id.clone(), creator_client_id.to_string(), now);
        self.rooms.insert(room_id.clone(), room.clone());

        info!(room_id = %room_id, created_by = %creator_client_id, "Room created");
        Ok(room)
    }

    fn generate_unique_id(&self) -> String {
        loop {
            let candidate = Room::generate_id();
            if !self.rooms.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    /// Adds `identity` to the room's players (clients) or devices (devices).
    ///
    /// Joining a room the identity is already in is a no-op; joining a
    /// different room moves it. Fails without mutating anything if the room
    /// does not exist.
    #[instrument(skip(self))]
    pub fn join_room(
        &mut self,
        room_id: &str,
        identity: &str,
        role: Role,
    ) -> Result<Room, HubError> {
        if role == Role::Unregistered {
            return Err(HubError::Unauthorized(
                "Register before joining a room".to_string(),
            ));
        }
        if !self.rooms.contains_key(room_id) {
            debug!(room_id = %room_id, "Room not found");
            return Err(HubError::RoomNotFound(room_id.to_string()));
        }

        self.remove_identity_except(identity, role, Some(room_id));

        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| HubError::RoomNotFound(room_id.to_string()))?;
        match role {
            Role::Client => room.add_player(identity),
            Role::Device => room.add_device(identity),
            Role::Unregistered => {}
        }

        info!(
            room_id = %room_id,
            identity = %identity,
            role = %role,
            players = room.players.len(),
            devices = room.devices.len(),
            "Joined room"
        );
        Ok(room.clone())
    }

    /// Removes `identity` from one room; returns the room, or `None` if
    /// leaving emptied and deleted it
    #[instrument(skip(self))]
    pub fn leave_room(
        &mut self,
        room_id: &str,
        identity: &str,
        role: Role,
    ) -> Result<Option<Room>, HubError> {
        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| HubError::RoomNotFound(room_id.to_string()))?;

        let removed = match role {
            Role::Client => room.remove_player(identity),
            Role::Device => room.remove_device(identity),
            Role::Unregistered => false,
        };
        if !removed {
            return Err(HubError::NotInRoom);
        }

        if room.is_empty() {
            self.rooms.remove(room_id);
            info!(room_id = %room_id, "Room deleted (empty)");
            return Ok(None);
        }

        info!(room_id = %room_id, identity = %identity, role = %role, "Left room");
        Ok(Some(room.clone()))
    }

    /// First room, in id order, whose devices contain `device_id`
    pub fn find_room_by_device(&self, device_id: &str) -> Option<&Room> {
        self.rooms.values().find(|room| room.has_device(device_id))
    }

    /// First room, in id order, whose players contain `client_id`
    pub fn find_room_by_client(&self, client_id: &str) -> Option<&Room> {
        self.rooms.values().find(|room| room.has_player(client_id))
    }

    /// Removes `identity` from every room it is in and deletes rooms left
    /// empty. Returns the ids of deleted rooms.
    pub fn remove_identity(&mut self, identity: &str, role: Role) -> Vec<String> {
        self.remove_identity_except(identity, role, None)
    }

    fn remove_identity_except(
        &mut self,
        identity: &str,
        role: Role,
        keep: Option<&str>,
    ) -> Vec<String> {
        let mut deleted = Vec::new();

        for (room_id, room) in self.rooms.iter_mut() {
            if keep == Some(room_id.as_str()) {
                continue;
            }
            let removed = match role {
                Role::Client => room.remove_player(identity),
                Role::Device => room.remove_device(identity),
                Role::Unregistered => false,
            };
            if removed {
                debug!(room_id = %room_id, identity = %identity, role = %role, "Removed from room");
            }
            if room.is_empty() {
                deleted.push(room_id.clone());
            }
        }

        for room_id in &deleted {
            self.rooms.remove(room_id);
            info!(room_id = %room_id, "Room deleted (empty)");
        }

        deleted
    }

    pub fn get(&self, room_id: &str) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    /// Every room, in id order
    pub fn list(&self) -> Vec<&Room> {
        self.rooms.values().collect()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
