use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn};

use super::{Delivery, Hub};
use crate::connection::{ConnectionId, Role};
use crate::shared::HubError;
use crate::websockets::{
    ClientRegistration, ControlData, DeviceRegistration, InboundMessage, OutboundEvent,
};

impl Hub {
    /// Handles one inbound frame from `id`.
    ///
    /// Any frame, even an invalid one, counts as liveness. Rejected frames
    /// produce a single `error` event for the sender and change nothing else.
    #[instrument(skip(self, id, frame, now), fields(connection_id = %id))]
    pub fn route_frame(
        &mut self,
        id: &ConnectionId,
        frame: &str,
        now: DateTime<Utc>,
    ) -> Vec<Delivery> {
        if !self.registry.touch(id, now) {
            debug!("Frame from unknown connection dropped");
            return Vec::new();
        }

        match self.route(id, frame, now) {
            Ok(deliveries) => deliveries,
            Err(error) => {
                warn!(error = %error, detail = ?error, "Rejected inbound message");
                vec![Delivery::new(id.clone(), OutboundEvent::error(&error, now))]
            }
        }
    }

    fn route(
        &mut self,
        id: &ConnectionId,
        frame: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Delivery>, HubError> {
        let message_type = InboundMessage::peek_type(frame)?;
        let role = self
            .registry
            .get(id)
            .map(|connection| connection.role)
            .unwrap_or(Role::Unregistered);

        if !message_type.permits(role) {
            return Err(HubError::Unauthorized(
                message_type.denial_reason().to_string(),
            ));
        }

        debug!(message_type = %message_type, role = %role, "Received message");

        match InboundMessage::decode(frame)? {
            InboundMessage::DeviceRegistration(registration) => {
                self.handle_device_registration(id, registration, now)
            }
            InboundMessage::ClientRegistration(registration) => {
                self.handle_client_registration(id, registration, now)
            }
            InboundMessage::ControlData(control) => self.handle_control_data(id, &control),
            InboundMessage::CreateRoom { room_id } => {
                self.handle_create_room(id, room_id.as_deref(), now)
            }
            InboundMessage::JoinRoom { room_id } => self.handle_join_room(id, &room_id),
            InboundMessage::LeaveRoom { room_id } => self.handle_leave_room(id, &room_id),
            InboundMessage::GameCommand { command, data } => {
                self.handle_game_command(id, command, data, now)
            }
            // Liveness was already recorded by `touch`
            InboundMessage::Pong { .. } => Ok(Vec::new()),
        }
    }

    /// Role and identity of a registered connection
    fn identity_of(&self, id: &ConnectionId) -> Result<(Role, String), HubError> {
        self.registry
            .get(id)
            .and_then(|connection| {
                connection
                    .identity
                    .clone()
                    .map(|identity| (connection.role, identity))
            })
            .ok_or_else(|| HubError::Unauthorized("Connection is not registered".to_string()))
    }

    fn handle_device_registration(
        &mut self,
        id: &ConnectionId,
        registration: DeviceRegistration,
        now: DateTime<Utc>,
    ) -> Result<Vec<Delivery>, HubError> {
        let DeviceRegistration {
            device_id,
            metadata,
        } = registration;

        let outcome = self
            .registry
            .register_device(id, &device_id, metadata.clone(), now)?;

        let mut deliveries = Vec::new();
        if let Some(previous) = outcome.previous_identity {
            self.rooms.remove_identity(&previous, Role::Device);
            deliveries.extend(self.to_all_clients(&OutboundEvent::device_disconnected(&previous)));
        }

        deliveries.push(Delivery::new(
            id.clone(),
            OutboundEvent::device_registered(&device_id),
        ));
        deliveries.extend(
            self.to_all_clients(&OutboundEvent::device_connected(&device_id, &metadata)),
        );

        Ok(deliveries)
    }

    fn handle_client_registration(
        &mut self,
        id: &ConnectionId,
        registration: ClientRegistration,
        now: DateTime<Utc>,
    ) -> Result<Vec<Delivery>, HubError> {
        let ClientRegistration {
            client_id,
            metadata,
        } = registration;

        let (outcome, available_devices) =
            self.registry
                .register_client(id, &client_id, metadata, now)?;

        if let Some(previous) = outcome.previous_identity {
            self.rooms.remove_identity(&previous, Role::Client);
        }

        Ok(vec![Delivery::new(
            id.clone(),
            OutboundEvent::client_registered(&client_id, available_devices),
        )])
    }

    /// Forwards controller input to the clients in the device's room.
    /// A device that has not joined a room yet is not an error; the input is dropped.
    fn handle_control_data(
        &self,
        id: &ConnectionId,
        control: &ControlData,
    ) -> Result<Vec<Delivery>, HubError> {
        let (_, device_id) = self.identity_of(id)?;

        let Some(room) = self.rooms.find_room_by_device(&device_id) else {
            debug!(device_id = %device_id, "Device not in a room, dropping control data");
            return Ok(Vec::new());
        };

        let event = OutboundEvent::control_update(&device_id, control);
        Ok(room
            .players
            .iter()
            .filter_map(|client_id| self.registry.lookup_by_client_id(client_id))
            .filter(|connection| connection.is_open())
            .map(|connection| Delivery::new(connection.id.clone(), event.clone()))
            .collect())
    }

    /// Forwards a client's command to the devices in its room
    fn handle_game_command(
        &self,
        id: &ConnectionId,
        command: String,
        data: Option<serde_json::Value>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Delivery>, HubError> {
        let (_, client_id) = self.identity_of(id)?;

        let room = self
            .rooms
            .find_room_by_client(&client_id)
            .ok_or(HubError::NotInRoom)?;

        let event = OutboundEvent::game_feedback(command, data, now);
        Ok(room
            .devices
            .iter()
            .filter_map(|device_id| self.registry.lookup_by_device_id(device_id))
            .filter(|connection| connection.is_open())
            .map(|connection| Delivery::new(connection.id.clone(), event.clone()))
            .collect())
    }

    fn handle_create_room(
        &mut self,
        id: &ConnectionId,
        requested_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Delivery>, HubError> {
        let (_, client_id) = self.identity_of(id)?;
        let room = self.rooms.create_room(requested_id, &client_id, now)?;

        Ok(vec![Delivery::new(
            id.clone(),
            OutboundEvent::room_created(&room),
        )])
    }

    fn handle_join_room(
        &mut self,
        id: &ConnectionId,
        room_id: &str,
    ) -> Result<Vec<Delivery>, HubError> {
        let (role, identity) = self.identity_of(id)?;
        let room = self.rooms.join_room(room_id, &identity, role)?;

        Ok(vec![Delivery::new(
            id.clone(),
            OutboundEvent::room_joined(&room),
        )])
    }

    fn handle_leave_room(
        &mut self,
        id: &ConnectionId,
        room_id: &str,
    ) -> Result<Vec<Delivery>, HubError> {
        let (role, identity) = self.identity_of(id)?;
        self.rooms.leave_room(room_id, &identity, role)?;

        Ok(vec![Delivery::new(
            id.clone(),
            OutboundEvent::RoomLeft {
                room_id: room_id.to_string(),
            },
        )])
    }
}
