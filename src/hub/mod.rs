//! The relay hub: the one owner of connection and room state.
//!
//! Every mutation (an inbound frame, a disconnect, a liveness tick) is a
//! method on [`Hub`] that returns the [`Delivery`] list it produced. The async
//! shell holds the hub behind a single mutex for the duration of one such call
//! and then dispatches the deliveries, so state changes never interleave.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::connection::{ConnectionId, ConnectionRegistry, Role, Transport};
use crate::room::RoomManager;
use crate::websockets::OutboundEvent;

mod router;

pub type SharedHub = Arc<Mutex<Hub>>;

/// An event addressed to one connection
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub to: ConnectionId,
    pub event: OutboundEvent,
}

impl Delivery {
    pub fn new(to: ConnectionId, event: OutboundEvent) -> Self {
        Self { to, event }
    }
}

#[derive(Debug, Default)]
pub struct Hub {
    registry: ConnectionRegistry,
    rooms: RoomManager,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_shared(self) -> SharedHub {
        Arc::new(Mutex::new(self))
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn rooms(&self) -> &RoomManager {
        &self.rooms
    }

    /// Tracks a new transport session and greets it with `connection_established`
    pub fn accept(
        &mut self,
        transport: Transport,
        now: DateTime<Utc>,
    ) -> (ConnectionId, Vec<Delivery>) {
        let id = self.registry.accept(transport, now);
        let welcome = Delivery::new(
            id.clone(),
            OutboundEvent::connection_established(id.as_str(), now),
        );
        (id, vec![welcome])
    }

    /// Full cleanup for a connection that closed, failed or went stale.
    ///
    /// Unregisters it, drops its identity from every room (deleting rooms left
    /// empty) and, for devices, tells every client the device is gone. Calling
    /// this for an already removed connection is a no-op.
    pub fn disconnect(&mut self, id: &ConnectionId) -> Vec<Delivery> {
        let Some(connection) = self.registry.unregister(id) else {
            debug!(connection_id = %id, "Disconnect for unknown connection ignored");
            return Vec::new();
        };

        let mut deliveries = Vec::new();
        if let Some(identity) = &connection.identity {
            let deleted_rooms = self.rooms.remove_identity(identity, connection.role);
            if connection.role == Role::Device {
                deliveries.extend(self.to_all_clients(&OutboundEvent::device_disconnected(identity)));
            }
            info!(
                connection_id = %id,
                role = %connection.role,
                identity = %identity,
                deleted_rooms = deleted_rooms.len(),
                "Connection disconnected"
            );
        } else {
            info!(connection_id = %id, "Unregistered connection disconnected");
        }

        deliveries
    }

    /// Writes each delivery to its target's transport, skipping closed or
    /// unknown targets. Returns how many were actually sent.
    pub fn dispatch(&self, deliveries: Vec<Delivery>) -> usize {
        let mut sent = 0;
        for delivery in deliveries {
            match serde_json::to_string(&delivery.event) {
                Ok(frame) => {
                    if self.registry.send(&delivery.to, &frame) {
                        sent += 1;
                    }
                }
                Err(e) => {
                    warn!(connection_id = %delivery.to, error = %e, "Failed to encode event");
                }
            }
        }
        sent
    }

    /// One delivery of `event` per registered client with an open transport
    fn to_all_clients(&self, event: &OutboundEvent) -> Vec<Delivery> {
        self.registry
            .client_connection_ids()
            .into_iter()
            .filter(|id| self.registry.get(id).is_some_and(|c| c.is_open()))
            .map(|id| Delivery::new(id, event.clone()))
            .collect()
    }
}
