use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use super::models::{
    ClientMetadata, Connection, ConnectionId, ConnectionMetadata, DeviceMetadata, Role, Transport,
};
use crate::shared::HubError;

/// What changed when a connection registered an identity
#[derive(Debug, Default, PartialEq)]
pub struct RegistrationOutcome {
    /// The identity this connection held before, when re-registering under a new one
    pub previous_identity: Option<String>,
    /// Another connection that held the same identity and has been dropped
    pub replaced: Option<ConnectionId>,
}

/// Tracks every live connection, its role and its identity.
///
/// Device and client identities are indexed separately, each pointing to at
/// most one connection. A later registration of the same identity wins.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, Connection>,
    // deviceId -> connection
    devices: HashMap<String, ConnectionId>,
    // clientId -> connection
    clients: HashMap<String, ConnectionId>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracks a freshly accepted, still unregistered connection
    pub fn accept(&mut self, transport: Transport, now: DateTime<Utc>) -> ConnectionId {
        let id = ConnectionId::generate();
        self.connections
            .insert(id.clone(), Connection::new(id.clone(), transport, now));
        debug!(connection_id = %id, "Connection accepted");
        id
    }

    pub fn register_device(
        &mut self,
        id: &ConnectionId,
        device_id: &str,
        metadata: DeviceMetadata,
        now: DateTime<Utc>,
    ) -> Result<RegistrationOutcome, HubError> {
        self.register(
            id,
            Role::Device,
            device_id,
            ConnectionMetadata::Device(metadata),
            now,
        )
    }

    /// Registers a client and returns the device ids it can currently see
    pub fn register_client(
        &mut self,
        id: &ConnectionId,
        client_id: &str,
        metadata: ClientMetadata,
        now: DateTime<Utc>,
    ) -> Result<(RegistrationOutcome, Vec<String>), HubError> {
        let outcome = self.register(
            id,
            Role::Client,
            client_id,
            ConnectionMetadata::Client(metadata),
            now,
        )?;
        Ok((outcome, self.list_device_ids()))
    }

    fn register(
        &mut self,
        id: &ConnectionId,
        role: Role,
        identity: &str,
        metadata: ConnectionMetadata,
        now: DateTime<Utc>,
    ) -> Result<RegistrationOutcome, HubError> {
        let current = self
            .connections
            .get(id)
            .ok_or_else(|| HubError::Unauthorized("Unknown connection".to_string()))?;

        if current.role != Role::Unregistered && current.role != role {
            return Err(HubError::Unauthorized(format!(
                "Connection already registered as {}",
                current.role
            )));
        }

        let previous_identity = current
            .identity
            .clone()
            .filter(|previous| previous != identity);

        let index = match role {
            Role::Device => &mut self.devices,
            Role::Client => &mut self.clients,
            Role::Unregistered => {
                return Err(HubError::Unauthorized(
                    "Cannot register without a role".to_string(),
                ))
            }
        };

        if let Some(previous) = &previous_identity {
            if index.get(previous) == Some(id) {
                index.remove(previous);
            }
        }

        let replaced = match index.insert(identity.to_string(), id.clone()) {
            Some(other) if &other != id => {
                // Dropping the old record drops its transport, which closes that socket
                self.connections.remove(&other);
                warn!(
                    identity = %identity,
                    role = %role,
                    replaced_connection = %other,
                    connection_id = %id,
                    "Identity re-registered from a new connection, replacing the old one"
                );
                Some(other)
            }
            _ => None,
        };

        if let Some(connection) = self.connections.get_mut(id) {
            connection.role = role;
            connection.identity = Some(identity.to_string());
            connection.metadata = Some(metadata);
            connection.last_seen = now;
        }

        info!(connection_id = %id, role = %role, identity = %identity, "Connection registered");

        Ok(RegistrationOutcome {
            previous_identity,
            replaced,
        })
    }

    /// Records inbound activity; returns false for unknown connections
    pub fn touch(&mut self, id: &ConnectionId, now: DateTime<Utc>) -> bool {
        match self.connections.get_mut(id) {
            Some(connection) => {
                connection.last_seen = now;
                true
            }
            None => false,
        }
    }

    /// Removes a connection regardless of role, releasing its identity
    pub fn unregister(&mut self, id: &ConnectionId) -> Option<Connection> {
        let connection = self.connections.remove(id)?;

        if let Some(identity) = &connection.identity {
            let index = match connection.role {
                Role::Device => Some(&mut self.devices),
                Role::Client => Some(&mut self.clients),
                Role::Unregistered => None,
            };
            if let Some(index) = index {
                if index.get(identity) == Some(id) {
                    index.remove(identity);
                }
            }
        }

        debug!(connection_id = %id, role = %connection.role, "Connection unregistered");
        Some(connection)
    }

    pub fn get(&self, id: &ConnectionId) -> Option<&Connection> {
        self.connections.get(id)
    }

    pub fn lookup_by_device_id(&self, device_id: &str) -> Option<&Connection> {
        self.devices
            .get(device_id)
            .and_then(|id| self.connections.get(id))
    }

    pub fn lookup_by_client_id(&self, client_id: &str) -> Option<&Connection> {
        self.clients
            .get(client_id)
            .and_then(|id| self.connections.get(id))
    }

    /// Snapshot of the currently known device identities, sorted
    pub fn list_device_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.devices.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Registered device connections, sorted by device id
    pub fn devices(&self) -> Vec<&Connection> {
        self.list_device_ids()
            .iter()
            .filter_map(|device_id| self.lookup_by_device_id(device_id))
            .collect()
    }

    pub fn client_connection_ids(&self) -> Vec<ConnectionId> {
        self.clients.values().cloned().collect()
    }

    /// Every connection that has registered as a device or client
    pub fn registered_connection_ids(&self) -> Vec<ConnectionId> {
        self.devices
            .values()
            .chain(self.clients.values())
            .cloned()
            .collect()
    }

    /// Connections whose last inbound activity is strictly before `cutoff`
    pub fn stale_connections(&self, cutoff: DateTime<Utc>) -> Vec<ConnectionId> {
        self.connections
            .values()
            .filter(|connection| connection.last_seen < cutoff)
            .map(|connection| connection.id.clone())
            .collect()
    }

    /// Best-effort send; skipped silently when the target is unknown or closed
    pub fn send(&self, id: &ConnectionId, frame: &str) -> bool {
        match self.connections.get(id) {
            Some(connection) if connection.is_open() => connection.send(frame.to_string()),
            Some(_) => {
                debug!(connection_id = %id, "Skipping send to closed transport");
                false
            }
            None => {
                debug!(connection_id = %id, "Skipping send to unknown connection");
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
