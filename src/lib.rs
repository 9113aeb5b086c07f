// Library crate for the racing relay hub
// This file exposes the public API for integration tests

pub mod config;
pub mod connection;
pub mod hub;
pub mod liveness;
pub mod room;
pub mod routes;
pub mod shared;
pub mod websockets;

// Re-export commonly used types for easier access in tests
pub use config::{HubConfig, LivenessConfig};
pub use connection::{ConnectionId, ConnectionRegistry, Role};
pub use hub::{Delivery, Hub, SharedHub};
pub use liveness::{LivenessHandle, LivenessSupervisor};
pub use room::RoomManager;
pub use routes::app_router;
pub use shared::{AppError, AppState, HubError};
pub use websockets::{
    serve_socket, InboundMessage, MessageHandler, MessageType, OutboundEvent,
    RelayMessageHandler, SocketWrapper,
};
