// Public API - what other modules can use
pub use handlers::list_devices;
pub use models::{
    ClientMetadata, Connection, ConnectionId, ConnectionMetadata, DeviceMetadata, Role, Transport,
};
pub use registry::{ConnectionRegistry, RegistrationOutcome};

// Internal modules
pub mod handlers;
mod models;
mod registry;
