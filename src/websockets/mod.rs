// Public API
pub use handler::{serve_socket, websocket_handler, RelayMessageHandler};
pub use messages::{
    ClientRegistration, ControlData, DeviceInfo, DeviceRegistration, InboundMessage, MessageType,
    OutboundEvent,
};
pub use socket::{MessageHandler, SocketError, SocketSession, SocketWrapper};

// Internal modules
mod handler;
mod messages;
mod socket;
