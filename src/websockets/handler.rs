use async_trait::async_trait;
use axum::{
    extract::{ConnectInfo, State, WebSocketUpgrade},
    response::Response,
};
use chrono::Utc;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::connection::{ConnectionId, Transport};
use crate::hub::SharedHub;
use crate::shared::AppState;

use super::socket::{MessageHandler, SocketSession, SocketWrapper};

/// Routes frames received on a socket through the shared hub
pub struct RelayMessageHandler {
    hub: SharedHub,
}

impl RelayMessageHandler {
    pub fn new(hub: SharedHub) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl MessageHandler for RelayMessageHandler {
    async fn handle_message(&self, connection_id: &ConnectionId, message: String) {
        debug!(
            connection_id = %connection_id,
            message = %message,
            "Received message"
        );

        let mut hub = self.hub.lock().await;
        let deliveries = hub.route_frame(connection_id, &message, Utc::now());
        hub.dispatch(deliveries);
    }
}

/// WebSocket endpoint every device and client connects to
///
/// GET /racing
#[instrument(name = "websocket_handler", skip(ws, state))]
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    info!(remote_addr = %remote_addr, "WebSocket connection requested");

    ws.on_upgrade(move |socket| async move {
        serve_socket(Box::new(socket), state.hub).await;
    })
}

/// Drives one accepted socket from greeting to cleanup.
///
/// Returns the id the connection had once the socket is closed and the
/// hub has been cleaned up.
pub async fn serve_socket(socket: Box<dyn SocketWrapper>, hub: SharedHub) -> ConnectionId {
    // Outbound channel (hub -> peer); the registry owns the only sender
    let (outbound_sender, outbound_receiver) = mpsc::unbounded_channel::<String>();

    let connection_id = {
        let mut hub = hub.lock().await;
        let (connection_id, deliveries) = hub.accept(Transport::new(outbound_sender), Utc::now());
        hub.dispatch(deliveries);
        connection_id
    };

    info!(connection_id = %connection_id, "WebSocket connection established");

    let message_handler = Arc::new(RelayMessageHandler::new(hub.clone()));
    let session = SocketSession::new(
        connection_id.clone(),
        socket,
        outbound_receiver,
        message_handler,
    );

    match session.run().await {
        Ok(()) => {
            info!(connection_id = %connection_id, "WebSocket connection closed cleanly");
        }
        Err(e) => {
            warn!(
                connection_id = %connection_id,
                error = %e,
                "WebSocket transport failure"
            );
        }
    }

    // Same cleanup path the liveness sweep uses
    let mut hub = hub.lock().await;
    let deliveries = hub.disconnect(&connection_id);
    hub.dispatch(deliveries);

    connection_id
}
