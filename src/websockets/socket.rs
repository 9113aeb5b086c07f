use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::StreamExt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::trace;

use crate::connection::ConnectionId;

/// Text-frame transport between the hub and one device or client.
///
/// Implemented for axum's `WebSocket`; tests substitute a scripted socket.
#[async_trait]
pub trait SocketWrapper: Send {
    async fn send_message(&mut self, message: String) -> Result<(), SocketError>;

    /// Next JSON frame from the peer; `None` once the peer has gone away
    async fn receive_message(&mut self) -> Result<Option<String>, SocketError>;

    async fn close(&mut self) -> Result<(), SocketError>;
}

/// Consumer of inbound relay frames
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle_message(&self, connection_id: &ConnectionId, message: String);
}

#[derive(Debug, Error)]
pub enum SocketError {
    #[error("send failed: {0}")]
    SendFailed(String),
    #[error("receive failed: {0}")]
    ReceiveFailed(String),
}

#[async_trait]
impl SocketWrapper for WebSocket {
    async fn send_message(&mut self, message: String) -> Result<(), SocketError> {
        self.send(Message::Text(message))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }

    async fn receive_message(&mut self) -> Result<Option<String>, SocketError> {
        while let Some(frame) = self.next().await {
            match frame.map_err(|e| SocketError::ReceiveFailed(e.to_string()))? {
                Message::Text(text) => return Ok(Some(text)),
                Message::Close(_) => return Ok(None),
                // Relay traffic is JSON text only
                other => trace!(frame = ?other, "Ignoring non-text frame"),
            }
        }
        Ok(None)
    }

    async fn close(&mut self) -> Result<(), SocketError> {
        self.send(Message::Close(None))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }
}

/// Why a session's pump loop stopped
enum SessionEnd {
    PeerClosed,
    /// The registry released this connection (eviction or replacement)
    Released,
}

/// Pumps frames for one accepted connection.
///
/// Inbound frames are handled to completion before the next is read, which
/// keeps each connection's frames in arrival order. Outbound frames come from
/// the channel whose sender lives in the connection registry.
pub struct SocketSession {
    pub connection_id: ConnectionId,
    socket: Box<dyn SocketWrapper>,
    outbound_receiver: mpsc::UnboundedReceiver<String>,
    message_handler: Arc<dyn MessageHandler>,
}

impl SocketSession {
    pub fn new(
        connection_id: ConnectionId,
        socket: Box<dyn SocketWrapper>,
        outbound_receiver: mpsc::UnboundedReceiver<String>,
        message_handler: Arc<dyn MessageHandler>,
    ) -> Self {
        Self {
            connection_id,
            socket,
            outbound_receiver,
            message_handler,
        }
    }

    /// Runs until the peer closes, the registry releases the connection, or
    /// the transport fails. The socket is closed on the first two.
    pub async fn run(mut self) -> Result<(), SocketError> {
        let end = self.pump().await?;
        trace!(
            connection_id = %self.connection_id,
            released = matches!(end, SessionEnd::Released),
            "Session pump stopped"
        );
        // The peer may already be gone
        let _ = self.socket.close().await;
        Ok(())
    }

    async fn pump(&mut self) -> Result<SessionEnd, SocketError> {
        loop {
            tokio::select! {
                outbound = self.outbound_receiver.recv() => match outbound {
                    Some(frame) => self.socket.send_message(frame).await?,
                    None => return Ok(SessionEnd::Released),
                },
                inbound = self.socket.receive_message() => match inbound? {
                    Some(frame) => {
                        self.message_handler
                            .handle_message(&self.connection_id, frame)
                            .await
                    }
                    None => return Ok(SessionEnd::PeerClosed),
                },
            }
        }
    }
}
