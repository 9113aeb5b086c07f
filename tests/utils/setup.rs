use tokio::sync::mpsc;

use chrono::Utc;
use racing_relay::{
    connection::Transport, ConnectionId, Hub, RelayMessageHandler, SharedHub,
};

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

/// A hub driven through the same message handler the WebSocket sessions use
pub struct TestRelay {
    pub hub: SharedHub,
    pub handler: RelayMessageHandler,
}

/// One connected peer: its id and everything the hub has sent it
pub struct TestPeer {
    pub id: ConnectionId,
    pub outbox: mpsc::UnboundedReceiver<String>,
}

impl TestRelay {
    pub fn new() -> Self {
        let hub = Hub::new().into_shared();
        Self {
            handler: RelayMessageHandler::new(hub.clone()),
            hub,
        }
    }

    /// Opens a new connection; the welcome frame stays in the peer's outbox
    pub async fn connect(&self) -> TestPeer {
        let (sender, outbox) = mpsc::unbounded_channel();
        let mut hub = self.hub.lock().await;
        let (id, deliveries) = hub.accept(Transport::new(sender), Utc::now());
        hub.dispatch(deliveries);
        TestPeer { id, outbox }
    }
}

impl TestPeer {
    /// Every frame received so far, decoded as JSON
    pub fn drain(&mut self) -> Vec<serde_json::Value> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.outbox.try_recv() {
            frames.push(serde_json::from_str(&frame).unwrap());
        }
        frames
    }
}
