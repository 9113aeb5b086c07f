use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

use racing_relay::{websockets::SocketError, SocketWrapper};

// ============================================================================
// Mock Infrastructure
// ============================================================================

/// Scripted socket: the test pushes inbound frames and reads what the
/// session wrote. Dropping the inbound sender behaves like the peer hanging up.
pub struct MockSocket {
    inbound: mpsc::UnboundedReceiver<String>,
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<Mutex<bool>>,
}

/// Test-side handle to a [`MockSocket`]
pub struct MockPeer {
    inbound: Option<mpsc::UnboundedSender<String>>,
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<Mutex<bool>>,
}

impl MockSocket {
    pub fn new() -> (Self, MockPeer) {
        let (inbound_sender, inbound) = mpsc::unbounded_channel();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(Mutex::new(false));
        (
            Self {
                inbound,
                sent: sent.clone(),
                closed: closed.clone(),
            },
            MockPeer {
                inbound: Some(inbound_sender),
                sent,
                closed,
            },
        )
    }
}

impl MockPeer {
    pub fn send(&self, frame: serde_json::Value) {
        self.inbound
            .as_ref()
            .expect("peer already hung up")
            .send(frame.to_string())
            .unwrap();
    }

    /// Ends the inbound stream, as a peer closing its socket would
    pub fn hang_up(&mut self) {
        self.inbound = None;
    }

    pub async fn sent_frames(&self) -> Vec<serde_json::Value> {
        self.sent
            .lock()
            .await
            .iter()
            .map(|frame| serde_json::from_str(frame).unwrap())
            .collect()
    }

    pub async fn was_closed(&self) -> bool {
        *self.closed.lock().await
    }
}

#[async_trait]
impl SocketWrapper for MockSocket {
    async fn send_message(&mut self, message: String) -> Result<(), SocketError> {
        self.sent.lock().await.push(message);
        Ok(())
    }

    async fn receive_message(&mut self) -> Result<Option<String>, SocketError> {
        Ok(self.inbound.recv().await)
    }

    async fn close(&mut self) -> Result<(), SocketError> {
        *self.closed.lock().await = true;
        Ok(())
    }
}
