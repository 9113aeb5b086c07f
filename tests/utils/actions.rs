use serde_json::{json, Value};

use racing_relay::MessageHandler;

use super::setup::{TestPeer, TestRelay};

// ============================================================================
// Action Helpers
// ============================================================================

impl TestRelay {
    /// Hands a raw frame to the relay as if `peer`'s socket received it
    pub async fn send(&self, peer: &TestPeer, frame: Value) {
        self.handler
            .handle_message(&peer.id, frame.to_string())
            .await;
    }

    pub async fn send_raw(&self, peer: &TestPeer, frame: &str) {
        self.handler
            .handle_message(&peer.id, frame.to_string())
            .await;
    }

    // ============================================================================
    // Convenience Action Methods
    // ============================================================================

    /// Connects and registers a steering wheel, discarding its own frames
    pub async fn device(&self, device_id: &str) -> TestPeer {
        let mut peer = self.connect().await;
        self.send(
            &peer,
            json!({
                "type": "device_registration",
                "deviceId": device_id,
                "deviceType": "esp32_wheel",
                "capabilities": ["steering", "button"],
                "version": "1.0.0"
            }),
        )
        .await;
        peer.drain();
        peer
    }

    /// Connects and registers a player app, discarding its own frames
    pub async fn client(&self, client_id: &str) -> TestPeer {
        let mut peer = self.connect().await;
        self.send(
            &peer,
            json!({
                "type": "client_registration",
                "clientId": client_id,
                "clientType": "android_app",
                "playerName": client_id
            }),
        )
        .await;
        peer.drain();
        peer
    }

    pub async fn create_room(&self, peer: &TestPeer, room_id: Option<&str>) {
        let frame = match room_id {
            Some(room_id) => json!({"type": "create_room", "roomId": room_id}),
            None => json!({"type": "create_room"}),
        };
        self.send(peer, frame).await;
    }

    pub async fn join_room(&self, peer: &TestPeer, room_id: &str) {
        self.send(peer, json!({"type": "join_room", "roomId": room_id}))
            .await;
    }

    pub async fn steer(&self, peer: &TestPeer, steering: i64, normalized: f64, button: bool) {
        self.send(
            peer,
            json!({
                "type": "control_data",
                "steering": steering,
                "normalizedSteering": normalized,
                "button": button,
                "timestamp": 1_714_564_800_000_i64
            }),
        )
        .await;
    }

    /// Runs the disconnect path for `peer`, as the socket task does on close
    pub async fn disconnect(&self, peer: &TestPeer) {
        let mut hub = self.hub.lock().await;
        let deliveries = hub.disconnect(&peer.id);
        hub.dispatch(deliveries);
    }
}
