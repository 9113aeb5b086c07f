//! Test assertion helpers - fluent API for verifying what peers received
#![allow(dead_code)] // Test utilities may not all be used in every test

use serde_json::Value;

use super::setup::TestPeer;

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Frames drained from one peer, consumed front to back
pub struct FrameAssertion {
    frames: Vec<Value>,
}

impl FrameAssertion {
    pub fn for_peer(peer: &mut TestPeer) -> Self {
        Self {
            frames: peer.drain(),
        }
    }

    /// Asserts the peer received exactly one frame of `event_type` and returns it
    pub fn received_once(&self, event_type: &str) -> Value {
        let matching = self.of_type(event_type);
        assert_eq!(
            matching.len(),
            1,
            "expected exactly one {event_type}, got {:?}",
            self.frames
        );
        matching[0].clone()
    }

    pub fn received_none(&self, event_type: &str) {
        assert!(
            self.of_type(event_type).is_empty(),
            "unexpected {event_type} in {:?}",
            self.frames
        );
    }

    pub fn received_nothing(&self) {
        assert!(self.frames.is_empty(), "unexpected frames {:?}", self.frames);
    }

    /// Asserts a single `error` frame with the given text
    pub fn received_error(&self, message: &str) {
        let error = self.received_once("error");
        assert_eq!(error["error"], message);
        assert!(error["timestamp"].is_i64());
    }

    pub fn frames(&self) -> &[Value] {
        &self.frames
    }

    fn of_type(&self, event_type: &str) -> Vec<&Value> {
        self.frames
            .iter()
            .filter(|frame| frame["type"] == event_type)
            .collect()
    }
}
