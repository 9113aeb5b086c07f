use axum::{extract::State, Json};
use tracing::{info, instrument};

use super::types::RoomSummary;
use crate::shared::AppState;

/// HTTP handler for listing all rooms
///
/// GET /api/rooms
/// Returns membership counts, not identities
#[instrument(name = "list_rooms", skip(state))]
pub async fn list_rooms(State(state): State<AppState>) -> Json<Vec<RoomSummary>> {
    let hub = state.hub.lock().await;
    let rooms: Vec<RoomSummary> = hub.rooms().list().into_iter().map(Into::into).collect();

    info!(room_count = rooms.len(), "Rooms listed successfully");

    Json(rooms)
}
