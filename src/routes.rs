use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::connection::list_devices;
use crate::room::list_rooms;
use crate::shared::{AppError, AppState};
use crate::websockets::websocket_handler;

/// Builds the relay's HTTP surface: the WebSocket endpoint plus the
/// read-only inspection routes
pub fn app_router(state: AppState) -> Router {
    let ws_path = state.config.ws_path.clone();

    Router::new()
        .route(&ws_path, get(websocket_handler))
        .route("/api/devices", get(list_devices))
        .route("/api/rooms", get(list_rooms))
        .route("/health", get(health))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn not_found() -> AppError {
    AppError::NotFound("No such route".to_string())
}
