use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::config::HubConfig;
use crate::hub::SharedHub;

/// Shared application state handed to every axum handler
#[derive(Clone)]
pub struct AppState {
    pub hub: SharedHub,
    pub config: Arc<HubConfig>,
}

impl AppState {
    pub fn new(hub: SharedHub, config: HubConfig) -> Self {
        Self {
            hub,
            config: Arc::new(config),
        }
    }
}

/// Errors raised while handling a relay frame.
///
/// Every variant is recoverable: the router turns it into an `error` event for
/// the sender and leaves the connection open. The display text is what the
/// peer sees.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HubError {
    #[error("Invalid message: {0}")]
    MalformedMessage(String),

    #[error("Unknown message type")]
    UnknownMessageType(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Room not found")]
    RoomNotFound(String),

    #[error("Room already exists")]
    RoomAlreadyExists(String),

    #[error("Not in a room")]
    NotInRoom,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Io(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("I/O error: {}", e),
            ),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}
