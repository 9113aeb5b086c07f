use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::shared::AppState;

/// Device entry returned by the inspection API
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSummary {
    pub device_id: String,
    pub device_type: String,
    pub connected: bool,
    /// Unix epoch milliseconds of the last inbound frame
    pub last_seen: i64,
}

/// HTTP handler listing registered devices
///
/// GET /api/devices
#[instrument(name = "list_devices", skip(state))]
pub async fn list_devices(State(state): State<AppState>) -> Json<Vec<DeviceSummary>> {
    let hub = state.hub.lock().await;
    let devices: Vec<DeviceSummary> = hub
        .registry()
        .devices()
        .into_iter()
        .filter_map(|connection| {
            Some(DeviceSummary {
                device_id: connection.identity.clone()?,
                device_type: connection.device_metadata()?.device_type.clone(),
                connected: connection.is_open(),
                last_seen: connection.last_seen.timestamp_millis(),
            })
        })
        .collect();

    info!(device_count = devices.len(), "Devices listed");

    Json(devices)
}
