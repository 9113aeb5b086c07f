use racing_relay::{app_router, AppError, AppState, Hub, HubConfig, LivenessSupervisor};
use std::net::SocketAddr;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "racing_relay=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting racing relay hub");

    let config = HubConfig::from_env();
    let hub = Hub::new().into_shared();

    let liveness = LivenessSupervisor::new(hub.clone(), config.liveness.clone()).start();

    let bind_address = config.bind_address();
    let ws_path = config.ws_path.clone();
    let app = app_router(AppState::new(hub, config));

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!(
        address = %bind_address,
        ws_path = %ws_path,
        "Relay listening"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    liveness.abort();
    info!("Relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
