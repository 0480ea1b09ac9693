//! HTTP server implementation using Axum.

use crate::handler::{
    handle_crash, handle_dent, handle_health, handle_scratch, handle_surroundings,
    handle_vehicle,
};
use axum::{
    routing::{get, post},
    Router,
};
use msagent_bridge_core::{EventKind, IpcClient};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Behavior switches for the event routes.
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchOptions {
    /// Add `delivered`/`peer_error` to event responses. Status stays 200.
    pub report_delivery: bool,
}

/// Application state shared across handlers. Read-only after start.
pub struct AppState {
    /// Client for the assistant process
    pub client: IpcClient,
    pub options: DispatchOptions,
}

/// Build the router with all bridge routes, CORS and request tracing.
pub fn router(state: Arc<AppState>) -> Router {
    // Game mods call from arbitrary origins
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(EventKind::Health.route(), get(handle_health))
        .route(EventKind::Vehicle.route(), post(handle_vehicle))
        .route(EventKind::Crash.route(), post(handle_crash))
        .route(EventKind::Dent.route(), post(handle_dent))
        .route(EventKind::Scratch.route(), post(handle_scratch))
        .route(EventKind::Surroundings.route(), post(handle_surroundings))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Start the bridge HTTP server.
///
/// Returns the actual address the server is bound to (useful when port=0).
pub async fn start_server(
    client: IpcClient,
    options: DispatchOptions,
    host: &str,
    port: u16,
) -> anyhow::Result<SocketAddr> {
    let state = Arc::new(AppState { client, options });
    let app = router(state);

    // Parse the address
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    // Bind to the address
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("Server listening on {}", actual_addr);

    // Spawn the server in the background
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Server error: {}", e);
        }
    });

    Ok(actual_addr)
}
