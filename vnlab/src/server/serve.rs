//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::options::ServerOptions;
use crate::app::state::AppState;
use crate::errors::LabError;
use crate::server::handlers::{
    build_handler, deployments_handler, destroy_handler, details_handler, health_handler,
    hosts_handler, ipv4_handler, networks_handler, restart_handler, start_handler, stop_handler,
    version_handler,
};

/// All REST routes over the shared application state
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health and version
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        // Build and lifecycle
        .route("/build", put(build_handler))
        .route("/start/{resource}/{name}", post(start_handler))
        .route("/stop/{resource}/{name}", post(stop_handler))
        .route("/restart/{resource}/{name}", post(restart_handler))
        .route("/destroy/{resource}/{name}", post(destroy_handler))
        // Listings and details
        .route("/hosts", get(hosts_handler))
        .route("/networks", get(networks_handler))
        .route("/deployments", get(deployments_handler))
        .route("/details/{host}", get(details_handler))
        .route("/details/{host}/ipv4", get(ipv4_handler))
        // State and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server
pub async fn serve(
    options: &ServerOptions,
    state: Arc<AppState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), LabError>>, LabError> {
    let app = router(state);

    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| LabError::Server(format!("failed to bind {}: {}", addr, e)))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| LabError::Server(e.to_string()))
    });

    Ok(handle)
}
