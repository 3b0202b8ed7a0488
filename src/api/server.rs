use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::errors::{GatewayError, Result};

use super::routes::{build_router, ApiState};

/// Bind, serve until Ctrl-C or SIGTERM, then drain in-flight requests
pub async fn start_api_server(state: ApiState) -> Result<()> {
    let addr: SocketAddr = state
        .config
        .server
        .bind_address()
        .parse()
        .map_err(|e| GatewayError::config(format!("Invalid API address: {}", e)))?;

    let sweepers = state.spawn_background_tasks();
    let router: Router = build_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| GatewayError::internal(format!("Failed to bind API server on {}: {}", addr, e)))?;

    info!(address = %addr, "Starting HTTP API server");

    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| GatewayError::internal(format!("API server error: {}", e)))?;

    for handle in sweepers {
        handle.abort();
    }

    info!("API server shutdown completed");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "API server shutdown listener failed");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
