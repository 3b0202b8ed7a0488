//! Health check endpoint for monitoring and readiness probes

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::routes::ApiState;

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// `ok` when the store answers, `degraded` otherwise
    #[schema(example = "ok")]
    pub status: String,
    #[schema(example = "0.1.0")]
    pub version: String,
}

/// Health check endpoint
///
/// Unauthenticated; returns 503 when the database cannot be reached.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse)
    )
)]
pub async fn health_handler(State(state): State<ApiState>) -> (StatusCode, Json<HealthResponse>) {
    let (status, label) = match crate::storage::check_connection(&state.pool).await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "degraded")
        }
    };
    (status, Json(HealthResponse { status: label.to_string(), version: crate::VERSION.to_string() }))
}
