//! Usage history of the calling tenant

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::api::{error::ApiError, routes::ApiState, util::require_tenant};
use crate::auth::models::Identity;
use crate::storage::repositories::UsageRecord;

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct UsageQuery {
    /// Clamped to 1..=500
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

#[utoipa::path(
    get,
    path = "/api/v1/usage",
    params(UsageQuery),
    responses((status = 200, description = "Recent usage and audit records, newest first", body = [UsageRecord])),
    security(("bearerAuth" = []), ("apiKey" = [])),
    tag = "usage"
)]
pub async fn list_usage_handler(
    State(state): State<ApiState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<UsageQuery>,
) -> Result<Json<Vec<UsageRecord>>, ApiError> {
    let tenant_id = require_tenant(&identity)?;
    Ok(Json(state.usage.recent(tenant_id, query.limit).await?))
}
