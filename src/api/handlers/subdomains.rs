//! Subdomain claim, release and availability handlers

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Path, State},
    http::HeaderMap,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::ToSchema;

use crate::api::{
    error::ApiError,
    routes::ApiState,
    util::{client_ip, require_tenant},
};
use crate::auth::models::Identity;
use crate::domain::AppId;
use crate::storage::repositories::SubdomainClaim;
use crate::subdomain::Availability;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClaimSubdomainRequest {
    #[schema(example = "my-chat")]
    pub subdomain: String,
    pub app_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReleasedResponse {
    pub subdomain: String,
    pub released: bool,
}

#[utoipa::path(
    get,
    path = "/api/v1/subdomains/{subdomain}/availability",
    params(("subdomain" = String, Path, description = "Candidate subdomain")),
    responses(
        (status = 200, description = "Availability of the name", body = Availability),
        (status = 429, description = "Too many checks from this address", body = crate::api::error::ErrorBody)
    ),
    tag = "subdomains"
)]
#[instrument(skip(state, headers, connect_info))]
pub async fn availability_handler(
    State(state): State<ApiState>,
    Path(subdomain): Path<String>,
    headers: HeaderMap,
    connect_info: Option<Extension<ConnectInfo<SocketAddr>>>,
) -> Result<Json<Availability>, ApiError> {
    let ip = client_ip(
        &headers,
        connect_info.map(|Extension(ConnectInfo(addr))| addr),
        state.config.rate_limits.trusted_proxy_depth,
    );
    state.availability_limiter.check(&ip).await?;

    Ok(Json(state.arbiter.check_availability(&subdomain).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/subdomains",
    request_body = ClaimSubdomainRequest,
    responses(
        (status = 200, description = "Subdomain claimed", body = SubdomainClaim),
        (status = 400, description = "Invalid or reserved name", body = crate::api::error::ErrorBody),
        (status = 403, description = "Short names need a higher plan", body = crate::api::error::ErrorBody),
        (status = 404, description = "App not found", body = crate::api::error::ErrorBody),
        (status = 409, description = "Name taken or app already has a subdomain", body = crate::api::error::ErrorBody),
        (status = 429, description = "Claim rate exceeded", body = crate::api::error::ErrorBody)
    ),
    security(("bearerAuth" = []), ("apiKey" = [])),
    tag = "subdomains"
)]
#[instrument(skip(state, identity), fields(tenant_id = %identity.tenant_id, subdomain = %payload.subdomain))]
pub async fn claim_subdomain_handler(
    State(state): State<ApiState>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<ClaimSubdomainRequest>,
) -> Result<Json<SubdomainClaim>, ApiError> {
    let tenant_id = require_tenant(&identity)?;
    let app_id = AppId::parse(&payload.app_id)
        .map_err(|_| ApiError::bad_request("appId must be a valid app id"))?;

    state.claim_limiter.check(tenant_id.as_str()).await?;

    let claim = state.arbiter.claim(tenant_id, &payload.subdomain, &app_id).await?;
    Ok(Json(claim))
}

#[utoipa::path(
    delete,
    path = "/api/v1/subdomains/{subdomain}",
    params(("subdomain" = String, Path, description = "Claimed subdomain")),
    responses(
        (status = 200, description = "Claim released", body = ReleasedResponse),
        (status = 404, description = "No such claim for this tenant", body = crate::api::error::ErrorBody)
    ),
    security(("bearerAuth" = []), ("apiKey" = [])),
    tag = "subdomains"
)]
#[instrument(skip(state, identity), fields(tenant_id = %identity.tenant_id))]
pub async fn release_subdomain_handler(
    State(state): State<ApiState>,
    Extension(identity): Extension<Identity>,
    Path(subdomain): Path<String>,
) -> Result<Json<ReleasedResponse>, ApiError> {
    let tenant_id = require_tenant(&identity)?;
    state.arbiter.release(tenant_id, &subdomain).await?;
    Ok(Json(ReleasedResponse { subdomain: subdomain.to_ascii_lowercase(), released: true }))
}

#[utoipa::path(
    get,
    path = "/api/v1/subdomains",
    responses((status = 200, description = "Claims held by the tenant", body = [SubdomainClaim])),
    security(("bearerAuth" = []), ("apiKey" = [])),
    tag = "subdomains"
)]
pub async fn list_subdomains_handler(
    State(state): State<ApiState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<SubdomainClaim>>, ApiError> {
    let tenant_id = require_tenant(&identity)?;
    Ok(Json(state.arbiter.list(tenant_id).await?))
}
