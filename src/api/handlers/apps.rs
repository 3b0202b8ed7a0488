//! App lifecycle handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::ToSchema;
use validator::Validate;

use crate::api::{error::ApiError, routes::ApiState, util::require_tenant};
use crate::apps::PublishOutcome;
use crate::auth::models::Identity;
use crate::domain::AppId;
use crate::errors::GatewayError;
use crate::storage::repositories::AppData;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AppNameRequest {
    #[validate(length(min = 1, max = 100, message = "App name must be 1-100 characters"))]
    #[schema(example = "Support Chat")]
    pub name: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct PublishRequest {
    /// Preferred subdomain; defaults to the slugified app name
    #[serde(default)]
    pub subdomain: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeletedAppResponse {
    pub id: AppId,
    pub deleted: bool,
}

fn parse_app_id(raw: &str) -> Result<AppId, ApiError> {
    AppId::parse(raw).map_err(|_| ApiError(GatewayError::not_found("app", raw)))
}

#[utoipa::path(
    post,
    path = "/api/v1/apps",
    request_body = AppNameRequest,
    responses(
        (status = 201, description = "App created", body = AppData),
        (status = 400, description = "Validation error", body = crate::api::error::ErrorBody)
    ),
    security(("bearerAuth" = []), ("apiKey" = [])),
    tag = "apps"
)]
#[instrument(skip(state, identity), fields(tenant_id = %identity.tenant_id))]
pub async fn create_app_handler(
    State(state): State<ApiState>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<AppNameRequest>,
) -> Result<(StatusCode, Json<AppData>), ApiError> {
    payload.validate().map_err(GatewayError::from)?;
    let tenant_id = require_tenant(&identity)?;
    let app = state.apps.create(tenant_id, &payload.name).await?;
    Ok((StatusCode::CREATED, Json(app)))
}

#[utoipa::path(
    get,
    path = "/api/v1/apps",
    responses((status = 200, description = "Apps owned by the tenant", body = [AppData])),
    security(("bearerAuth" = []), ("apiKey" = [])),
    tag = "apps"
)]
pub async fn list_apps_handler(
    State(state): State<ApiState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<AppData>>, ApiError> {
    let tenant_id = require_tenant(&identity)?;
    Ok(Json(state.apps.list(tenant_id).await?))
}

#[utoipa::path(
    patch,
    path = "/api/v1/apps/{id}",
    params(("id" = String, Path, description = "App id")),
    request_body = AppNameRequest,
    responses(
        (status = 200, description = "App renamed; slug is unchanged", body = AppData),
        (status = 404, description = "App not found", body = crate::api::error::ErrorBody)
    ),
    security(("bearerAuth" = []), ("apiKey" = [])),
    tag = "apps"
)]
#[instrument(skip(state, identity, payload), fields(tenant_id = %identity.tenant_id))]
pub async fn rename_app_handler(
    State(state): State<ApiState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    Json(payload): Json<AppNameRequest>,
) -> Result<Json<AppData>, ApiError> {
    payload.validate().map_err(GatewayError::from)?;
    let tenant_id = require_tenant(&identity)?;
    let id = parse_app_id(&id)?;
    Ok(Json(state.apps.rename(tenant_id, &id, &payload.name).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/apps/{id}",
    params(("id" = String, Path, description = "App id")),
    responses(
        (status = 200, description = "App deleted with its subdomain claim", body = DeletedAppResponse),
        (status = 404, description = "App not found", body = crate::api::error::ErrorBody)
    ),
    security(("bearerAuth" = []), ("apiKey" = [])),
    tag = "apps"
)]
#[instrument(skip(state, identity), fields(tenant_id = %identity.tenant_id))]
pub async fn delete_app_handler(
    State(state): State<ApiState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Json<DeletedAppResponse>, ApiError> {
    let tenant_id = require_tenant(&identity)?;
    let id = parse_app_id(&id)?;
    state.apps.delete(tenant_id, &id).await?;
    Ok(Json(DeletedAppResponse { id, deleted: true }))
}

#[utoipa::path(
    post,
    path = "/api/v1/apps/{id}/publish",
    params(("id" = String, Path, description = "App id")),
    request_body = PublishRequest,
    responses(
        (status = 200, description = "Publish result; subdomain is null when every candidate collided", body = PublishOutcome),
        (status = 403, description = "Requested name needs a higher plan", body = crate::api::error::ErrorBody),
        (status = 404, description = "App not found", body = crate::api::error::ErrorBody)
    ),
    security(("bearerAuth" = []), ("apiKey" = [])),
    tag = "apps"
)]
#[instrument(skip(state, identity, payload), fields(tenant_id = %identity.tenant_id))]
pub async fn publish_app_handler(
    State(state): State<ApiState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    payload: Option<Json<PublishRequest>>,
) -> Result<Json<PublishOutcome>, ApiError> {
    let tenant_id = require_tenant(&identity)?;
    let id = parse_app_id(&id)?;
    let Json(payload) = payload.unwrap_or_default();

    state.claim_limiter.check(tenant_id.as_str()).await?;
    let outcome = state.apps.publish(tenant_id, &id, payload.subdomain.as_deref()).await?;
    Ok(Json(outcome))
}
