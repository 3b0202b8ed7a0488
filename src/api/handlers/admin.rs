//! Operator endpoints guarded by the admin token.
//!
//! These mint tenants and credentials and manage feature flags. The admin
//! token is separate from tenant credentials and never resolves to an identity.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

use crate::api::{error::ApiError, routes::ApiState};
use crate::auth::{IssuedApiKey, IssuedToken};
use crate::domain::{ApiKeyId, PlanTier, TenantId};
use crate::errors::GatewayError;
use crate::policy::{FeatureFlag, FeatureOverride, FlagDefinition, OverrideDefinition};
use crate::storage::repositories::{ApiKeySummary, TenantData};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateTenantRequest {
    #[validate(length(min = 1, max = 100, message = "Tenant name must be 1-100 characters"))]
    #[schema(example = "Acme Inc")]
    pub name: String,
    #[serde(default)]
    pub plan: PlanTier,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetPlanRequest {
    pub plan: PlanTier,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct IssueApiKeyRequest {
    #[validate(length(min = 1, max = 100, message = "Key name must be 1-100 characters"))]
    #[schema(example = "production")]
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RemovedResponse {
    pub removed: bool,
}

fn parse_tenant_id(raw: &str) -> Result<TenantId, ApiError> {
    TenantId::parse(raw).map_err(|_| ApiError::bad_request(format!("'{}' is not a valid tenant id", raw)))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/tenants",
    request_body = CreateTenantRequest,
    responses(
        (status = 201, description = "Tenant created", body = TenantData),
        (status = 401, description = "Admin token required", body = crate::api::error::ErrorBody)
    ),
    security(("adminToken" = [])),
    tag = "admin"
)]
#[instrument(skip(state, payload), fields(tenant_name = %payload.name))]
pub async fn create_tenant_handler(
    State(state): State<ApiState>,
    Json(payload): Json<CreateTenantRequest>,
) -> Result<(StatusCode, Json<TenantData>), ApiError> {
    payload.validate().map_err(GatewayError::from)?;
    let tenant = state.tenants.create(payload.name.trim(), payload.plan).await?;
    state
        .usage
        .record_audit(&tenant.id, "tenant.created", serde_json::json!({ "plan": tenant.plan_tier }))
        .await;
    Ok((StatusCode::CREATED, Json(tenant)))
}

#[utoipa::path(
    put,
    path = "/api/v1/admin/tenants/{id}/plan",
    params(("id" = String, Path, description = "Tenant id")),
    request_body = SetPlanRequest,
    responses(
        (status = 200, description = "Plan updated", body = TenantData),
        (status = 404, description = "Tenant not found", body = crate::api::error::ErrorBody)
    ),
    security(("adminToken" = [])),
    tag = "admin"
)]
#[instrument(skip(state, payload), fields(tenant_id = %id, plan = %payload.plan))]
pub async fn set_plan_handler(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(payload): Json<SetPlanRequest>,
) -> Result<Json<TenantData>, ApiError> {
    let tenant_id = parse_tenant_id(&id)?;
    let tenant = state.tenants.set_plan(&tenant_id, payload.plan).await?;
    state
        .usage
        .record_audit(&tenant_id, "tenant.plan_changed", serde_json::json!({ "plan": payload.plan }))
        .await;
    Ok(Json(tenant))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/tenants/{id}/api-keys",
    params(("id" = String, Path, description = "Tenant id")),
    request_body = IssueApiKeyRequest,
    responses(
        (status = 201, description = "Key issued; the plaintext is shown once", body = IssuedApiKey),
        (status = 404, description = "Tenant not found", body = crate::api::error::ErrorBody)
    ),
    security(("adminToken" = [])),
    tag = "admin"
)]
#[instrument(skip(state, payload), fields(tenant_id = %id))]
pub async fn issue_api_key_handler(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(payload): Json<IssueApiKeyRequest>,
) -> Result<(StatusCode, Json<IssuedApiKey>), ApiError> {
    payload.validate().map_err(GatewayError::from)?;
    let tenant_id = parse_tenant_id(&id)?;
    let issued = state.api_keys.issue(&tenant_id, &payload.name).await?;
    Ok((StatusCode::CREATED, Json(issued)))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/tenants/{id}/api-keys",
    params(("id" = String, Path, description = "Tenant id")),
    responses((status = 200, description = "Key metadata without secrets", body = [ApiKeySummary])),
    security(("adminToken" = [])),
    tag = "admin"
)]
pub async fn list_api_keys_handler(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ApiKeySummary>>, ApiError> {
    let tenant_id = parse_tenant_id(&id)?;
    state.tenants.get(&tenant_id).await?;
    Ok(Json(state.api_keys.list(&tenant_id).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/admin/tenants/{id}/api-keys/{key_id}",
    params(
        ("id" = String, Path, description = "Tenant id"),
        ("key_id" = String, Path, description = "API key id")
    ),
    responses(
        (status = 200, description = "Key revoked", body = RemovedResponse),
        (status = 404, description = "Key not found", body = crate::api::error::ErrorBody)
    ),
    security(("adminToken" = [])),
    tag = "admin"
)]
#[instrument(skip(state), fields(tenant_id = %id, api_key_id = %key_id))]
pub async fn revoke_api_key_handler(
    State(state): State<ApiState>,
    Path((id, key_id)): Path<(String, String)>,
) -> Result<Json<RemovedResponse>, ApiError> {
    let tenant_id = parse_tenant_id(&id)?;
    let key_id = ApiKeyId::parse(&key_id)
        .map_err(|_| ApiError(GatewayError::not_found("api_key", key_id.clone())))?;
    state.api_keys.revoke(&tenant_id, &key_id).await?;
    Ok(Json(RemovedResponse { removed: true }))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/tenants/{id}/tokens",
    params(("id" = String, Path, description = "Tenant id")),
    responses(
        (status = 201, description = "Bearer token issued", body = IssuedToken),
        (status = 404, description = "Tenant not found", body = crate::api::error::ErrorBody)
    ),
    security(("adminToken" = [])),
    tag = "admin"
)]
#[instrument(skip(state), fields(tenant_id = %id))]
pub async fn issue_token_handler(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<IssuedToken>), ApiError> {
    let tenant_id = parse_tenant_id(&id)?;
    state.tenants.get(&tenant_id).await?;
    let issued = state.tokens.issue(&tenant_id)?;
    info!(expires_at = %issued.expires_at, "Issued bearer token");
    Ok((StatusCode::CREATED, Json(issued)))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/flags",
    responses((status = 200, description = "All flag definitions", body = [FeatureFlag])),
    security(("adminToken" = [])),
    tag = "admin"
)]
pub async fn list_flags_handler(State(state): State<ApiState>) -> Result<Json<Vec<FeatureFlag>>, ApiError> {
    Ok(Json(state.policy.list_flags().await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/admin/flags/{name}",
    params(("name" = String, Path, description = "Flag name")),
    request_body = FlagDefinition,
    responses(
        (status = 200, description = "Flag created or replaced", body = FeatureFlag),
        (status = 400, description = "Invalid definition", body = crate::api::error::ErrorBody)
    ),
    security(("adminToken" = [])),
    tag = "admin"
)]
#[instrument(skip(state, definition), fields(flag = %name))]
pub async fn upsert_flag_handler(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Json(definition): Json<FlagDefinition>,
) -> Result<Json<FeatureFlag>, ApiError> {
    Ok(Json(state.policy.upsert_flag(&name, &definition).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/admin/flags/{name}/overrides/{tenant_id}",
    params(
        ("name" = String, Path, description = "Flag name"),
        ("tenant_id" = String, Path, description = "Tenant id")
    ),
    request_body = OverrideDefinition,
    responses(
        (status = 200, description = "Override set", body = FeatureOverride),
        (status = 404, description = "Flag or tenant not found", body = crate::api::error::ErrorBody)
    ),
    security(("adminToken" = [])),
    tag = "admin"
)]
#[instrument(skip(state, definition), fields(flag = %name, tenant_id = %tenant_id))]
pub async fn set_override_handler(
    State(state): State<ApiState>,
    Path((name, tenant_id)): Path<(String, String)>,
    Json(definition): Json<OverrideDefinition>,
) -> Result<Json<FeatureOverride>, ApiError> {
    let tenant_id = parse_tenant_id(&tenant_id)?;
    let ov = state.policy.set_override(&name, &tenant_id, &definition).await?;
    state
        .usage
        .record_audit(
            &tenant_id,
            "feature_override.set",
            serde_json::json!({ "flag": name, "enabled": definition.enabled }),
        )
        .await;
    Ok(Json(ov))
}

#[utoipa::path(
    delete,
    path = "/api/v1/admin/flags/{name}/overrides/{tenant_id}",
    params(
        ("name" = String, Path, description = "Flag name"),
        ("tenant_id" = String, Path, description = "Tenant id")
    ),
    responses(
        (status = 200, description = "Override removed", body = RemovedResponse),
        (status = 404, description = "No override for this tenant", body = crate::api::error::ErrorBody)
    ),
    security(("adminToken" = [])),
    tag = "admin"
)]
#[instrument(skip(state), fields(flag = %name, tenant_id = %tenant_id))]
pub async fn clear_override_handler(
    State(state): State<ApiState>,
    Path((name, tenant_id)): Path<(String, String)>,
) -> Result<Json<RemovedResponse>, ApiError> {
    let tenant_id = parse_tenant_id(&tenant_id)?;
    state.policy.clear_override(&name, &tenant_id).await?;
    state
        .usage
        .record_audit(&tenant_id, "feature_override.cleared", serde_json::json!({ "flag": name }))
        .await;
    Ok(Json(RemovedResponse { removed: true }))
}
