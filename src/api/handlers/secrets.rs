//! Secret management handlers.
//!
//! Responses never include a secret value; listings carry a masked placeholder.

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
use crate::auth::models::Identity;
use crate::errors::GatewayError;
use crate::vault::{MaskedSecret, StoredSecret};

#[derive(Deserialize, Validate, ToSchema)]
pub struct CreateSecretRequest {
    /// Normalized to uppercase with `_` separators, e.g. `OPENAI_API_KEY`
    #[validate(length(min = 1, max = 64, message = "Secret name must be 1-64 characters"))]
    #[schema(example = "OPENAI_API_KEY")]
    pub name: String,
    #[validate(length(min = 1, message = "Secret value cannot be empty"))]
    pub value: String,
}

impl std::fmt::Debug for CreateSecretRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateSecretRequest")
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

impl Drop for CreateSecretRequest {
    fn drop(&mut self) {
        zeroize::Zeroize::zeroize(&mut self.value);
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeletedResponse {
    pub name: String,
    pub deleted: bool,
}

#[utoipa::path(
    post,
    path = "/api/v1/secrets",
    request_body = CreateSecretRequest,
    responses(
        (status = 201, description = "Secret stored", body = StoredSecret),
        (status = 400, description = "Validation error", body = crate::api::error::ErrorBody),
        (status = 403, description = "Plan secret quota reached", body = crate::api::error::ErrorBody),
        (status = 409, description = "Secret already exists", body = crate::api::error::ErrorBody)
    ),
    security(("bearerAuth" = []), ("apiKey" = [])),
    tag = "secrets"
)]
#[instrument(skip(state, identity, payload), fields(tenant_id = %identity.tenant_id, secret_name = %payload.name))]
pub async fn create_secret_handler(
    State(state): State<ApiState>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<CreateSecretRequest>,
) -> Result<(StatusCode, Json<StoredSecret>), ApiError> {
    payload.validate().map_err(GatewayError::from)?;
    let tenant_id = require_tenant(&identity)?;

    let stored = state.vault.store(tenant_id, &payload.name, &payload.value).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

#[utoipa::path(
    get,
    path = "/api/v1/secrets",
    responses(
        (status = 200, description = "Secret names with masked values", body = [MaskedSecret])
    ),
    security(("bearerAuth" = []), ("apiKey" = [])),
    tag = "secrets"
)]
pub async fn list_secrets_handler(
    State(state): State<ApiState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<MaskedSecret>>, ApiError> {
    let tenant_id = require_tenant(&identity)?;
    Ok(Json(state.vault.list(tenant_id).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/secrets/{name}",
    params(("name" = String, Path, description = "Secret name")),
    responses(
        (status = 200, description = "Secret deleted", body = DeletedResponse),
        (status = 404, description = "Secret not found", body = crate::api::error::ErrorBody)
    ),
    security(("bearerAuth" = []), ("apiKey" = [])),
    tag = "secrets"
)]
#[instrument(skip(state, identity), fields(tenant_id = %identity.tenant_id))]
pub async fn delete_secret_handler(
    State(state): State<ApiState>,
    Extension(identity): Extension<Identity>,
    Path(name): Path<String>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let tenant_id = require_tenant(&identity)?;
    state.vault.delete(tenant_id, &name).await?;
    Ok(Json(DeletedResponse { name, deleted: true }))
}
