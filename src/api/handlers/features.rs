//! Feature flag lookups for tenants and apps

use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Serialize;
use tracing::instrument;
use utoipa::ToSchema;

use crate::api::{error::ApiError, routes::ApiState};
use crate::auth::models::Identity;
use crate::domain::AppId;
use crate::errors::GatewayError;
use crate::policy::{Evaluation, Facts};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppFeatures {
    pub app_id: AppId,
    pub features: Vec<Evaluation>,
}

/// Evaluate one flag for the caller's tenant.
///
/// Query parameters become rule facts: `?region=eu&seats=12`.
#[utoipa::path(
    get,
    path = "/api/v1/features/{flag}",
    params(("flag" = String, Path, description = "Flag name")),
    responses(
        (status = 200, description = "Evaluation result", body = Evaluation),
        (status = 404, description = "Unknown flag", body = crate::api::error::ErrorBody)
    ),
    security(("bearerAuth" = []), ("apiKey" = []), ("appSlug" = [])),
    tag = "features"
)]
#[instrument(skip(state, identity, params), fields(tenant_id = %identity.tenant_id))]
pub async fn evaluate_feature_handler(
    State(state): State<ApiState>,
    Extension(identity): Extension<Identity>,
    Path(flag): Path<String>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<Json<Evaluation>, ApiError> {
    let facts = Facts::from_pairs(&params);
    Ok(Json(state.policy.evaluate(&flag, &identity.tenant_id, &facts).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/apps/{app_id}/features",
    params(("app_id" = String, Path, description = "App id")),
    responses(
        (status = 200, description = "Every flag evaluated for the app's tenant", body = AppFeatures),
        (status = 404, description = "App not found", body = crate::api::error::ErrorBody)
    ),
    security(("bearerAuth" = []), ("apiKey" = []), ("appSlug" = [])),
    tag = "features"
)]
#[instrument(skip(state, identity), fields(tenant_id = %identity.tenant_id))]
pub async fn app_features_handler(
    State(state): State<ApiState>,
    Extension(identity): Extension<Identity>,
    Path(app_id): Path<String>,
) -> Result<Json<AppFeatures>, ApiError> {
    let app_id = AppId::parse(&app_id)
        .map_err(|_| ApiError(GatewayError::not_found("app", app_id.clone())))?;

    // An app credential only sees its own app
    if identity.app_id.as_ref().is_some_and(|own| own != &app_id) {
        return Err(ApiError(GatewayError::not_found("app", app_id.to_string())));
    }

    let app = state.apps.get(&identity.tenant_id, &app_id).await?;
    let features = state.policy.evaluate_all(&app.tenant_id).await?;
    Ok(Json(AppFeatures { app_id: app.id, features }))
}
