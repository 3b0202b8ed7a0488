//! Forwarding endpoint: `ANY /proxy/{target}/{*path}`

use axum::{
    body::Body,
    extract::{Path, State},
    http::{Method, Request},
    response::{IntoResponse, Response},
};

use crate::api::{error::ApiError, routes::ApiState};
use crate::auth::models::Identity;
use crate::forwarding::headers;

/// Relay a request to a named upstream with the tenant's credential.
///
/// `OPTIONS` is answered here as a CORS preflight and never reaches the upstream.
#[utoipa::path(
    post,
    path = "/proxy/{target}/{path}",
    params(
        ("target" = String, Path, description = "Upstream target, e.g. openai"),
        ("path" = String, Path, description = "Path appended to the target base URL")
    ),
    responses(
        (status = 200, description = "Upstream response relayed as-is"),
        (status = 401, description = "Unauthenticated or credential missing", body = crate::api::error::ErrorBody),
        (status = 404, description = "Unknown target", body = crate::api::error::ErrorBody),
        (status = 413, description = "Request body too large", body = crate::api::error::ErrorBody),
        (status = 502, description = "Upstream unavailable or response too large", body = crate::api::error::ErrorBody),
        (status = 504, description = "Upstream timed out", body = crate::api::error::ErrorBody)
    ),
    security(("bearerAuth" = []), ("apiKey" = []), ("appSlug" = [])),
    tag = "proxy"
)]
pub async fn proxy_handler(
    State(state): State<ApiState>,
    Path((target, path)): Path<(String, String)>,
    request: Request<Body>,
) -> Response {
    if request.method() == Method::OPTIONS {
        return headers::preflight_response();
    }

    let Some(identity) = request.extensions().get::<Identity>().cloned() else {
        return ApiError::unauthenticated("No identity on request").into_response();
    };

    match state.engine.forward(&identity, &target, &path, request).await {
        Ok(response) => response,
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// Add CORS headers to every proxy response, including auth failures
pub async fn add_cors(mut response: Response) -> Response {
    headers::apply_cors(response.headers_mut());
    response
}
