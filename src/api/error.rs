use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::models::AuthError;
use crate::errors::GatewayError;

/// HTTP-facing wrapper around [`GatewayError`]
#[derive(Debug)]
pub struct ApiError(pub GatewayError);

/// Error body returned by every endpoint
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Machine-readable kind such as `credential_missing`
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ApiError {
    pub fn unauthenticated<S: Into<String>>(msg: S) -> Self {
        ApiError(GatewayError::unauthenticated(msg))
    }

    pub fn bad_request<S: Into<String>>(msg: S) -> Self {
        ApiError(GatewayError::validation(msg))
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let err = self.0;

        // Storage and internal details stay in the logs
        let message = if status.is_server_error() && !is_upstream(&err) {
            tracing::error!(error = %err, kind = err.kind(), "Request failed");
            "Internal server error".to_string()
        } else {
            err.to_string()
        };

        let body = ErrorBody { error: err.kind(), message, hint: err.hint() };
        let mut response = (status, Json(body)).into_response();

        if let GatewayError::RateLimit { retry_after: Some(secs), .. } = &err {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
        }
        response
    }
}

fn is_upstream(err: &GatewayError) -> bool {
    matches!(
        err,
        GatewayError::UpstreamTimeout { .. }
            | GatewayError::UpstreamUnavailable { .. }
            | GatewayError::UpstreamResponseTooLarge { .. }
    )
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        ApiError(err)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError(err.into())
    }
}
