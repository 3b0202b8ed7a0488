//! Axum middleware for identity resolution and the operator admin gate.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Method, Request},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use tracing::{field, info_span, warn, Instrument};

use crate::api::error::ApiError;
use crate::auth::identity::IdentityResolver;

pub type IdentityResolverState = Arc<IdentityResolver>;

/// Resolve the caller and insert its [`crate::auth::models::Identity`] into request extensions.
///
/// `OPTIONS` passes through untouched so CORS preflight works without credentials.
pub async fn authenticate(
    State(resolver): State<IdentityResolverState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if request.method() == Method::OPTIONS {
        return Ok(next.run(request).await);
    }

    let correlation_id = uuid::Uuid::new_v4();
    let span = info_span!(
        "auth_middleware.authenticate",
        http.method = %request.method(),
        http.path = %request.uri().path(),
        auth.tenant_id = field::Empty,
        auth.method = field::Empty,
        correlation_id = %correlation_id
    );

    let resolved = resolver.resolve(request.headers()).instrument(span.clone()).await;

    match resolved {
        Ok(identity) => {
            span.record("auth.tenant_id", field::display(&identity.tenant_id));
            span.record("auth.method", identity.method.as_str());
            request.extensions_mut().insert(identity);
            Ok(next.run(request).await)
        }
        Err(err) => {
            span.in_scope(|| warn!(%correlation_id, error = %err, "authentication failed"));
            Err(ApiError::from(err))
        }
    }
}

/// SHA-256 digest of the configured operator token; `None` disables the admin API
#[derive(Clone)]
pub struct AdminTokenDigest(Option<[u8; 32]>);

impl AdminTokenDigest {
    pub fn new(token: Option<&str>) -> Self {
        Self(token.map(|t| Sha256::digest(t.as_bytes()).into()))
    }

    /// Compare digests so the comparison time does not depend on the token prefix
    fn matches(&self, presented: &str) -> bool {
        match &self.0 {
            Some(expected) => {
                let actual: [u8; 32] = Sha256::digest(presented.as_bytes()).into();
                ring::constant_time::verify_slices_are_equal(expected, &actual).is_ok()
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for AdminTokenDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AdminTokenDigest").field(&self.0.map(|_| "[REDACTED]")).finish()
    }
}

/// Require `Authorization: Bearer <admin token>`
pub async fn require_admin(
    State(digest): State<AdminTokenDigest>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let presented = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .unwrap_or("");

    if presented.is_empty() || !digest.matches(presented) {
        warn!(http.path = %request.uri().path(), "admin authentication failed");
        return Err(ApiError::unauthenticated("Admin token required"));
    }

    Ok(next.run(request).await)
}
