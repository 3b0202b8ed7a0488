//! Identity resolution from request headers.
//!
//! Schemes are tried in a fixed order and the first one present decides:
//!
//! 1. `Authorization: Bearer <jwt>`
//! 2. `X-Api-Key: kr_<id>.<secret>`
//! 3. `X-App-Slug` or `X-App-Id`
//!
//! A credential that is present but invalid ends resolution with an error.
//! It never falls through to a later scheme.

use axum::http::{header::AUTHORIZATION, HeaderMap};
use tracing::{debug, instrument};

use crate::auth::api_keys::ApiKeyService;
use crate::auth::jwt::TokenIssuer;
use crate::auth::models::{AuthError, Identity, IdentityMethod};
use crate::domain::{AppId, TenantId};
use crate::observability::metrics;
use crate::storage::repositories::{AppRepository, TenantRepository};
use crate::storage::DbPool;

pub const API_KEY_HEADER: &str = "x-api-key";
pub const APP_SLUG_HEADER: &str = "x-app-slug";
pub const APP_ID_HEADER: &str = "x-app-id";

#[derive(Clone)]
pub struct IdentityResolver {
    tokens: TokenIssuer,
    api_keys: ApiKeyService,
    tenants: TenantRepository,
    apps: AppRepository,
}

impl IdentityResolver {
    pub fn new(pool: DbPool, tokens: TokenIssuer, api_keys: ApiKeyService) -> Self {
        Self {
            tokens,
            api_keys,
            tenants: TenantRepository::new(pool.clone()),
            apps: AppRepository::new(pool),
        }
    }

    #[instrument(skip_all)]
    pub async fn resolve(&self, headers: &HeaderMap) -> Result<Identity, AuthError> {
        let (method, result) = if let Some(value) = header_str(headers, AUTHORIZATION.as_str())? {
            ("bearer", self.resolve_bearer(value).await)
        } else if let Some(value) = header_str(headers, API_KEY_HEADER)? {
            ("api_key", self.resolve_api_key(value).await)
        } else if let Some(value) = header_str(headers, APP_SLUG_HEADER)? {
            ("app", self.resolve_app_slug(value).await)
        } else if let Some(value) = header_str(headers, APP_ID_HEADER)? {
            ("app", self.resolve_app_id(value).await)
        } else {
            ("none", Err(AuthError::MissingCredential))
        };

        match &result {
            Ok(identity) => {
                metrics::record_authentication(method, true);
                debug!(tenant_id = %identity.tenant_id, method, "Identity resolved");
            }
            Err(err) => {
                metrics::record_authentication(method, false);
                debug!(method, reason = err.reason(), "Identity resolution failed");
            }
        }

        result
    }

    async fn resolve_bearer(&self, value: &str) -> Result<Identity, AuthError> {
        let token = value
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MalformedCredential("authorization header"))?;

        let claims = self.tokens.verify(token)?;
        let tenant_id = TenantId::parse(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

        if self.tenants.find(&tenant_id).await?.is_none() {
            return Err(AuthError::UnknownTenant);
        }

        Ok(Identity::tenant(tenant_id, IdentityMethod::Bearer))
    }

    async fn resolve_api_key(&self, value: &str) -> Result<Identity, AuthError> {
        let record = self.api_keys.authenticate(value).await?;
        Ok(Identity::tenant(record.tenant_id, IdentityMethod::ApiKey))
    }

    async fn resolve_app_slug(&self, slug: &str) -> Result<Identity, AuthError> {
        let app = self.apps.find_by_slug(slug.trim()).await?.ok_or(AuthError::UnknownApp)?;
        Ok(Identity::app(app.tenant_id, app.id))
    }

    async fn resolve_app_id(&self, raw: &str) -> Result<Identity, AuthError> {
        let id = AppId::parse(raw.trim()).map_err(|_| AuthError::MalformedCredential("app id"))?;
        let app = self.apps.find(&id).await?.ok_or(AuthError::UnknownApp)?;
        Ok(Identity::app(app.tenant_id, app.id))
    }
}

/// Header value as text; present-but-unreadable counts as malformed
fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>, AuthError> {
    match headers.get(name) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .map(Some)
            .map_err(|_| AuthError::MalformedCredential("header value")),
    }
}
