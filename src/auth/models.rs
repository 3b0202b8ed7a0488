//! Identity types produced by the resolver.

use crate::domain::{AppId, TenantId};
use crate::errors::GatewayError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use utoipa::ToSchema;

/// Scheme that produced an identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IdentityMethod {
    Bearer,
    ApiKey,
    App,
}

impl IdentityMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityMethod::Bearer => "bearer",
            IdentityMethod::ApiKey => "api_key",
            IdentityMethod::App => "app",
        }
    }
}

impl fmt::Display for IdentityMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The resolved caller. Inserted into request extensions by the auth middleware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub tenant_id: TenantId,
    pub app_id: Option<AppId>,
    pub method: IdentityMethod,
}

impl Identity {
    pub fn tenant(tenant_id: TenantId, method: IdentityMethod) -> Self {
        Self { tenant_id, app_id: None, method }
    }

    pub fn app(tenant_id: TenantId, app_id: AppId) -> Self {
        Self { tenant_id, app_id: Some(app_id), method: IdentityMethod::App }
    }
}

/// Errors returned by identity resolution.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("unauthenticated: no credential presented")]
    MissingCredential,
    #[error("unauthenticated: malformed {0}")]
    MalformedCredential(&'static str),
    #[error("unauthenticated: invalid or expired bearer token")]
    InvalidToken,
    #[error("unauthenticated: tenant no longer exists")]
    UnknownTenant,
    #[error("unauthenticated: api key not recognised")]
    InvalidApiKey,
    #[error("unauthenticated: api key revoked")]
    RevokedApiKey,
    #[error("unauthenticated: app not found")]
    UnknownApp,
    #[error(transparent)]
    Persistence(#[from] GatewayError),
}

impl AuthError {
    /// Short label used for metrics
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::MissingCredential => "missing",
            AuthError::MalformedCredential(_) => "malformed",
            AuthError::InvalidToken => "invalid_token",
            AuthError::UnknownTenant => "unknown_tenant",
            AuthError::InvalidApiKey => "invalid_api_key",
            AuthError::RevokedApiKey => "revoked",
            AuthError::UnknownApp => "unknown_app",
            AuthError::Persistence(_) => "error",
        }
    }
}

impl From<AuthError> for GatewayError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Persistence(inner) => inner,
            other => GatewayError::unauthenticated(other.to_string()),
        }
    }
}
