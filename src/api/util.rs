//! Shared utility functions for API handlers.

use std::net::SocketAddr;

use axum::http::HeaderMap;

use crate::api::error::ApiError;
use crate::auth::models::{Identity, IdentityMethod};
use crate::domain::TenantId;
use crate::errors::GatewayError;

/// Caller address used to key public rate limits.
///
/// With `trusted_proxy_depth = 0` only the peer address counts. Otherwise the
/// nth-from-last `X-Forwarded-For` entry is used, since that is the one the
/// outermost trusted proxy appended.
pub(crate) fn client_ip(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trusted_proxy_depth: usize,
) -> String {
    if trusted_proxy_depth > 0 {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|value| {
                let ips: Vec<&str> =
                    value.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
                let index = ips.len().checked_sub(trusted_proxy_depth)?;
                ips.get(index).map(|ip| ip.to_string())
            });
        if let Some(ip) = forwarded {
            return ip;
        }
    }

    peer.map(|addr| addr.ip().to_string()).unwrap_or_else(|| "unknown".to_string())
}

/// Management endpoints need a tenant credential; an app slug/id is public
/// and only good for proxying and flag lookups.
pub(crate) fn require_tenant(identity: &Identity) -> Result<&TenantId, ApiError> {
    match identity.method {
        IdentityMethod::Bearer | IdentityMethod::ApiKey => Ok(&identity.tenant_id),
        IdentityMethod::App => Err(ApiError(GatewayError::forbidden_with_hint(
            "App credentials cannot manage tenant resources",
            "Authenticate with a bearer token or X-Api-Key",
        ))),
    }
}
