//! Header filtering between caller, gateway and upstream.

use axum::{
    body::Body,
    http::{
        header::{self, HeaderName, HeaderValue},
        HeaderMap, StatusCode,
    },
    response::Response,
};

use crate::errors::{GatewayError, Result};
use crate::forwarding::targets::{AuthStyle, Target};

/// Caller headers copied to the upstream request
const FORWARDED_REQUEST_HEADERS: &[&str] = &[
    "accept",
    "accept-language",
    "content-type",
    "user-agent",
    "idempotency-key",
    "x-request-id",
    "openai-organization",
    "openai-beta",
    "anthropic-beta",
];

/// Upstream headers relayed to the caller
const RELAYED_RESPONSE_HEADERS: &[&str] = &[
    "content-type",
    "cache-control",
    "retry-after",
    "x-request-id",
    "request-id",
    "openai-processing-ms",
];

/// Upstream header prefixes relayed to the caller
const RELAYED_RESPONSE_PREFIXES: &[&str] = &["x-ratelimit-", "anthropic-ratelimit-"];

const STREAMING_CONTENT_TYPES: &[&str] =
    &["text/event-stream", "application/x-ndjson", "application/stream+json"];

const CORS_ALLOW_HEADERS: &str =
    "authorization, content-type, x-api-key, x-app-slug, x-app-id, accept, openai-beta, anthropic-beta";
const CORS_ALLOW_METHODS: &str = "GET, POST, PUT, PATCH, DELETE, OPTIONS";

/// Build the outbound header set: allow-listed caller headers, the target's
/// static headers, then the credential.
pub fn outbound_request_headers(
    inbound: &HeaderMap,
    target: &Target,
    secret: &str,
) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for name in FORWARDED_REQUEST_HEADERS {
        for value in inbound.get_all(*name) {
            headers.append(HeaderName::from_static(*name), value.clone());
        }
    }

    for &(name, value) in target.extra_headers {
        headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
    }

    let (name, raw) = match target.auth {
        AuthStyle::Bearer => (header::AUTHORIZATION, format!("Bearer {}", secret)),
        AuthStyle::Header(name) => (HeaderName::from_static(name), secret.to_string()),
    };
    let mut value = HeaderValue::from_str(&raw).map_err(|_| {
        GatewayError::validation(format!(
            "Secret {} cannot be sent as an HTTP header value",
            target.secret_name
        ))
    })?;
    value.set_sensitive(true);
    headers.insert(name, value);

    Ok(headers)
}

/// Keep only relayable upstream headers
pub fn relayed_response_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in upstream {
        let key = name.as_str();
        if RELAYED_RESPONSE_HEADERS.contains(&key)
            || RELAYED_RESPONSE_PREFIXES.iter().any(|prefix| key.starts_with(prefix))
        {
            headers.append(name.clone(), value.clone());
        }
    }
    headers
}

pub fn is_streaming(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|mime| {
            let mime = mime.trim().to_ascii_lowercase();
            STREAMING_CONTENT_TYPES.contains(&mime.as_str())
        })
        .unwrap_or(false)
}

pub fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers.get(header::CONTENT_LENGTH)?.to_str().ok()?.trim().parse().ok()
}

pub fn apply_cors(headers: &mut HeaderMap) {
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(CORS_ALLOW_METHODS));
    headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(CORS_ALLOW_HEADERS));
    headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"));
}

/// Local answer to a CORS preflight
pub fn preflight_response() -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::NO_CONTENT;
    apply_cors(response.headers_mut());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forwarding::targets::TargetTable;

    fn inbound() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        headers.insert("authorization", HeaderValue::from_static("Bearer caller-token"));
        headers.insert("x-api-key", HeaderValue::from_static("kr_caller"));
        headers.insert("cookie", HeaderValue::from_static("session=1"));
        headers.insert("host", HeaderValue::from_static("gateway.local"));
        headers
    }

    #[test]
    fn caller_credentials_never_forwarded() {
        let table = TargetTable::default();
        let headers =
            outbound_request_headers(&inbound(), table.get("openai").unwrap(), "sk-real").unwrap();
        assert_eq!(headers.get("authorization").unwrap(), "Bearer sk-real");
        assert!(headers.get("x-api-key").is_none());
        assert!(headers.get("cookie").is_none());
        assert!(headers.get("host").is_none());
        assert_eq!(headers.get("content-type").unwrap(), "application/json");
    }

    #[test]
    fn header_auth_style_replaces_caller_key() {
        let table = TargetTable::default();
        let headers =
            outbound_request_headers(&inbound(), table.get("anthropic").unwrap(), "sk-ant").unwrap();
        assert_eq!(headers.get("x-api-key").unwrap(), "sk-ant");
        assert!(headers.get("authorization").is_none());
        assert_eq!(headers.get("anthropic-version").unwrap(), "2023-06-01");
    }

    #[test]
    fn credential_header_is_sensitive() {
        let table = TargetTable::default();
        let headers =
            outbound_request_headers(&HeaderMap::new(), table.get("openai").unwrap(), "sk").unwrap();
        assert!(headers.get("authorization").unwrap().is_sensitive());
    }

    #[test]
    fn response_allowlist() {
        let mut upstream = HeaderMap::new();
        upstream.insert("content-type", HeaderValue::from_static("application/json"));
        upstream.insert("x-ratelimit-remaining-requests", HeaderValue::from_static("99"));
        upstream.insert("set-cookie", HeaderValue::from_static("a=b"));
        upstream.insert("server", HeaderValue::from_static("upstream"));

        let relayed = relayed_response_headers(&upstream);
        assert!(relayed.contains_key("content-type"));
        assert!(relayed.contains_key("x-ratelimit-remaining-requests"));
        assert!(!relayed.contains_key("set-cookie"));
        assert!(!relayed.contains_key("server"));
    }

    #[test]
    fn streaming_detection() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("text/event-stream; charset=utf-8"));
        assert!(is_streaming(&headers));
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        assert!(!is_streaming(&headers));
        assert!(!is_streaming(&HeaderMap::new()));
    }

    #[test]
    fn preflight_has_cors() {
        let response = preflight_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers().get("access-control-allow-origin").unwrap(), "*");
    }
}
