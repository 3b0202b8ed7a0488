//! Outbound forwarding with credential injection.
//!
//! Every call to [`ForwardingEngine::forward`] writes exactly one usage record,
//! whatever the outcome. Streamed responses are recorded once upstream headers
//! arrive; the body is then relayed chunk by chunk.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
    response::Response,
};
use bytes::BytesMut;
use tracing::{debug, instrument, warn};

use crate::auth::models::Identity;
use crate::config::ForwardingConfig;
use crate::errors::{GatewayError, Result};
use crate::forwarding::headers;
use crate::forwarding::targets::{Target, TargetTable};
use crate::usage::{ProxyUsage, UsageRecorder};
use crate::vault::SecretVault;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// What came back from a successful dispatch
struct Forwarded {
    response: Response,
    status: u16,
    streamed: bool,
}

#[derive(Clone)]
pub struct ForwardingEngine {
    targets: Arc<TargetTable>,
    vault: SecretVault,
    usage: UsageRecorder,
    client: reqwest::Client,
    limits: ForwardingConfig,
}

impl ForwardingEngine {
    pub fn new(
        targets: TargetTable,
        vault: SecretVault,
        usage: UsageRecorder,
        limits: ForwardingConfig,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| GatewayError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { targets: Arc::new(targets), vault, usage, client, limits })
    }

    pub fn targets(&self) -> &TargetTable {
        &self.targets
    }

    /// Forward `request` to `target_name` at `path` on behalf of `identity`
    #[instrument(skip(self, identity, request), fields(tenant_id = %identity.tenant_id, target = %target_name, method = %request.method()))]
    pub async fn forward(
        &self,
        identity: &Identity,
        target_name: &str,
        path: &str,
        request: Request<Body>,
    ) -> Result<Response> {
        let started = Instant::now();
        let method = request.method().to_string();
        let known_target = self.targets.get(target_name).map(|t| t.name);

        let outcome = self.dispatch(identity, target_name, path, request).await;

        let (status, streamed, error) = match &outcome {
            Ok(forwarded) => (forwarded.status, forwarded.streamed, None),
            Err(e) => (usage_status(e), false, Some(e.kind())),
        };
        if let Err(e) = &outcome {
            warn!(error = %e, "Forwarding failed");
        }

        self.usage
            .record_proxy(ProxyUsage {
                tenant_id: identity.tenant_id.clone(),
                app_id: identity.app_id.clone(),
                target: known_target.unwrap_or("unknown").to_string(),
                method,
                path: format!("/{}", path.trim_start_matches('/')),
                status,
                duration_ms: started.elapsed().as_millis() as u64,
                streamed,
                error,
            })
            .await;

        outcome.map(|forwarded| forwarded.response)
    }

    async fn dispatch(
        &self,
        identity: &Identity,
        target_name: &str,
        path: &str,
        request: Request<Body>,
    ) -> Result<Forwarded> {
        let target = self
            .targets
            .get(target_name)
            .ok_or_else(|| GatewayError::not_found("target", target_name))?;

        let secret = self
            .vault
            .retrieve(&identity.tenant_id, target.secret_name)
            .await?
            .ok_or_else(|| GatewayError::credential_missing(target.name, target.secret_name))?;

        let (parts, body) = request.into_parts();
        let url = upstream_url(target, path, parts.uri.query())?;

        let max_request = self.limits.max_request_bytes;
        if headers::content_length(&parts.headers).is_some_and(|len| len > max_request as u64) {
            return Err(GatewayError::PayloadTooLarge { limit: max_request });
        }
        let payload = to_bytes(body, max_request)
            .await
            .map_err(|_| GatewayError::PayloadTooLarge { limit: max_request })?;

        let outbound = headers::outbound_request_headers(&parts.headers, target, &secret)?;
        drop(secret);

        let mut builder = self.client.request(parts.method.clone(), url).headers(outbound);
        if !payload.is_empty() || !matches!(parts.method, Method::GET | Method::HEAD) {
            builder = builder.body(payload);
        }

        let deadline = self.limits.upstream_timeout();
        let started = Instant::now();
        let upstream = match tokio::time::timeout(deadline, builder.send()).await {
            Err(_) => return Err(timeout_error(target, deadline)),
            Ok(Err(e)) if e.is_timeout() => return Err(timeout_error(target, deadline)),
            Ok(Err(e)) => {
                return Err(GatewayError::UpstreamUnavailable {
                    target: target.name.to_string(),
                    message: e.without_url().to_string(),
                })
            }
            Ok(Ok(response)) => response,
        };

        let status = upstream.status();
        let relayed = headers::relayed_response_headers(upstream.headers());
        debug!(status = status.as_u16(), "Upstream responded");

        let (body, streamed) = if headers::is_streaming(upstream.headers()) {
            (Body::from_stream(upstream.bytes_stream()), true)
        } else {
            let remaining = deadline.saturating_sub(started.elapsed());
            let bytes = tokio::time::timeout(
                remaining,
                read_limited(upstream, target, self.limits.max_response_bytes),
            )
            .await
            .map_err(|_| timeout_error(target, deadline))??;
            (Body::from(bytes), false)
        };

        let mut response = Response::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = relayed;

        Ok(Forwarded { response, status: status.as_u16(), streamed })
    }
}

/// Usage status: the upstream never answered on timeouts and network failures
fn usage_status(err: &GatewayError) -> u16 {
    match err {
        GatewayError::UpstreamTimeout { .. } | GatewayError::UpstreamUnavailable { .. } => 0,
        other => other.status_code(),
    }
}

fn timeout_error(target: &Target, deadline: Duration) -> GatewayError {
    GatewayError::UpstreamTimeout {
        target: target.name.to_string(),
        duration_ms: deadline.as_millis() as u64,
    }
}

fn upstream_url(target: &Target, path: &str, query: Option<&str>) -> Result<url::Url> {
    let path = path.trim_start_matches('/');
    if path.split('/').any(|segment| segment == ".." || segment == ".") {
        return Err(GatewayError::validation_field("Path must not contain dot segments", "path"));
    }

    let mut raw = format!("{}/{}", target.base_url.trim_end_matches('/'), path);
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        raw.push('?');
        raw.push_str(query);
    }
    url::Url::parse(&raw)
        .map_err(|e| GatewayError::validation_field(format!("Invalid upstream path: {}", e), "path"))
}

async fn read_limited(
    mut upstream: reqwest::Response,
    target: &Target,
    limit: usize,
) -> Result<bytes::Bytes> {
    if upstream.content_length().is_some_and(|len| len > limit as u64) {
        return Err(GatewayError::UpstreamResponseTooLarge { limit });
    }

    let mut buffer = BytesMut::new();
    loop {
        let chunk = upstream.chunk().await.map_err(|e| GatewayError::UpstreamUnavailable {
            target: target.name.to_string(),
            message: e.without_url().to_string(),
        })?;
        let Some(chunk) = chunk else { break };
        if buffer.len() + chunk.len() > limit {
            return Err(GatewayError::UpstreamResponseTooLarge { limit });
        }
        buffer.extend_from_slice(&chunk);
    }
    Ok(buffer.freeze())
}
