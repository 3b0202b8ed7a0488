//! # Metrics Collection
//!
//! Gateway metrics through the `metrics` facade. Without an installed
//! recorder every call is a no-op, so tests and `--no-default-features`
//! builds pay nothing.

use crate::config::ObservabilityConfig;
use crate::errors::Result;
use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};

/// Record a completed forwarding invocation
pub fn record_proxy_request(target: &str, status: u16, duration_seconds: f64) {
    let labels = [("target", target.to_string()), ("status", status.to_string())];
    counter!("keyrelay_proxy_requests_total", &labels).increment(1);

    let duration_labels = [("target", target.to_string())];
    histogram!("keyrelay_proxy_duration_seconds", &duration_labels).record(duration_seconds);
}

/// Record an identity resolution outcome (`bearer`, `api_key`, `app`, `none`)
pub fn record_authentication(method: &str, success: bool) {
    let labels = [
        ("method", method.to_string()),
        ("status", if success { "success" } else { "failure" }.to_string()),
    ];
    counter!("keyrelay_authentications_total", &labels).increment(1);
}

/// Record a subdomain claim attempt by outcome kind
pub fn record_subdomain_claim(outcome: &str) {
    let labels = [("outcome", outcome.to_string())];
    counter!("keyrelay_subdomain_claims_total", &labels).increment(1);
}

/// Record a rejected request from a fixed-window limiter
pub fn record_rate_limited(scope: &str) {
    let labels = [("scope", scope.to_string())];
    counter!("keyrelay_rate_limited_total", &labels).increment(1);
}

/// Record a flag evaluation by the step that produced it
pub fn record_flag_evaluation(flag: &str, source: &str, enabled: bool) {
    let labels = [
        ("flag", flag.to_string()),
        ("source", source.to_string()),
        ("enabled", enabled.to_string()),
    ];
    counter!("keyrelay_flag_evaluations_total", &labels).increment(1);
}

/// Record a failed usage write (the request itself still succeeds)
pub fn record_usage_write_failure() {
    counter!("keyrelay_usage_write_failures_total").increment(1);
}

fn describe_metrics() {
    describe_counter!("keyrelay_proxy_requests_total", "Forwarded requests by target and status");
    describe_histogram!(
        "keyrelay_proxy_duration_seconds",
        Unit::Seconds,
        "Time from invocation to upstream response headers"
    );
    describe_counter!("keyrelay_authentications_total", "Identity resolution outcomes");
    describe_counter!("keyrelay_subdomain_claims_total", "Subdomain claim outcomes");
    describe_counter!("keyrelay_rate_limited_total", "Requests rejected by rate limits");
    describe_counter!("keyrelay_flag_evaluations_total", "Feature flag evaluations");
    describe_counter!("keyrelay_usage_write_failures_total", "Usage records that failed to persist");
}

/// Install the Prometheus exporter on the configured port
#[cfg(feature = "prometheus")]
pub fn init_metrics(config: &ObservabilityConfig) -> Result<()> {
    use crate::errors::GatewayError;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::net::SocketAddr;

    if !config.enable_metrics {
        return Ok(());
    }

    let socket_addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    PrometheusBuilder::new()
        .with_http_listener(socket_addr)
        .add_global_label("service", "keyrelay")
        .install()
        .map_err(|e| GatewayError::config(format!("Failed to initialize metrics exporter: {}", e)))?;

    describe_metrics();
    tracing::info!(metrics_addr = %socket_addr, "Metrics collection initialized");
    Ok(())
}

#[cfg(not(feature = "prometheus"))]
pub fn init_metrics(config: &ObservabilityConfig) -> Result<()> {
    if config.enable_metrics {
        tracing::warn!("Metrics requested but the prometheus feature is disabled");
    }
    describe_metrics();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_proxy_request("openai", 200, 0.12);
        record_authentication("api_key", true);
        record_subdomain_claim("conflict");
        record_rate_limited("claims");
        record_flag_evaluation("short_subdomains", "plan_tier", false);
        record_usage_write_failure();
    }

    #[test]
    fn test_disabled_metrics_skip_exporter() {
        let config = ObservabilityConfig { enable_metrics: false, ..Default::default() };
        assert!(init_metrics(&config).is_ok());
    }
}
