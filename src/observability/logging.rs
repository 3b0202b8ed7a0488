//! # Structured Logging
//!
//! Subscriber setup and span macros built on the tracing ecosystem.
//!
//! The filter comes from `RUST_LOG` when set, otherwise from the configured
//! log level. JSON output is selected with `KEYRELAY_LOG_JSON=true`.

use crate::config::{AppConfig, ObservabilityConfig};
use crate::errors::{GatewayError, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Create a tracing span for request tracking.
///
/// ```rust,ignore
/// let span = request_span!("POST", "/proxy/openai/v1/chat/completions", target = "openai");
/// ```
#[macro_export]
macro_rules! request_span {
    ($method:expr, $path:expr) => {
        tracing::info_span!(
            "http_request",
            method = %$method,
            path = %$path,
            request_id = %uuid::Uuid::new_v4(),
            tenant_id = tracing::field::Empty
        )
    };
    ($method:expr, $path:expr, $($field:tt)*) => {
        tracing::info_span!(
            "http_request",
            method = %$method,
            path = %$path,
            request_id = %uuid::Uuid::new_v4(),
            tenant_id = tracing::field::Empty,
            $($field)*
        )
    };
}

/// Create a tracing span around a multi-statement storage operation
#[macro_export]
macro_rules! db_span {
    ($operation:expr) => {
        tracing::debug_span!(
            "db_operation",
            operation = %$operation,
            operation_id = %uuid::Uuid::new_v4()
        )
    };
    ($operation:expr, $($field:tt)*) => {
        tracing::debug_span!(
            "db_operation",
            operation = %$operation,
            operation_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| GatewayError::config(format!("Invalid log filter: {}", e)))?;

    let registry = tracing_subscriber::registry().with(filter);

    let result = if config.json_logging {
        registry
            .with(fmt::layer().json().with_current_span(true).with_span_list(false))
            .try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };

    result.map_err(|e| GatewayError::config(format!("Failed to install tracing subscriber: {}", e)))
}

/// Log configuration at startup
pub fn log_config_info(config: &AppConfig) {
    tracing::info!(
        server_address = %config.server.bind_address(),
        database_url = %config.database.url,
        metrics_enabled = config.observability.enable_metrics,
        admin_api_enabled = config.auth.admin_token.is_some(),
        max_request_bytes = config.forwarding.max_request_bytes,
        max_response_bytes = config.forwarding.max_response_bytes,
        upstream_timeout_seconds = config.forwarding.upstream_timeout_seconds,
        key_version = %config.vault.key_version,
        "keyrelay configuration"
    );
}
