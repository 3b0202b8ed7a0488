//! # Observability Infrastructure
//!
//! Structured logging through `tracing` and metrics through the `metrics`
//! facade with an optional Prometheus exporter.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, log_config_info};
pub use metrics::init_metrics;

use crate::config::ObservabilityConfig;
use crate::errors::Result;

/// Initialize logging and metrics
pub fn init_observability(config: &ObservabilityConfig) -> Result<()> {
    init_logging(config)?;
    init_metrics(config)?;

    tracing::info!(
        log_level = %config.log_level,
        json_logging = config.json_logging,
        metrics_enabled = config.enable_metrics,
        "Observability initialized"
    );

    Ok(())
}
