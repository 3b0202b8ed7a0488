//! # Configuration Management
//!
//! Environment-driven configuration for the gateway. Every section validates
//! itself through `validator` before the server starts.

pub mod settings;

pub use settings::{
    AppConfig, AuthConfig, DatabaseConfig, ForwardingConfig, ObservabilityConfig,
    RateLimitConfig, ServerConfig, VaultConfig,
};
