//! # Configuration Settings
//!
//! Defines the configuration structure for the keyrelay gateway.

use crate::errors::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use validator::Validate;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
pub struct AppConfig {
    /// Server configuration
    #[validate(nested)]
    pub server: ServerConfig,

    /// Database configuration
    #[validate(nested)]
    pub database: DatabaseConfig,

    /// Observability configuration
    #[validate(nested)]
    pub observability: ObservabilityConfig,

    /// Authentication configuration
    #[validate(nested)]
    pub auth: AuthConfig,

    /// Upstream forwarding limits
    #[validate(nested)]
    pub forwarding: ForwardingConfig,

    /// Secret vault configuration
    #[validate(nested)]
    pub vault: VaultConfig,

    /// Per-endpoint rate limits
    #[validate(nested)]
    pub rate_limits: RateLimitConfig,
}

impl AppConfig {
    /// Build configuration from `KEYRELAY_*` environment variables and `DATABASE_URL`.
    ///
    /// Callers are expected to have loaded `.env` through `dotenvy` first.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            server: ServerConfig {
                host: env_or("KEYRELAY_HOST", defaults.server.host)?,
                port: env_or("KEYRELAY_PORT", defaults.server.port)?,
            },
            database: DatabaseConfig::from_env()?,
            observability: ObservabilityConfig {
                log_level: env_or("KEYRELAY_LOG_LEVEL", defaults.observability.log_level)?,
                json_logging: env_or("KEYRELAY_LOG_JSON", defaults.observability.json_logging)?,
                enable_metrics: env_or(
                    "KEYRELAY_ENABLE_METRICS",
                    defaults.observability.enable_metrics,
                )?,
                metrics_port: env_or("KEYRELAY_METRICS_PORT", defaults.observability.metrics_port)?,
            },
            auth: AuthConfig {
                jwt_secret: env_or("KEYRELAY_JWT_SECRET", defaults.auth.jwt_secret)?,
                jwt_issuer: env_or("KEYRELAY_JWT_ISSUER", defaults.auth.jwt_issuer)?,
                token_expiry_seconds: env_or(
                    "KEYRELAY_TOKEN_EXPIRY_SECONDS",
                    defaults.auth.token_expiry_seconds,
                )?,
                admin_token: std::env::var("KEYRELAY_ADMIN_TOKEN").ok().filter(|t| !t.is_empty()),
            },
            forwarding: ForwardingConfig {
                max_request_bytes: env_or(
                    "KEYRELAY_MAX_REQUEST_BYTES",
                    defaults.forwarding.max_request_bytes,
                )?,
                max_response_bytes: env_or(
                    "KEYRELAY_MAX_RESPONSE_BYTES",
                    defaults.forwarding.max_response_bytes,
                )?,
                upstream_timeout_seconds: env_or(
                    "KEYRELAY_UPSTREAM_TIMEOUT_SECONDS",
                    defaults.forwarding.upstream_timeout_seconds,
                )?,
            },
            vault: VaultConfig {
                master_key: env_or("KEYRELAY_MASTER_KEY", defaults.vault.master_key)?,
                key_version: env_or("KEYRELAY_MASTER_KEY_VERSION", defaults.vault.key_version)?,
            },
            rate_limits: RateLimitConfig {
                availability_per_minute: env_or(
                    "KEYRELAY_AVAILABILITY_PER_MINUTE",
                    defaults.rate_limits.availability_per_minute,
                )?,
                claims_per_hour: env_or(
                    "KEYRELAY_CLAIMS_PER_HOUR",
                    defaults.rate_limits.claims_per_hour,
                )?,
                sweep_interval_seconds: env_or(
                    "KEYRELAY_RATE_LIMIT_SWEEP_SECONDS",
                    defaults.rate_limits.sweep_interval_seconds,
                )?,
                trusted_proxy_depth: env_or(
                    "KEYRELAY_TRUSTED_PROXY_DEPTH",
                    defaults.rate_limits.trusted_proxy_depth,
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(GatewayError::from)?;
        self.validate_custom()?;
        Ok(())
    }

    /// Cross-section checks the validator derive cannot express
    fn validate_custom(&self) -> Result<()> {
        if self.observability.enable_metrics && self.server.port == self.observability.metrics_port
        {
            return Err(GatewayError::validation("Server and metrics ports cannot be the same"));
        }

        if !self.database.is_sqlite() {
            return Err(GatewayError::validation("Database URL must start with 'sqlite:'"));
        }

        let key_len = self.vault.master_key.trim().len();
        if key_len != 64 || hex::decode(self.vault.master_key.trim()).is_err() {
            return Err(GatewayError::validation(
                "Master key must be 64 hex characters (32 bytes)",
            ));
        }

        if self.forwarding.max_response_bytes < self.forwarding.max_request_bytes {
            return Err(GatewayError::validation(
                "Max response size must not be smaller than max request size",
            ));
        }

        Ok(())
    }
}

/// Read an environment variable and parse it, falling back to `default` when unset
fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| GatewayError::config(format!("Invalid value for {}: {}", key, e))),
        Err(_) => Ok(default),
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    /// Server bind address
    #[validate(length(min = 1, message = "Host cannot be empty"))]
    pub host: String,

    /// Server port
    #[validate(range(min = 1, max = 65535, message = "Port must be between 1 and 65535"))]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 8080 }
    }
}

impl ServerConfig {
    /// Get the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DatabaseConfig {
    /// Database connection URL
    #[validate(length(min = 1, message = "Database URL cannot be empty"))]
    pub url: String,

    /// Maximum number of connections in the pool
    #[validate(range(min = 1, max = 100, message = "Max connections must be between 1 and 100"))]
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[validate(range(min = 1, max = 60, message = "Connect timeout must be between 1 and 60"))]
    pub connect_timeout_seconds: u64,

    /// Idle timeout in seconds (0 = no timeout)
    pub idle_timeout_seconds: u64,

    /// Apply pending migrations on startup
    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://./data/keyrelay.db".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_seconds: 10,
            idle_timeout_seconds: 600,
            auto_migrate: true,
        }
    }
}

impl DatabaseConfig {
    /// Load database settings from `DATABASE_URL` and `KEYRELAY_DB_*`
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            url: env_or("DATABASE_URL", defaults.url)?,
            max_connections: env_or("KEYRELAY_DB_MAX_CONNECTIONS", defaults.max_connections)?,
            min_connections: env_or("KEYRELAY_DB_MIN_CONNECTIONS", defaults.min_connections)?,
            connect_timeout_seconds: env_or(
                "KEYRELAY_DB_CONNECT_TIMEOUT",
                defaults.connect_timeout_seconds,
            )?,
            idle_timeout_seconds: env_or("KEYRELAY_DB_IDLE_TIMEOUT", defaults.idle_timeout_seconds)?,
            auto_migrate: env_or("KEYRELAY_DB_AUTO_MIGRATE", defaults.auto_migrate)?,
        })
    }

    pub fn is_sqlite(&self) -> bool {
        self.url.starts_with("sqlite:")
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Idle timeout, `None` when disabled
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_seconds > 0).then(|| Duration::from_secs(self.idle_timeout_seconds))
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ObservabilityConfig {
    /// Default log filter when `RUST_LOG` is unset
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub log_level: String,

    /// Emit JSON-formatted logs
    pub json_logging: bool,

    /// Serve Prometheus metrics
    pub enable_metrics: bool,

    /// Prometheus listener port
    pub metrics_port: u16,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logging: false,
            enable_metrics: false,
            metrics_port: 9090,
        }
    }
}

/// Authentication configuration
#[derive(Clone, Serialize, Deserialize, Validate)]
pub struct AuthConfig {
    /// HS256 signing secret for bearer tokens
    #[validate(length(min = 32, message = "JWT secret must be at least 32 characters long"))]
    pub jwt_secret: String,

    /// Issuer written into and required from bearer tokens
    #[validate(length(min = 1, message = "JWT issuer cannot be empty"))]
    pub jwt_issuer: String,

    /// Bearer token lifetime in seconds
    #[validate(range(min = 60, message = "Token expiry must be at least 60 seconds"))]
    pub token_expiry_seconds: u64,

    /// Operator token guarding the admin API; admin routes reject everything when unset
    pub admin_token: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "keyrelay-development-signing-secret-change-me".to_string(),
            jwt_issuer: "keyrelay".to_string(),
            token_expiry_seconds: 3600,
            admin_token: None,
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("jwt_issuer", &self.jwt_issuer)
            .field("token_expiry_seconds", &self.token_expiry_seconds)
            .field("admin_token", &self.admin_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl AuthConfig {
    pub fn token_expiry(&self) -> Duration {
        Duration::from_secs(self.token_expiry_seconds)
    }
}

/// Size and time bounds applied to upstream forwarding
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ForwardingConfig {
    /// Largest inbound request body accepted
    #[validate(range(min = 1024, message = "Max request size must be at least 1KB"))]
    pub max_request_bytes: usize,

    /// Largest buffered upstream response relayed
    #[validate(range(min = 1024, message = "Max response size must be at least 1KB"))]
    pub max_response_bytes: usize,

    /// Deadline for upstream response headers (and full body when buffered)
    #[validate(range(min = 1, max = 600, message = "Upstream timeout must be between 1 and 600"))]
    pub upstream_timeout_seconds: u64,
}

impl Default for ForwardingConfig {
    fn default() -> Self {
        Self {
            max_request_bytes: 1024 * 1024,       // 1MB
            max_response_bytes: 10 * 1024 * 1024, // 10MB
            upstream_timeout_seconds: 60,
        }
    }
}

impl ForwardingConfig {
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_seconds)
    }
}

/// Secret vault configuration
#[derive(Clone, Serialize, Deserialize, Validate)]
pub struct VaultConfig {
    /// Hex-encoded 32-byte master key
    #[validate(length(min = 64, max = 64, message = "Master key must be 64 hex characters"))]
    pub master_key: String,

    /// Version tag persisted next to each ciphertext
    #[validate(length(min = 1, message = "Key version cannot be empty"))]
    pub key_version: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            // Development-only key; production deployments set KEYRELAY_MASTER_KEY
            master_key: "42".repeat(32),
            key_version: "v1".to_string(),
        }
    }
}

impl std::fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultConfig")
            .field("master_key", &"[REDACTED]")
            .field("key_version", &self.key_version)
            .finish()
    }
}

/// Fixed-window limits for public and claim endpoints
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RateLimitConfig {
    /// Availability checks per minute per caller IP
    #[validate(range(min = 1, message = "Availability limit must be positive"))]
    pub availability_per_minute: u32,

    /// Subdomain claims per hour per tenant
    #[validate(range(min = 1, message = "Claim limit must be positive"))]
    pub claims_per_hour: u32,

    /// Interval between sweeps of expired windows
    #[validate(range(min = 1, message = "Sweep interval must be positive"))]
    pub sweep_interval_seconds: u64,

    /// Proxies in front of the gateway whose `X-Forwarded-For` entries are trusted.
    /// `0` keys public limits on the peer address only.
    #[validate(range(max = 10, message = "Trusted proxy depth must be at most 10"))]
    pub trusted_proxy_depth: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            availability_per_minute: 10,
            claims_per_hour: 5,
            sweep_interval_seconds: 60,
            trusted_proxy_depth: 0,
        }
    }
}
