//! # Error Types
//!
//! Error taxonomy for the keyrelay gateway using `thiserror`.
//!
//! Every variant maps to a machine-readable kind (see [`GatewayError::kind`]),
//! an HTTP status and, where one exists, a human hint telling the caller how
//! to recover (for example which secret to add).

/// Custom result type for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Main error type for the gateway
#[derive(thiserror::Error, Debug)]
pub enum GatewayError {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Database and storage errors
    #[error("Database error: {context}")]
    Database {
        #[source]
        source: sqlx::Error,
        context: String,
    },

    /// I/O errors with additional context
    #[error("I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {context}")]
    Serialization {
        #[source]
        source: serde_json::Error,
        context: String,
    },

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String, field: Option<String> },

    /// No usable identity on the request
    #[error("Unauthenticated: {message}")]
    Unauthenticated { message: String },

    /// The tenant has no secret configured for the target it is calling
    #[error("Credential missing: target '{target}' requires secret '{secret_name}'")]
    CredentialMissing { target: String, secret_name: String },

    /// Ownership or plan-tier gate failed
    #[error("Forbidden: {message}")]
    Forbidden { message: String, hint: Option<String> },

    /// Resource not found errors
    #[error("Resource not found: {resource_type} '{id}'")]
    NotFound { resource_type: String, id: String },

    /// Resource conflict errors (already exists, claim race lost)
    #[error("Resource conflict: {message}")]
    Conflict { message: String, resource_type: String },

    /// Plan quota reached
    #[error("Limit exceeded: {message}")]
    LimitExceeded { message: String, limit: u32 },

    /// Subdomain is on the reserved list
    #[error("Subdomain '{subdomain}' is reserved")]
    Reserved { subdomain: String },

    /// Subdomain fails syntax validation
    #[error("Invalid subdomain '{subdomain}': {reason}")]
    InvalidSubdomain { subdomain: String, reason: String },

    /// Inbound body over the configured limit
    #[error("Request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// Buffered upstream body over the configured limit
    #[error("Upstream response exceeds {limit} bytes")]
    UpstreamResponseTooLarge { limit: usize },

    /// Upstream deadline expired
    #[error("Upstream '{target}' timed out after {duration_ms}ms")]
    UpstreamTimeout { target: String, duration_ms: u64 },

    /// Network-level upstream failure
    #[error("Upstream '{target}' unavailable: {message}")]
    UpstreamUnavailable { target: String, message: String },

    /// Rate limiting errors
    #[error("Rate limit exceeded: {message}")]
    RateLimit { message: String, retry_after: Option<u64> },

    /// Internal server errors
    #[error("Internal server error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl GatewayError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), source: None }
    }

    /// Create a configuration error with source
    pub fn config_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Config { message: message.into(), source: Some(source) }
    }

    /// Wrap a sqlx error with context
    pub fn database<S: Into<String>>(source: sqlx::Error, context: S) -> Self {
        Self::Database { source, context: context.into() }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into(), field: None }
    }

    /// Create a validation error with field information
    pub fn validation_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Validation { message: message.into(), field: Some(field.into()) }
    }

    pub fn unauthenticated<S: Into<String>>(message: S) -> Self {
        Self::Unauthenticated { message: message.into() }
    }

    pub fn credential_missing<T: Into<String>, N: Into<String>>(target: T, secret_name: N) -> Self {
        Self::CredentialMissing { target: target.into(), secret_name: secret_name.into() }
    }

    pub fn forbidden<S: Into<String>>(message: S) -> Self {
        Self::Forbidden { message: message.into(), hint: None }
    }

    pub fn forbidden_with_hint<S: Into<String>, H: Into<String>>(message: S, hint: H) -> Self {
        Self::Forbidden { message: message.into(), hint: Some(hint.into()) }
    }

    /// Create a not found error
    pub fn not_found<R: Into<String>, I: Into<String>>(resource_type: R, id: I) -> Self {
        Self::NotFound { resource_type: resource_type.into(), id: id.into() }
    }

    /// Create a conflict error
    pub fn conflict<M: Into<String>, R: Into<String>>(message: M, resource_type: R) -> Self {
        Self::Conflict { message: message.into(), resource_type: resource_type.into() }
    }

    pub fn limit_exceeded<S: Into<String>>(message: S, limit: u32) -> Self {
        Self::LimitExceeded { message: message.into(), limit }
    }

    /// Create a rate limit error
    pub fn rate_limit<S: Into<String>>(message: S, retry_after: Option<u64>) -> Self {
        Self::RateLimit { message: message.into(), retry_after }
    }

    /// Create an internal server error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into(), source: None }
    }

    /// Add context to an error (used by ErrorContext trait)
    pub(crate) fn add_context(&mut self, context: String) {
        match self {
            GatewayError::Io { context: ref mut ctx, .. }
            | GatewayError::Database { context: ref mut ctx, .. }
            | GatewayError::Serialization { context: ref mut ctx, .. } => {
                *ctx = format!("{}: {}", context, ctx);
            }
            _ => {}
        }
    }

    /// Machine-readable error kind rendered in API responses
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Config { .. } => "config",
            GatewayError::Database { .. } => "database",
            GatewayError::Io { .. } => "internal",
            GatewayError::Serialization { .. } => "validation",
            GatewayError::Validation { .. } => "validation",
            GatewayError::Unauthenticated { .. } => "unauthenticated",
            GatewayError::CredentialMissing { .. } => "credential_missing",
            GatewayError::Forbidden { .. } => "forbidden",
            GatewayError::NotFound { .. } => "not_found",
            GatewayError::Conflict { .. } => "conflict",
            GatewayError::LimitExceeded { .. } => "limit_exceeded",
            GatewayError::Reserved { .. } => "reserved",
            GatewayError::InvalidSubdomain { .. } => "invalid_subdomain",
            GatewayError::PayloadTooLarge { .. } => "payload_too_large",
            GatewayError::UpstreamResponseTooLarge { .. } => "upstream_response_too_large",
            GatewayError::UpstreamTimeout { .. } => "upstream_timeout",
            GatewayError::UpstreamUnavailable { .. } => "upstream_unavailable",
            GatewayError::RateLimit { .. } => "rate_limited",
            GatewayError::Internal { .. } => "internal",
        }
    }

    /// Get the HTTP status code that should be returned for this error
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::Config { .. } => 500,
            GatewayError::Database { .. } => 500,
            GatewayError::Io { .. } => 500,
            GatewayError::Serialization { .. } => 400,
            GatewayError::Validation { .. } => 400,
            GatewayError::Unauthenticated { .. } => 401,
            GatewayError::CredentialMissing { .. } => 401,
            GatewayError::Forbidden { .. } => 403,
            GatewayError::NotFound { .. } => 404,
            GatewayError::Conflict { .. } => 409,
            GatewayError::LimitExceeded { .. } => 403,
            GatewayError::Reserved { .. } => 400,
            GatewayError::InvalidSubdomain { .. } => 400,
            GatewayError::PayloadTooLarge { .. } => 413,
            GatewayError::UpstreamResponseTooLarge { .. } => 502,
            GatewayError::UpstreamTimeout { .. } => 504,
            GatewayError::UpstreamUnavailable { .. } => 502,
            GatewayError::RateLimit { .. } => 429,
            GatewayError::Internal { .. } => 500,
        }
    }

    /// Human hint for recoverable errors
    pub fn hint(&self) -> Option<String> {
        match self {
            GatewayError::CredentialMissing { secret_name, .. } => {
                Some(format!("Add a secret named {} to your account", secret_name))
            }
            GatewayError::Forbidden { hint, .. } => hint.clone(),
            GatewayError::LimitExceeded { limit, .. } => Some(format!(
                "Your plan allows {} secrets; delete one or upgrade your plan",
                limit
            )),
            GatewayError::Reserved { .. } => Some("Choose a different subdomain".to_string()),
            GatewayError::Unauthenticated { .. } => Some(
                "Send Authorization: Bearer <token>, X-Api-Key, or X-App-Slug/X-App-Id"
                    .to_string(),
            ),
            GatewayError::RateLimit { retry_after: Some(secs), .. } => {
                Some(format!("Retry after {} seconds", secs))
            }
            _ => None,
        }
    }

    /// True for storage-level uniqueness violations
    pub fn is_unique_violation(&self) -> bool {
        match self {
            GatewayError::Database { source, .. } => source
                .as_database_error()
                .map(|db_err| db_err.is_unique_violation())
                .unwrap_or(false),
            _ => false,
        }
    }

    /// True for failures the fallback allocator recovers from
    pub fn is_claim_retryable(&self) -> bool {
        match self {
            GatewayError::Conflict { resource_type, .. } => resource_type == "subdomain",
            GatewayError::Reserved { .. } => true,
            _ => false,
        }
    }
}

// Error conversions for common external error types
impl From<sqlx::Error> for GatewayError {
    fn from(error: sqlx::Error) -> Self {
        Self::Database { source: error, context: "Database operation failed".to_string() }
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(error: std::io::Error) -> Self {
        Self::Io { source: error, context: "I/O operation failed".to_string() }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization { source: error, context: "JSON serialization failed".to_string() }
    }
}

impl From<validator::ValidationErrors> for GatewayError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .iter()
            .map(|(field, field_errors)| {
                let error_messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| {
                        e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string())
                    })
                    .collect();
                format!("{}: {}", field, error_messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self::validation(format!("Validation failed: {}", message))
    }
}

/// Extension trait for attaching context to fallible storage calls
pub trait ErrorContext<T> {
    fn context<S: Into<String>>(self, context: S) -> Result<T>;
}

impl<T, E: Into<GatewayError>> ErrorContext<T> for std::result::Result<T, E> {
    fn context<S: Into<String>>(self, context: S) -> Result<T> {
        self.map_err(|err| {
            let mut err = err.into();
            err.add_context(context.into());
            err
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = GatewayError::config("Test configuration error");
        assert!(matches!(error, GatewayError::Config { .. }));
        assert_eq!(error.to_string(), "Configuration error: Test configuration error");
    }

    #[test]
    fn test_validation_error() {
        let error = GatewayError::validation_field("Invalid name", "name");
        if let GatewayError::Validation { field, .. } = error {
            assert_eq!(field, Some("name".to_string()));
        } else {
            panic!("expected validation error");
        }
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(GatewayError::validation("test").status_code(), 400);
        assert_eq!(GatewayError::unauthenticated("test").status_code(), 401);
        assert_eq!(GatewayError::credential_missing("openai", "OPENAI_API_KEY").status_code(), 401);
        assert_eq!(GatewayError::forbidden("test").status_code(), 403);
        assert_eq!(GatewayError::not_found("app", "x").status_code(), 404);
        assert_eq!(GatewayError::conflict("taken", "subdomain").status_code(), 409);
        assert_eq!(GatewayError::PayloadTooLarge { limit: 1 }.status_code(), 413);
        assert_eq!(GatewayError::UpstreamResponseTooLarge { limit: 1 }.status_code(), 502);
        assert_eq!(
            GatewayError::UpstreamTimeout { target: "openai".into(), duration_ms: 5 }
                .status_code(),
            504
        );
        assert_eq!(GatewayError::rate_limit("slow down", Some(3)).status_code(), 429);
        assert_eq!(GatewayError::internal("test").status_code(), 500);
    }

    #[test]
    fn test_credential_missing_hint_names_secret() {
        let error = GatewayError::credential_missing("openai", "OPENAI_API_KEY");
        assert_eq!(error.kind(), "credential_missing");
        assert!(error.hint().unwrap().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_claim_retryable() {
        assert!(GatewayError::conflict("taken", "subdomain").is_claim_retryable());
        assert!(GatewayError::Reserved { subdomain: "www".into() }.is_claim_retryable());
        assert!(!GatewayError::forbidden("plan").is_claim_retryable());
        assert!(!GatewayError::conflict("has one", "app").is_claim_retryable());
    }

    #[test]
    fn test_error_context() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let result: std::result::Result<(), std::io::Error> = Err(io_error);
        let err = result.context("reading master key").unwrap_err();
        assert!(err.to_string().contains("reading master key"));
    }

    #[test]
    fn test_error_conversions() {
        let json_error = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let error: GatewayError = json_error.into();
        assert!(matches!(error, GatewayError::Serialization { .. }));
    }
}
