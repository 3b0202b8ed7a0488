//! Repository modules for data access
//!
//! One repository per table. Each owns a clone of the pool and maps storage
//! failures into [`crate::errors::GatewayError`].

pub mod api_key;
pub mod app;
pub mod feature_flag;
pub mod secret;
pub mod subdomain;
pub mod tenant;
pub mod usage;

pub use api_key::{ApiKeyData, ApiKeyRepository, ApiKeySummary};
pub use app::{AppData, AppRepository};
pub use feature_flag::FeatureFlagRepository;
pub use secret::{NewSealedSecret, SealedSecretRow, SecretMetadataRow, SecretRepository};
pub use subdomain::{SubdomainClaim, SubdomainRepository};
pub use tenant::{TenantData, TenantRepository};
pub use usage::{NewUsageRecord, UsageKind, UsageRecord, UsageRepository};

/// True when `err` is a uniqueness violation whose message names `column`.
///
/// SQLite reports these as `UNIQUE constraint failed: table.column`.
pub(crate) fn unique_violation_on(err: &sqlx::Error, column: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.is_unique_violation() && db_err.message().contains(column)
        }
        _ => false,
    }
}
