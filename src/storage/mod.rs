//! # Storage and Persistence
//!
//! SQLite connectivity, embedded migrations and the per-table repositories.

pub mod migrations;
pub mod pool;
pub mod repositories;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use migrations::{
    get_migration_version, list_applied_migrations, run_migrations, validate_migrations,
    MigrationInfo,
};
pub use pool::{create_pool, DbPool, PoolStats};

use crate::errors::{GatewayError, Result};

/// Check database connectivity
pub async fn check_connection(pool: &DbPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .map_err(|e| GatewayError::database(e, "Database connectivity check failed"))?;
    Ok(())
}
