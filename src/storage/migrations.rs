//! # Database Migration Management
//!
//! Schema evolution through SQL migrations embedded in the binary. Each file is
//! applied once, inside its own transaction, and recorded in
//! `_keyrelay_migrations` together with a SHA-256 checksum of its contents.

use crate::errors::{GatewayError, Result};
use crate::storage::DbPool;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::Row;
use tracing::{error, info, warn, Instrument};

/// Embedded migrations, ordered by version prefix
const MIGRATIONS: &[(&str, &str)] = &[
    ("0001_initial_schema", include_str!("../../migrations/0001_initial_schema.sql")),
    ("0002_seed_feature_flags", include_str!("../../migrations/0002_seed_feature_flags.sql")),
];

/// Migration information structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationInfo {
    pub version: i64,
    pub description: String,
    pub installed_on: chrono::DateTime<chrono::Utc>,
    pub execution_time: i64,
    pub checksum: String,
}

/// Run all pending database migrations
pub async fn run_migrations(pool: &DbPool) -> Result<()> {
    info!("Starting database migration process");

    create_migration_table(pool).await?;
    let applied = list_applied_migrations(pool).await?;

    let mut migrations_run = 0;
    for (filename, sql) in MIGRATIONS {
        let version = extract_version_from_filename(filename)?;
        let checksum = calculate_checksum(sql);

        if let Some(existing) = applied.iter().find(|m| m.version == version) {
            if existing.checksum != checksum {
                warn!(version, migration = filename, "Applied migration checksum differs");
            }
            continue;
        }

        info!(version, "Running migration: {}", filename);
        let execution_time = apply_migration(pool, filename, version, sql, &checksum)
            .instrument(crate::db_span!("apply_migration", version = version))
            .await?;

        migrations_run += 1;
        info!(version, execution_time_ms = execution_time, "Migration completed: {}", filename);
    }

    if migrations_run > 0 {
        info!(count = migrations_run, "Database migrations completed");
    } else {
        info!("No pending migrations");
    }

    Ok(())
}

async fn apply_migration(
    pool: &DbPool,
    filename: &str,
    version: i64,
    sql: &str,
    checksum: &str,
) -> Result<i64> {
    let start_time = std::time::Instant::now();

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| GatewayError::database(e, "Failed to start migration transaction"))?;

    sqlx::raw_sql(sql).execute(&mut *tx).await.map_err(|e| {
        error!(error = %e, migration = filename, "Migration failed");
        GatewayError::database(e, format!("Migration failed: {}", filename))
    })?;

    let execution_time = start_time.elapsed().as_millis() as i64;
    sqlx::query(
        "INSERT INTO _keyrelay_migrations (version, description, checksum, execution_time, installed_on) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(version)
    .bind(filename)
    .bind(checksum)
    .bind(execution_time)
    .bind(chrono::Utc::now())
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        error!(error = %e, migration = filename, "Failed to record migration");
        GatewayError::database(e, format!("Failed to record migration: {}", filename))
    })?;

    tx.commit()
        .await
        .map_err(|e| GatewayError::database(e, "Failed to commit migration transaction"))?;

    Ok(execution_time)
}

async fn create_migration_table(pool: &DbPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS _keyrelay_migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            checksum TEXT NOT NULL,
            execution_time INTEGER NOT NULL,
            installed_on TEXT NOT NULL
        )
    "#,
    )
    .execute(pool)
    .await
    .map_err(|e| GatewayError::database(e, "Failed to create migration tracking table"))?;

    Ok(())
}

fn extract_version_from_filename(filename: &str) -> Result<i64> {
    let version_str = filename.split('_').next().unwrap_or_default();
    version_str.parse::<i64>().map_err(|_| {
        GatewayError::validation(format!("Invalid version in migration filename: {}", filename))
    })
}

fn calculate_checksum(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Get the current migration version (highest applied)
pub async fn get_migration_version(pool: &DbPool) -> Result<i64> {
    let applied = list_applied_migrations(pool).await?;
    Ok(applied.into_iter().map(|m| m.version).max().unwrap_or(0))
}

/// True when every embedded migration has been applied
pub async fn validate_migrations(pool: &DbPool) -> Result<bool> {
    let applied = list_applied_migrations(pool).await?;
    for (filename, _) in MIGRATIONS {
        let version = extract_version_from_filename(filename)?;
        if !applied.iter().any(|m| m.version == version) {
            warn!(version, "Missing migration");
            return Ok(false);
        }
    }
    Ok(true)
}

/// List all applied migrations
pub async fn list_applied_migrations(pool: &DbPool) -> Result<Vec<MigrationInfo>> {
    let rows = sqlx::query(
        "SELECT version, description, checksum, execution_time, installed_on FROM _keyrelay_migrations ORDER BY version",
    )
    .fetch_all(pool)
    .await;

    match rows {
        Ok(rows) => Ok(rows
            .into_iter()
            .map(|row| MigrationInfo {
                version: row.get("version"),
                description: row.get("description"),
                installed_on: row.get("installed_on"),
                execution_time: row.get("execution_time"),
                checksum: row.get("checksum"),
            })
            .collect()),
        Err(sqlx::Error::Database(db_err)) if db_err.message().contains("no such table") => {
            Ok(Vec::new())
        }
        Err(e) => Err(GatewayError::database(e, "Failed to list applied migrations")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_helpers::TestDatabase;

    #[test]
    fn test_extract_version_from_filename() {
        assert_eq!(extract_version_from_filename("0001_initial_schema").unwrap(), 1);
        assert!(extract_version_from_filename("initial_schema").is_err());
    }

    #[test]
    fn test_calculate_checksum() {
        let a = calculate_checksum("CREATE TABLE test (id INTEGER);");
        let b = calculate_checksum("CREATE TABLE test (id INTEGER);");
        let c = calculate_checksum("CREATE TABLE other (id INTEGER);");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let db = TestDatabase::new().await;

        run_migrations(&db.pool).await.unwrap();
        run_migrations(&db.pool).await.unwrap();

        assert!(validate_migrations(&db.pool).await.unwrap());
        assert_eq!(get_migration_version(&db.pool).await.unwrap(), 2);
        assert_eq!(list_applied_migrations(&db.pool).await.unwrap().len(), MIGRATIONS.len());
    }

    #[tokio::test]
    async fn test_seed_inserts_short_subdomains_flag() {
        let db = TestDatabase::new().await;
        let tier: Option<String> =
            sqlx::query_scalar("SELECT min_plan_tier FROM feature_flags WHERE name = 'short_subdomains'")
                .fetch_one(&db.pool)
                .await
                .unwrap();
        assert_eq!(tier.as_deref(), Some("pro"));
    }
}
