//! Test database utilities for in-library tests.
//!
//! Each `TestDatabase` owns a fresh SQLite file inside a temporary directory
//! with all migrations applied. Dropping it removes the directory.

use crate::config::DatabaseConfig;
use crate::domain::{PlanTier, TenantId};
use crate::storage::{create_pool, DbPool};
use tempfile::TempDir;

pub struct TestDatabase {
    pub pool: DbPool,
    _dir: TempDir,
}

impl TestDatabase {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config = DatabaseConfig {
            url: format!("sqlite://{}", dir.path().join("keyrelay-test.db").display()),
            max_connections: 5,
            min_connections: 1,
            auto_migrate: true,
            ..Default::default()
        };
        let pool = create_pool(&config).await.expect("create test pool");
        Self { pool, _dir: dir }
    }

    /// Insert a tenant row directly and return its id
    pub async fn seed_tenant(&self, name: &str, plan: PlanTier) -> TenantId {
        let id = TenantId::new();
        let now = chrono::Utc::now();
        sqlx::query(
            "INSERT INTO tenants (id, name, plan_tier, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id.as_str())
        .bind(name)
        .bind(plan.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .expect("seed tenant");
        id
    }
}
