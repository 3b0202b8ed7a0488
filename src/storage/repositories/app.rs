//! App repository
//!
//! Apps are tenant-owned. The slug is generated once and never changes; the
//! subdomain is read through a join on `subdomain_claims` so there is exactly
//! one place that records it.

use crate::domain::{AppId, TenantId};
use crate::errors::{GatewayError, Result};
use crate::storage::DbPool;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tracing::instrument;
use utoipa::ToSchema;

const APP_COLUMNS: &str = "a.id, a.tenant_id, a.name, a.slug, c.subdomain, a.created_at, a.updated_at";

#[derive(Debug, Clone, FromRow)]
struct AppRow {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub slug: String,
    pub subdomain: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppData {
    pub id: AppId,
    pub tenant_id: TenantId,
    pub name: String,
    pub slug: String,
    pub subdomain: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<AppRow> for AppData {
    fn from(row: AppRow) -> Self {
        Self {
            id: AppId::from_string(row.id),
            tenant_id: TenantId::from_string(row.tenant_id),
            name: row.name,
            slug: row.slug,
            subdomain: row.subdomain,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppRepository {
    pool: DbPool,
}

impl AppRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert a new app. A slug collision surfaces as `Conflict` so the caller can pick another.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, slug = %slug), name = "db_create_app")]
    pub async fn create(&self, tenant_id: &TenantId, name: &str, slug: &str) -> Result<AppData> {
        let id = AppId::new();
        let now = chrono::Utc::now();

        sqlx::query(
            "INSERT INTO apps (id, tenant_id, name, slug, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(tenant_id)
        .bind(name)
        .bind(slug)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if super::unique_violation_on(&e, "apps.slug") {
                return GatewayError::conflict(format!("Slug '{}' is taken", slug), "app");
            }
            tracing::error!(error = %e, tenant_id = %tenant_id, "Failed to create app");
            GatewayError::database(e, "Failed to create app")
        })?;

        Ok(AppData {
            id,
            tenant_id: tenant_id.clone(),
            name: name.to_string(),
            slug: slug.to_string(),
            subdomain: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Load an app only if `tenant_id` owns it
    #[instrument(skip(self), fields(tenant_id = %tenant_id, app_id = %id), name = "db_get_app")]
    pub async fn find_for_tenant(&self, tenant_id: &TenantId, id: &AppId) -> Result<Option<AppData>> {
        let sql = format!(
            "SELECT {APP_COLUMNS} FROM apps a LEFT JOIN subdomain_claims c ON c.app_id = a.id WHERE a.id = ? AND a.tenant_id = ?"
        );
        let row = sqlx::query_as::<_, AppRow>(&sql)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| GatewayError::database(e, "Failed to load app"))?;

        Ok(row.map(AppData::from))
    }

    /// Load an app regardless of owner (identity resolution by `X-App-Id`)
    pub async fn find(&self, id: &AppId) -> Result<Option<AppData>> {
        let sql = format!(
            "SELECT {APP_COLUMNS} FROM apps a LEFT JOIN subdomain_claims c ON c.app_id = a.id WHERE a.id = ?"
        );
        let row = sqlx::query_as::<_, AppRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| GatewayError::database(e, "Failed to load app"))?;

        Ok(row.map(AppData::from))
    }

    pub async fn find_by_slug(&self, slug: &str) -> Result<Option<AppData>> {
        let sql = format!(
            "SELECT {APP_COLUMNS} FROM apps a LEFT JOIN subdomain_claims c ON c.app_id = a.id WHERE a.slug = ?"
        );
        let row = sqlx::query_as::<_, AppRow>(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| GatewayError::database(e, "Failed to load app by slug"))?;

        Ok(row.map(AppData::from))
    }

    pub async fn list_for_tenant(&self, tenant_id: &TenantId) -> Result<Vec<AppData>> {
        let sql = format!(
            "SELECT {APP_COLUMNS} FROM apps a LEFT JOIN subdomain_claims c ON c.app_id = a.id WHERE a.tenant_id = ? ORDER BY a.created_at"
        );
        let rows = sqlx::query_as::<_, AppRow>(&sql)
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| GatewayError::database(e, "Failed to list apps"))?;

        Ok(rows.into_iter().map(AppData::from).collect())
    }

    /// Rename an app. The slug is untouched.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, app_id = %id), name = "db_rename_app")]
    pub async fn rename(&self, tenant_id: &TenantId, id: &AppId, name: &str) -> Result<AppData> {
        let result =
            sqlx::query("UPDATE apps SET name = ?, updated_at = ? WHERE id = ? AND tenant_id = ?")
                .bind(name)
                .bind(chrono::Utc::now())
                .bind(id)
                .bind(tenant_id)
                .execute(&self.pool)
                .await
                .map_err(|e| GatewayError::database(e, "Failed to rename app"))?;

        if result.rows_affected() == 0 {
            return Err(GatewayError::not_found("app", id.as_str()));
        }

        self.find_for_tenant(tenant_id, id)
            .await?
            .ok_or_else(|| GatewayError::not_found("app", id.as_str()))
    }

    /// Delete an app; its subdomain claim goes with it through the cascade
    #[instrument(skip(self), fields(tenant_id = %tenant_id, app_id = %id), name = "db_delete_app")]
    pub async fn delete(&self, tenant_id: &TenantId, id: &AppId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM apps WHERE id = ? AND tenant_id = ?")
            .bind(id)
            .bind(tenant_id)
            .execute(&self.pool)
            .await
            .map_err(|e| GatewayError::database(e, "Failed to delete app"))?;

        Ok(result.rows_affected() > 0)
    }
}
