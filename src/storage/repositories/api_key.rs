//! API key repository
//!
//! Stores argon2 hashes only. The plaintext secret exists once, in the response
//! that issued it.

use crate::domain::{ApiKeyId, TenantId};
use crate::errors::{GatewayError, Result};
use crate::storage::DbPool;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tracing::instrument;
use utoipa::ToSchema;

#[derive(Debug, Clone, FromRow)]
struct ApiKeyRow {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub hashed_secret: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub last_used_at: Option<chrono::DateTime<chrono::Utc>>,
    pub revoked_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Stored API key. `hashed_secret` never leaves the auth layer.
#[derive(Debug, Clone)]
pub struct ApiKeyData {
    pub id: ApiKeyId,
    pub tenant_id: TenantId,
    pub name: String,
    pub hashed_secret: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub last_used_at: Option<chrono::DateTime<chrono::Utc>>,
    pub revoked_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl ApiKeyData {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }
}

impl From<ApiKeyRow> for ApiKeyData {
    fn from(row: ApiKeyRow) -> Self {
        Self {
            id: ApiKeyId::from_string(row.id),
            tenant_id: TenantId::from_string(row.tenant_id),
            name: row.name,
            hashed_secret: row.hashed_secret,
            created_at: row.created_at,
            last_used_at: row.last_used_at,
            revoked_at: row.revoked_at,
        }
    }
}

/// Public view of a key, safe to list
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeySummary {
    pub id: ApiKeyId,
    pub name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub last_used_at: Option<chrono::DateTime<chrono::Utc>>,
    pub revoked: bool,
}

impl From<&ApiKeyData> for ApiKeySummary {
    fn from(key: &ApiKeyData) -> Self {
        Self {
            id: key.id.clone(),
            name: key.name.clone(),
            created_at: key.created_at,
            last_used_at: key.last_used_at,
            revoked: key.is_revoked(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiKeyRepository {
    pool: DbPool,
}

impl ApiKeyRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, hashed_secret), fields(api_key_id = %id, tenant_id = %tenant_id), name = "db_create_api_key")]
    pub async fn create(
        &self,
        id: &ApiKeyId,
        tenant_id: &TenantId,
        name: &str,
        hashed_secret: &str,
    ) -> Result<ApiKeyData> {
        let now = chrono::Utc::now();
        sqlx::query(
            "INSERT INTO api_keys (id, tenant_id, name, hashed_secret, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(tenant_id)
        .bind(name)
        .bind(hashed_secret)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, tenant_id = %tenant_id, "Failed to create API key");
            GatewayError::database(e, "Failed to create API key")
        })?;

        Ok(ApiKeyData {
            id: id.clone(),
            tenant_id: tenant_id.clone(),
            name: name.to_string(),
            hashed_secret: hashed_secret.to_string(),
            created_at: now,
            last_used_at: None,
            revoked_at: None,
        })
    }

    #[instrument(skip(self), fields(api_key_id = %id), name = "db_find_api_key")]
    pub async fn find(&self, id: &ApiKeyId) -> Result<Option<ApiKeyData>> {
        let row = sqlx::query_as::<_, ApiKeyRow>(
            "SELECT id, tenant_id, name, hashed_secret, created_at, last_used_at, revoked_at FROM api_keys WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| GatewayError::database(e, "Failed to load API key"))?;

        Ok(row.map(ApiKeyData::from))
    }

    pub async fn touch_last_used(&self, id: &ApiKeyId) -> Result<()> {
        sqlx::query("UPDATE api_keys SET last_used_at = ? WHERE id = ?")
            .bind(chrono::Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| GatewayError::database(e, "Failed to update API key usage"))?;
        Ok(())
    }

    /// Revoke a key owned by `tenant_id`. Returns false when no such active key exists.
    #[instrument(skip(self), fields(api_key_id = %id, tenant_id = %tenant_id), name = "db_revoke_api_key")]
    pub async fn revoke(&self, tenant_id: &TenantId, id: &ApiKeyId) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE api_keys SET revoked_at = ? WHERE id = ? AND tenant_id = ? AND revoked_at IS NULL",
        )
        .bind(chrono::Utc::now())
        .bind(id)
        .bind(tenant_id)
        .execute(&self.pool)
        .await
        .map_err(|e| GatewayError::database(e, "Failed to revoke API key"))?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn list_for_tenant(&self, tenant_id: &TenantId) -> Result<Vec<ApiKeyData>> {
        let rows = sqlx::query_as::<_, ApiKeyRow>(
            "SELECT id, tenant_id, name, hashed_secret, created_at, last_used_at, revoked_at FROM api_keys WHERE tenant_id = ? ORDER BY created_at",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GatewayError::database(e, "Failed to list API keys"))?;

        Ok(rows.into_iter().map(ApiKeyData::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PlanTier;
    use crate::storage::test_helpers::TestDatabase;

    #[tokio::test]
    async fn create_find_and_revoke() {
        let db = TestDatabase::new().await;
        let tenant = db.seed_tenant("acme", PlanTier::Free).await;
        let repo = ApiKeyRepository::new(db.pool.clone());

        let id = ApiKeyId::new();
        repo.create(&id, &tenant, "ci", "$argon2id$fake").await.unwrap();

        let found = repo.find(&id).await.unwrap().unwrap();
        assert_eq!(found.tenant_id, tenant);
        assert!(!found.is_revoked());

        assert!(repo.revoke(&tenant, &id).await.unwrap());
        assert!(!repo.revoke(&tenant, &id).await.unwrap());
        assert!(repo.find(&id).await.unwrap().unwrap().is_revoked());
    }

    #[tokio::test]
    async fn revoke_ignores_other_tenants() {
        let db = TestDatabase::new().await;
        let owner = db.seed_tenant("owner", PlanTier::Free).await;
        let other = db.seed_tenant("other", PlanTier::Free).await;
        let repo = ApiKeyRepository::new(db.pool.clone());

        let id = ApiKeyId::new();
        repo.create(&id, &owner, "ci", "$argon2id$fake").await.unwrap();

        assert!(!repo.revoke(&other, &id).await.unwrap());
    }

    #[tokio::test]
    async fn touch_sets_last_used() {
        let db = TestDatabase::new().await;
        let tenant = db.seed_tenant("acme", PlanTier::Free).await;
        let repo = ApiKeyRepository::new(db.pool.clone());
        let id = ApiKeyId::new();
        repo.create(&id, &tenant, "ci", "$argon2id$fake").await.unwrap();

        repo.touch_last_used(&id).await.unwrap();
        assert!(repo.find(&id).await.unwrap().unwrap().last_used_at.is_some());
    }
}
