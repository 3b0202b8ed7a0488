//! Tenant repository
//!
//! Tenants are created by operators and never hard-deleted; the only mutation
//! after creation is a plan-tier change.

use crate::domain::{PlanTier, TenantId};
use crate::errors::{GatewayError, Result};
use crate::storage::DbPool;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tracing::instrument;
use utoipa::ToSchema;

#[derive(Debug, Clone, FromRow)]
struct TenantRow {
    pub id: String,
    pub name: String,
    pub plan_tier: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Tenant as seen by the rest of the gateway
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TenantData {
    pub id: TenantId,
    pub name: String,
    pub plan_tier: PlanTier,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<TenantRow> for TenantData {
    type Error = GatewayError;

    fn try_from(row: TenantRow) -> Result<Self> {
        let plan_tier = row.plan_tier.parse::<PlanTier>().map_err(|e| {
            GatewayError::internal(format!("Tenant '{}' has corrupt plan tier: {}", row.id, e))
        })?;
        Ok(Self {
            id: TenantId::from_string(row.id),
            name: row.name,
            plan_tier,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct TenantRepository {
    pool: DbPool,
}

impl TenantRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self), fields(tenant_name = %name, plan = %plan), name = "db_create_tenant")]
    pub async fn create(&self, name: &str, plan: PlanTier) -> Result<TenantData> {
        let id = TenantId::new();
        let now = chrono::Utc::now();

        sqlx::query(
            "INSERT INTO tenants (id, name, plan_tier, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(name)
        .bind(plan.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, tenant_name = %name, "Failed to create tenant");
            GatewayError::database(e, format!("Failed to create tenant '{}'", name))
        })?;

        tracing::info!(tenant_id = %id, plan = %plan, "Created tenant");

        Ok(TenantData { id, name: name.to_string(), plan_tier: plan, created_at: now, updated_at: now })
    }

    #[instrument(skip(self), fields(tenant_id = %id), name = "db_get_tenant")]
    pub async fn find(&self, id: &TenantId) -> Result<Option<TenantData>> {
        let row = sqlx::query_as::<_, TenantRow>(
            "SELECT id, name, plan_tier, created_at, updated_at FROM tenants WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| GatewayError::database(e, format!("Failed to load tenant '{}'", id)))?;

        row.map(TenantData::try_from).transpose()
    }

    /// Load a tenant, failing with `NotFound` when absent
    pub async fn get(&self, id: &TenantId) -> Result<TenantData> {
        self.find(id).await?.ok_or_else(|| GatewayError::not_found("tenant", id.as_str()))
    }

    #[instrument(skip(self), fields(tenant_id = %id, plan = %plan), name = "db_set_tenant_plan")]
    pub async fn set_plan(&self, id: &TenantId, plan: PlanTier) -> Result<TenantData> {
        let result = sqlx::query("UPDATE tenants SET plan_tier = ?, updated_at = ? WHERE id = ?")
            .bind(plan.as_str())
            .bind(chrono::Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| GatewayError::database(e, format!("Failed to update plan for '{}'", id)))?;

        if result.rows_affected() == 0 {
            return Err(GatewayError::not_found("tenant", id.as_str()));
        }

        tracing::info!(tenant_id = %id, plan = %plan, "Updated tenant plan");
        self.get(id).await
    }

    pub async fn list(&self) -> Result<Vec<TenantData>> {
        let rows = sqlx::query_as::<_, TenantRow>(
            "SELECT id, name, plan_tier, created_at, updated_at FROM tenants ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GatewayError::database(e, "Failed to list tenants"))?;

        rows.into_iter().map(TenantData::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_helpers::TestDatabase;

    #[tokio::test]
    async fn create_and_find_tenant() {
        let db = TestDatabase::new().await;
        let repo = TenantRepository::new(db.pool.clone());

        let created = repo.create("acme", PlanTier::Hobby).await.unwrap();
        let found = repo.find(&created.id).await.unwrap().unwrap();

        assert_eq!(found.name, "acme");
        assert_eq!(found.plan_tier, PlanTier::Hobby);
    }

    #[tokio::test]
    async fn set_plan_updates_tier() {
        let db = TestDatabase::new().await;
        let repo = TenantRepository::new(db.pool.clone());
        let tenant = repo.create("acme", PlanTier::Free).await.unwrap();

        let updated = repo.set_plan(&tenant.id, PlanTier::Pro).await.unwrap();
        assert_eq!(updated.plan_tier, PlanTier::Pro);
    }

    #[tokio::test]
    async fn set_plan_on_missing_tenant_is_not_found() {
        let db = TestDatabase::new().await;
        let repo = TenantRepository::new(db.pool.clone());

        let err = repo.set_plan(&TenantId::new(), PlanTier::Pro).await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound { .. }));
    }
}
