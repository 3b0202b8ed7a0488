//! Subdomain claim repository
//!
//! The `subdomain` primary key is the only thing that decides between two
//! callers racing for the same name. Nothing here reads before writing.

use crate::domain::{AppId, TenantId};
use crate::errors::{GatewayError, Result};
use crate::storage::DbPool;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tracing::instrument;
use utoipa::ToSchema;

#[derive(Debug, Clone, FromRow)]
struct ClaimRow {
    pub subdomain: String,
    pub tenant_id: String,
    pub app_id: String,
    pub claimed_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubdomainClaim {
    pub subdomain: String,
    pub tenant_id: TenantId,
    pub app_id: AppId,
    pub claimed_at: chrono::DateTime<chrono::Utc>,
}

impl From<ClaimRow> for SubdomainClaim {
    fn from(row: ClaimRow) -> Self {
        Self {
            subdomain: row.subdomain,
            tenant_id: TenantId::from_string(row.tenant_id),
            app_id: AppId::from_string(row.app_id),
            claimed_at: row.claimed_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubdomainRepository {
    pool: DbPool,
}

impl SubdomainRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert a claim for an app the tenant owns, in one statement.
    ///
    /// - no row inserted: the app does not exist for this tenant (`NotFound`)
    /// - unique violation on `subdomain`: somebody else holds it (`Conflict`)
    /// - unique violation on `app_id`: the app already has a subdomain (`Conflict`)
    #[instrument(skip(self), fields(tenant_id = %tenant_id, subdomain = %subdomain, app_id = %app_id), name = "db_insert_claim")]
    pub async fn insert_claim(
        &self,
        tenant_id: &TenantId,
        subdomain: &str,
        app_id: &AppId,
    ) -> Result<SubdomainClaim> {
        let now = chrono::Utc::now();
        let result = sqlx::query(
            "INSERT INTO subdomain_claims (subdomain, tenant_id, app_id, claimed_at) \
             SELECT ?, ?, ?, ? \
             WHERE EXISTS (SELECT 1 FROM apps WHERE id = ? AND tenant_id = ?)",
        )
        .bind(subdomain)
        .bind(tenant_id)
        .bind(app_id)
        .bind(now)
        .bind(app_id)
        .bind(tenant_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if super::unique_violation_on(&e, "subdomain_claims.subdomain") {
                return GatewayError::conflict(
                    format!("Subdomain '{}' is already claimed", subdomain),
                    "subdomain",
                );
            }
            if super::unique_violation_on(&e, "subdomain_claims.app_id") {
                return GatewayError::conflict(
                    "App already has a subdomain; release it first",
                    "app",
                );
            }
            tracing::error!(error = %e, subdomain = %subdomain, "Failed to insert subdomain claim");
            GatewayError::database(e, format!("Failed to claim subdomain '{}'", subdomain))
        })?;

        if result.rows_affected() == 0 {
            return Err(GatewayError::not_found("app", app_id.as_str()));
        }

        Ok(SubdomainClaim {
            subdomain: subdomain.to_string(),
            tenant_id: tenant_id.clone(),
            app_id: app_id.clone(),
            claimed_at: now,
        })
    }

    /// Delete a claim only if `tenant_id` holds it
    #[instrument(skip(self), fields(tenant_id = %tenant_id, subdomain = %subdomain), name = "db_delete_claim")]
    pub async fn delete_claim(&self, tenant_id: &TenantId, subdomain: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM subdomain_claims WHERE subdomain = ? AND tenant_id = ?")
            .bind(subdomain)
            .bind(tenant_id)
            .execute(&self.pool)
            .await
            .map_err(|e| GatewayError::database(e, "Failed to release subdomain"))?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn find(&self, subdomain: &str) -> Result<Option<SubdomainClaim>> {
        let row = sqlx::query_as::<_, ClaimRow>(
            "SELECT subdomain, tenant_id, app_id, claimed_at FROM subdomain_claims WHERE subdomain = ?",
        )
        .bind(subdomain)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| GatewayError::database(e, "Failed to load subdomain claim"))?;

        Ok(row.map(SubdomainClaim::from))
    }

    pub async fn list_for_tenant(&self, tenant_id: &TenantId) -> Result<Vec<SubdomainClaim>> {
        let rows = sqlx::query_as::<_, ClaimRow>(
            "SELECT subdomain, tenant_id, app_id, claimed_at FROM subdomain_claims WHERE tenant_id = ? ORDER BY claimed_at",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GatewayError::database(e, "Failed to list subdomain claims"))?;

        Ok(rows.into_iter().map(SubdomainClaim::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PlanTier;
    use crate::storage::repositories::AppRepository;
    use crate::storage::test_helpers::TestDatabase;

    #[tokio::test]
    async fn claim_requires_owned_app() {
        let db = TestDatabase::new().await;
        let owner = db.seed_tenant("owner", PlanTier::Pro).await;
        let other = db.seed_tenant("other", PlanTier::Pro).await;
        let app = AppRepository::new(db.pool.clone()).create(&owner, "App", "app-slug").await.unwrap();
        let repo = SubdomainRepository::new(db.pool.clone());

        let err = repo.insert_claim(&other, "stolen", &app.id).await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound { .. }));
        assert!(repo.find("stolen").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn second_claim_of_same_name_conflicts() {
        let db = TestDatabase::new().await;
        let a = db.seed_tenant("a", PlanTier::Pro).await;
        let b = db.seed_tenant("b", PlanTier::Pro).await;
        let apps = AppRepository::new(db.pool.clone());
        let app_a = apps.create(&a, "A", "slug-a").await.unwrap();
        let app_b = apps.create(&b, "B", "slug-b").await.unwrap();
        let repo = SubdomainRepository::new(db.pool.clone());

        repo.insert_claim(&a, "myapp", &app_a.id).await.unwrap();
        let err = repo.insert_claim(&b, "myapp", &app_b.id).await.unwrap_err();

        assert!(matches!(err, GatewayError::Conflict { ref resource_type, .. } if resource_type == "subdomain"));
        assert_eq!(repo.find("myapp").await.unwrap().unwrap().tenant_id, a);
    }

    #[tokio::test]
    async fn app_holds_at_most_one_subdomain() {
        let db = TestDatabase::new().await;
        let t = db.seed_tenant("t", PlanTier::Pro).await;
        let app = AppRepository::new(db.pool.clone()).create(&t, "A", "slug-a").await.unwrap();
        let repo = SubdomainRepository::new(db.pool.clone());

        repo.insert_claim(&t, "first", &app.id).await.unwrap();
        let err = repo.insert_claim(&t, "second", &app.id).await.unwrap_err();

        assert!(matches!(err, GatewayError::Conflict { ref resource_type, .. } if resource_type == "app"));
    }

    #[tokio::test]
    async fn delete_only_removes_own_claim() {
        let db = TestDatabase::new().await;
        let a = db.seed_tenant("a", PlanTier::Pro).await;
        let b = db.seed_tenant("b", PlanTier::Pro).await;
        let app = AppRepository::new(db.pool.clone()).create(&a, "A", "slug-a").await.unwrap();
        let repo = SubdomainRepository::new(db.pool.clone());
        repo.insert_claim(&a, "mine", &app.id).await.unwrap();

        assert!(!repo.delete_claim(&b, "mine").await.unwrap());
        assert!(repo.delete_claim(&a, "mine").await.unwrap());
        assert!(repo.find("mine").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deleting_app_cascades_claim() {
        let db = TestDatabase::new().await;
        let t = db.seed_tenant("t", PlanTier::Pro).await;
        let apps = AppRepository::new(db.pool.clone());
        let app = apps.create(&t, "A", "slug-a").await.unwrap();
        let repo = SubdomainRepository::new(db.pool.clone());
        repo.insert_claim(&t, "cascade", &app.id).await.unwrap();

        assert!(apps.delete(&t, &app.id).await.unwrap());
        assert!(repo.find("cascade").await.unwrap().is_none());
    }
}
