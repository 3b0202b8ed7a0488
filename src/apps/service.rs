use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use crate::domain::{AppId, TenantId};
use crate::errors::{GatewayError, Result};
use crate::storage::repositories::{AppData, AppRepository};
use crate::storage::DbPool;
use crate::subdomain::allocator::{random_suffix, SubdomainAllocator};
use crate::subdomain::validation::slugify;
use crate::usage::UsageRecorder;

const MAX_APP_NAME_LEN: usize = 100;
const MAX_SLUG_BASE_LEN: usize = 40;
const SLUG_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublishOutcome {
    pub app: AppData,
    /// Claimed subdomain, `None` when every candidate collided
    pub subdomain: Option<String>,
    /// Path that always reaches the app
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct AppService {
    apps: AppRepository,
    allocator: SubdomainAllocator,
    usage: UsageRecorder,
}

impl AppService {
    pub fn new(pool: DbPool, allocator: SubdomainAllocator) -> Self {
        Self { apps: AppRepository::new(pool.clone()), usage: UsageRecorder::new(pool), allocator }
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn create(&self, tenant_id: &TenantId, name: &str) -> Result<AppData> {
        let name = validate_name(name)?;
        let mut base = slugify(name);
        base.truncate(MAX_SLUG_BASE_LEN);
        let base = match base.trim_end_matches('-') {
            "" => "app".to_string(),
            trimmed => trimmed.to_string(),
        };

        for attempt in 1..=SLUG_ATTEMPTS {
            let slug = format!("{}-{}", base, random_suffix());
            match self.apps.create(tenant_id, name, &slug).await {
                Ok(app) => {
                    info!(app_id = %app.id, slug = %app.slug, "Created app");
                    self.usage
                        .record_audit(
                            tenant_id,
                            "app.created",
                            serde_json::json!({ "appId": app.id.as_str(), "slug": app.slug }),
                        )
                        .await;
                    return Ok(app);
                }
                Err(GatewayError::Conflict { .. }) => {
                    warn!(attempt, slug = %slug, "Slug collision, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        Err(GatewayError::internal("Could not generate a unique app slug"))
    }

    pub async fn get(&self, tenant_id: &TenantId, id: &AppId) -> Result<AppData> {
        self.apps
            .find_for_tenant(tenant_id, id)
            .await?
            .ok_or_else(|| GatewayError::not_found("app", id.as_str()))
    }

    pub async fn list(&self, tenant_id: &TenantId) -> Result<Vec<AppData>> {
        self.apps.list_for_tenant(tenant_id).await
    }

    /// Change the display name; the slug never changes
    pub async fn rename(&self, tenant_id: &TenantId, id: &AppId, name: &str) -> Result<AppData> {
        let name = validate_name(name)?;
        self.apps.rename(tenant_id, id, name).await
    }

    /// Delete an app; its subdomain claim goes with it
    #[instrument(skip(self), fields(tenant_id = %tenant_id, app_id = %id))]
    pub async fn delete(&self, tenant_id: &TenantId, id: &AppId) -> Result<()> {
        if !self.apps.delete(tenant_id, id).await? {
            return Err(GatewayError::not_found("app", id.as_str()));
        }
        self.usage
            .record_audit(tenant_id, "app.deleted", serde_json::json!({ "appId": id.as_str() }))
            .await;
        Ok(())
    }

    /// Give the app a subdomain, falling back to suffixed names on collision.
    ///
    /// Publishing an app that already holds a subdomain returns it unchanged
    /// unless a different name is requested.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, app_id = %id))]
    pub async fn publish(
        &self,
        tenant_id: &TenantId,
        id: &AppId,
        preferred: Option<&str>,
    ) -> Result<PublishOutcome> {
        let app = self.get(tenant_id, id).await?;

        if let Some(current) = &app.subdomain {
            let same = preferred.map_or(true, |p| p.trim().eq_ignore_ascii_case(current));
            if same {
                return Ok(outcome(app.clone(), app.subdomain.clone()));
            }
        }

        let claim = self.allocator.allocate(tenant_id, id, &app.name, preferred).await?;
        let subdomain = claim.map(|c| c.subdomain);
        if subdomain.is_none() {
            warn!(slug = %app.slug, "No subdomain available; app stays path-addressable");
        }

        self.usage
            .record_audit(
                tenant_id,
                "app.published",
                serde_json::json!({ "appId": id.as_str(), "subdomain": subdomain }),
            )
            .await;

        let app = AppData { subdomain: subdomain.clone(), ..app };
        Ok(outcome(app, subdomain))
    }
}

fn outcome(app: AppData, subdomain: Option<String>) -> PublishOutcome {
    let path = format!("/a/{}", app.slug);
    PublishOutcome { app, subdomain, path }
}

fn validate_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > MAX_APP_NAME_LEN {
        return Err(GatewayError::validation_field(
            "App name must be between 1 and 100 characters",
            "name",
        ));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PlanTier;
    use crate::policy::PolicyEvaluator;
    use crate::storage::test_helpers::TestDatabase;
    use crate::subdomain::SubdomainArbiter;

    fn service(db: &TestDatabase) -> AppService {
        let arbiter = SubdomainArbiter::new(db.pool.clone(), PolicyEvaluator::new(db.pool.clone()));
        AppService::new(db.pool.clone(), SubdomainAllocator::new(arbiter))
    }

    #[tokio::test]
    async fn create_generates_slug() {
        let db = TestDatabase::new().await;
        let tenant = db.seed_tenant("acme", PlanTier::Free).await;
        let apps = service(&db);

        let app = apps.create(&tenant, "Weather Bot").await.unwrap();
        assert!(app.slug.starts_with("weather-bot-"));

        let unnamed = apps.create(&tenant, "!!!").await.unwrap();
        assert!(unnamed.slug.starts_with("app-"));
    }

    #[tokio::test]
    async fn rename_keeps_slug() {
        let db = TestDatabase::new().await;
        let tenant = db.seed_tenant("acme", PlanTier::Free).await;
        let apps = service(&db);

        let app = apps.create(&tenant, "Weather Bot").await.unwrap();
        let renamed = apps.rename(&tenant, &app.id, "Forecast").await.unwrap();
        assert_eq!(renamed.slug, app.slug);
        assert_eq!(renamed.name, "Forecast");
    }

    #[tokio::test]
    async fn publish_is_idempotent() {
        let db = TestDatabase::new().await;
        let tenant = db.seed_tenant("acme", PlanTier::Free).await;
        let apps = service(&db);
        let app = apps.create(&tenant, "Weather Bot").await.unwrap();

        let first = apps.publish(&tenant, &app.id, None).await.unwrap();
        assert_eq!(first.subdomain.as_deref(), Some("weather-bot"));
        assert_eq!(first.path, format!("/a/{}", app.slug));

        let again = apps.publish(&tenant, &app.id, None).await.unwrap();
        assert_eq!(again.subdomain, first.subdomain);
    }

    #[tokio::test]
    async fn foreign_app_is_not_found() {
        let db = TestDatabase::new().await;
        let owner = db.seed_tenant("acme", PlanTier::Free).await;
        let other = db.seed_tenant("other", PlanTier::Free).await;
        let apps = service(&db);
        let app = apps.create(&owner, "Weather Bot").await.unwrap();

        assert_eq!(apps.publish(&other, &app.id, None).await.unwrap_err().kind(), "not_found");
        assert_eq!(apps.delete(&other, &app.id).await.unwrap_err().kind(), "not_found");
    }

    #[tokio::test]
    async fn delete_frees_subdomain() {
        let db = TestDatabase::new().await;
        let tenant = db.seed_tenant("acme", PlanTier::Free).await;
        let apps = service(&db);
        let app = apps.create(&tenant, "Weather Bot").await.unwrap();
        apps.publish(&tenant, &app.id, Some("forecasts")).await.unwrap();

        apps.delete(&tenant, &app.id).await.unwrap();
        let next = apps.create(&tenant, "Another").await.unwrap();
        let outcome = apps.publish(&tenant, &next.id, Some("forecasts")).await.unwrap();
        assert_eq!(outcome.subdomain.as_deref(), Some("forecasts"));
    }
}
