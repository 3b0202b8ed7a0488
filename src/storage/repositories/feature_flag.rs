//! Feature flag and override repository
//!
//! The store is the only source of flag state at runtime.

use crate::domain::{PlanTier, TenantId};
use crate::errors::{GatewayError, Result};
use crate::policy::models::{FeatureFlag, FeatureOverride, FlagDefinition, OverrideDefinition};
use crate::policy::rules::Rule;
use crate::storage::DbPool;
use sqlx::FromRow;
use tracing::instrument;

#[derive(Debug, Clone, FromRow)]
struct FlagRow {
    pub name: String,
    pub description: String,
    pub enabled: bool,
    pub rollout_percentage: i64,
    pub min_plan_tier: Option<String>,
    pub rule: Option<String>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<FlagRow> for FeatureFlag {
    type Error = GatewayError;

    fn try_from(row: FlagRow) -> Result<Self> {
        let min_plan_tier = row
            .min_plan_tier
            .as_deref()
            .map(str::parse::<PlanTier>)
            .transpose()
            .map_err(|e| GatewayError::internal(format!("Flag '{}': {}", row.name, e)))?;
        let rule = row
            .rule
            .as_deref()
            .map(serde_json::from_str::<Rule>)
            .transpose()
            .map_err(|e| GatewayError::internal(format!("Flag '{}' has invalid rule: {}", row.name, e)))?;

        Ok(Self {
            name: row.name,
            description: row.description,
            enabled: row.enabled,
            rollout_percentage: row.rollout_percentage.clamp(0, 100) as u8,
            min_plan_tier,
            rule,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
struct OverrideRow {
    pub flag_name: String,
    pub tenant_id: String,
    pub enabled: bool,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    pub reason: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<OverrideRow> for FeatureOverride {
    fn from(row: OverrideRow) -> Self {
        Self {
            flag_name: row.flag_name,
            tenant_id: TenantId::from_string(row.tenant_id),
            enabled: row.enabled,
            expires_at: row.expires_at,
            reason: row.reason,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeatureFlagRepository {
    pool: DbPool,
}

impl FeatureFlagRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self), fields(flag = %name), name = "db_get_flag")]
    pub async fn find(&self, name: &str) -> Result<Option<FeatureFlag>> {
        let row = sqlx::query_as::<_, FlagRow>(
            "SELECT name, description, enabled, rollout_percentage, min_plan_tier, rule, updated_at \
             FROM feature_flags WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| GatewayError::database(e, format!("Failed to load flag '{}'", name)))?;

        row.map(FeatureFlag::try_from).transpose()
    }

    pub async fn list(&self) -> Result<Vec<FeatureFlag>> {
        let rows = sqlx::query_as::<_, FlagRow>(
            "SELECT name, description, enabled, rollout_percentage, min_plan_tier, rule, updated_at \
             FROM feature_flags ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GatewayError::database(e, "Failed to list flags"))?;

        rows.into_iter().map(FeatureFlag::try_from).collect()
    }

    #[instrument(skip(self, definition), fields(flag = %name), name = "db_upsert_flag")]
    pub async fn upsert(&self, name: &str, definition: &FlagDefinition) -> Result<FeatureFlag> {
        let rule_json = definition.rule.as_ref().map(serde_json::to_string).transpose()?;

        sqlx::query(
            "INSERT INTO feature_flags (name, description, enabled, rollout_percentage, min_plan_tier, rule, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(name) DO UPDATE SET description = excluded.description, enabled = excluded.enabled, \
             rollout_percentage = excluded.rollout_percentage, min_plan_tier = excluded.min_plan_tier, \
             rule = excluded.rule, updated_at = excluded.updated_at",
        )
        .bind(name)
        .bind(&definition.description)
        .bind(definition.enabled)
        .bind(i64::from(definition.rollout_percentage))
        .bind(definition.min_plan_tier.map(|tier| tier.as_str()))
        .bind(rule_json)
        .bind(chrono::Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| GatewayError::database(e, format!("Failed to upsert flag '{}'", name)))?;

        self.find(name).await?.ok_or_else(|| GatewayError::not_found("feature_flag", name))
    }

    #[instrument(skip(self), fields(flag = %flag_name, tenant_id = %tenant_id), name = "db_get_override")]
    pub async fn find_override(
        &self,
        flag_name: &str,
        tenant_id: &TenantId,
    ) -> Result<Option<FeatureOverride>> {
        let row = sqlx::query_as::<_, OverrideRow>(
            "SELECT flag_name, tenant_id, enabled, expires_at, reason, created_at \
             FROM feature_overrides WHERE flag_name = ? AND tenant_id = ?",
        )
        .bind(flag_name)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| GatewayError::database(e, "Failed to load flag override"))?;

        Ok(row.map(FeatureOverride::from))
    }

    pub async fn set_override(
        &self,
        flag_name: &str,
        tenant_id: &TenantId,
        definition: &OverrideDefinition,
    ) -> Result<FeatureOverride> {
        let now = chrono::Utc::now();
        sqlx::query(
            "INSERT INTO feature_overrides (flag_name, tenant_id, enabled, expires_at, reason, created_at) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT(flag_name, tenant_id) DO UPDATE SET enabled = excluded.enabled, \
             expires_at = excluded.expires_at, reason = excluded.reason, created_at = excluded.created_at",
        )
        .bind(flag_name)
        .bind(tenant_id)
        .bind(definition.enabled)
        .bind(definition.expires_at)
        .bind(definition.reason.as_deref())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_foreign_key_violation() {
                    return GatewayError::not_found("feature_flag", flag_name);
                }
            }
            GatewayError::database(e, "Failed to set flag override")
        })?;

        Ok(FeatureOverride {
            flag_name: flag_name.to_string(),
            tenant_id: tenant_id.clone(),
            enabled: definition.enabled,
            expires_at: definition.expires_at,
            reason: definition.reason.clone(),
            created_at: now,
        })
    }

    pub async fn clear_override(&self, flag_name: &str, tenant_id: &TenantId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM feature_overrides WHERE flag_name = ? AND tenant_id = ?")
            .bind(flag_name)
            .bind(tenant_id)
            .execute(&self.pool)
            .await
            .map_err(|e| GatewayError::database(e, "Failed to clear flag override"))?;

        Ok(result.rows_affected() > 0)
    }
}
