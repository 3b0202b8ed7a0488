//! Feature flag evaluation.
//!
//! Evaluation reads only from the store. Precedence:
//!
//! 1. an unexpired per-tenant override
//! 2. the flag's structured rule
//! 3. the flag's minimum plan tier
//! 4. the global enabled bit combined with the rollout bucket

use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use crate::domain::TenantId;
use crate::errors::{GatewayError, Result};
use crate::observability::metrics;
use crate::policy::models::{
    Evaluation, EvaluationSource, FeatureFlag, FeatureOverride, FlagDefinition, OverrideDefinition,
};
use crate::policy::rules::{FactValue, Facts, PLAN_TIER_FACT};
use crate::storage::repositories::{FeatureFlagRepository, TenantRepository};
use crate::storage::DbPool;

/// Stable bucket in `0..100` for a tenant and flag
pub fn rollout_bucket(tenant_id: &TenantId, flag_name: &str) -> u8 {
    let digest = Sha256::digest(format!("{}:{}", tenant_id, flag_name).as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(prefix) % 100) as u8
}

#[derive(Debug, Clone)]
pub struct PolicyEvaluator {
    flags: FeatureFlagRepository,
    tenants: TenantRepository,
}

impl PolicyEvaluator {
    pub fn new(pool: DbPool) -> Self {
        Self { flags: FeatureFlagRepository::new(pool.clone()), tenants: TenantRepository::new(pool) }
    }

    /// Evaluate one flag for a tenant. The tenant's plan tier is always added
    /// to `facts` under `plan_tier`, replacing any caller-supplied value.
    #[instrument(skip(self, facts), fields(flag = %flag_name, tenant_id = %tenant_id))]
    pub async fn evaluate(
        &self,
        flag_name: &str,
        tenant_id: &TenantId,
        facts: &Facts,
    ) -> Result<Evaluation> {
        let flag = self
            .flags
            .find(flag_name)
            .await?
            .ok_or_else(|| GatewayError::not_found("feature_flag", flag_name))?;
        let tenant = self.tenants.get(tenant_id).await?;
        let ov = self.flags.find_override(flag_name, tenant_id).await?;

        let mut facts = facts.clone();
        facts.insert(PLAN_TIER_FACT, FactValue::Tier(tenant.plan_tier));

        let evaluation = decide(&flag, tenant_id, ov.as_ref(), &facts, chrono::Utc::now());
        metrics::record_flag_evaluation(flag_name, evaluation.source.as_str(), evaluation.enabled);
        debug!(enabled = evaluation.enabled, source = evaluation.source.as_str(), "Flag evaluated");
        Ok(evaluation)
    }

    /// Evaluate every known flag for a tenant with no extra facts
    pub async fn evaluate_all(&self, tenant_id: &TenantId) -> Result<Vec<Evaluation>> {
        let flags = self.flags.list().await?;
        let mut evaluations = Vec::with_capacity(flags.len());
        for flag in flags {
            evaluations.push(self.evaluate(&flag.name, tenant_id, &Facts::new()).await?);
        }
        Ok(evaluations)
    }

    pub async fn list_flags(&self) -> Result<Vec<FeatureFlag>> {
        self.flags.list().await
    }

    #[instrument(skip(self, definition), fields(flag = %name))]
    pub async fn upsert_flag(&self, name: &str, definition: &FlagDefinition) -> Result<FeatureFlag> {
        validate_flag_name(name)?;
        validator::Validate::validate(definition)?;
        self.flags.upsert(name, definition).await
    }

    #[instrument(skip(self, definition), fields(flag = %flag_name, tenant_id = %tenant_id))]
    pub async fn set_override(
        &self,
        flag_name: &str,
        tenant_id: &TenantId,
        definition: &OverrideDefinition,
    ) -> Result<FeatureOverride> {
        validator::Validate::validate(definition)?;
        self.tenants.get(tenant_id).await?;
        self.flags.set_override(flag_name, tenant_id, definition).await
    }

    pub async fn clear_override(&self, flag_name: &str, tenant_id: &TenantId) -> Result<()> {
        if !self.flags.clear_override(flag_name, tenant_id).await? {
            return Err(GatewayError::not_found(
                "feature_override",
                format!("{}/{}", flag_name, tenant_id),
            ));
        }
        Ok(())
    }
}

fn validate_flag_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= 64
        && name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if !valid {
        return Err(GatewayError::validation_field(
            "Flag names use 1-64 characters of [a-z0-9_]",
            "name",
        ));
    }
    Ok(())
}

fn decide(
    flag: &FeatureFlag,
    tenant_id: &TenantId,
    ov: Option<&FeatureOverride>,
    facts: &Facts,
    now: chrono::DateTime<chrono::Utc>,
) -> Evaluation {
    let (enabled, source) = if let Some(ov) = ov.filter(|ov| ov.is_active_at(now)) {
        (ov.enabled, EvaluationSource::Override)
    } else if let Some(rule) = &flag.rule {
        (rule.evaluate(facts), EvaluationSource::CustomRule)
    } else if flag.min_plan_tier.is_some_and(|min| below_tier(facts, min)) {
        (false, EvaluationSource::PlanTier)
    } else {
        let in_rollout = rollout_bucket(tenant_id, &flag.name) < flag.rollout_percentage;
        (flag.enabled && in_rollout, EvaluationSource::Rollout)
    };

    Evaluation { flag: flag.name.clone(), enabled, source }
}

fn below_tier(facts: &Facts, min: crate::domain::PlanTier) -> bool {
    match facts.get(PLAN_TIER_FACT) {
        Some(FactValue::Tier(tier)) => *tier < min,
        _ => true,
    }
}
