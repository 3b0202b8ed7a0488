//! Feature flag data types.

use crate::domain::{PlanTier, TenantId};
use crate::policy::rules::Rule;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Flag that gates subdomains shorter than [`SHORT_SUBDOMAIN_THRESHOLD`]
pub const SHORT_SUBDOMAINS_FLAG: &str = "short_subdomains";

/// Subdomains below this length consult [`SHORT_SUBDOMAINS_FLAG`]
pub const SHORT_SUBDOMAIN_THRESHOLD: usize = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlag {
    pub name: String,
    pub description: String,
    pub enabled: bool,
    pub rollout_percentage: u8,
    pub min_plan_tier: Option<PlanTier>,
    pub rule: Option<Rule>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FeatureOverride {
    pub flag_name: String,
    pub tenant_id: TenantId,
    pub enabled: bool,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    pub reason: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl FeatureOverride {
    pub fn is_active_at(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        self.expires_at.map_or(true, |expires| expires > now)
    }
}

/// Which step of evaluation produced the answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationSource {
    Override,
    CustomRule,
    PlanTier,
    Rollout,
}

impl EvaluationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluationSource::Override => "override",
            EvaluationSource::CustomRule => "custom_rule",
            EvaluationSource::PlanTier => "plan_tier",
            EvaluationSource::Rollout => "rollout",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Evaluation {
    pub flag: String,
    pub enabled: bool,
    pub source: EvaluationSource,
}

/// Admin upsert of a flag definition
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FlagDefinition {
    #[serde(default)]
    pub description: String,
    pub enabled: bool,
    #[validate(range(max = 100, message = "Rollout percentage must be between 0 and 100"))]
    pub rollout_percentage: u8,
    #[serde(default)]
    pub min_plan_tier: Option<PlanTier>,
    #[serde(default)]
    pub rule: Option<Rule>,
}

/// Admin override of a flag for one tenant
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OverrideDefinition {
    pub enabled: bool,
    #[serde(default)]
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    #[validate(length(max = 500, message = "Reason must be at most 500 characters"))]
    pub reason: Option<String>,
}
