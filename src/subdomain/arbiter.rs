//! Subdomain claim arbitration.
//!
//! Claims go through one conditional insert; the primary key on
//! `subdomain_claims.subdomain` decides between concurrent callers.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::domain::{AppId, TenantId};
use crate::errors::{GatewayError, Result};
use crate::observability::metrics;
use crate::policy::{FactValue, Facts, PolicyEvaluator, SHORT_SUBDOMAINS_FLAG, SHORT_SUBDOMAIN_THRESHOLD};
use crate::storage::repositories::{SubdomainClaim, SubdomainRepository};
use crate::storage::DbPool;
use crate::subdomain::validation::normalize_subdomain;
use crate::usage::UsageRecorder;

pub const SUBDOMAIN_LENGTH_FACT: &str = "subdomain_length";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub subdomain: String,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SubdomainArbiter {
    claims: SubdomainRepository,
    policy: PolicyEvaluator,
    usage: UsageRecorder,
}

impl SubdomainArbiter {
    pub fn new(pool: DbPool, policy: PolicyEvaluator) -> Self {
        Self {
            claims: SubdomainRepository::new(pool.clone()),
            usage: UsageRecorder::new(pool),
            policy,
        }
    }

    /// Claim `subdomain` for an app the tenant owns
    #[instrument(skip(self), fields(tenant_id = %tenant_id, app_id = %app_id))]
    pub async fn claim(
        &self,
        tenant_id: &TenantId,
        subdomain: &str,
        app_id: &AppId,
    ) -> Result<SubdomainClaim> {
        let result = self.try_claim(tenant_id, subdomain, app_id).await;
        metrics::record_subdomain_claim(match &result {
            Ok(_) => "claimed",
            Err(e) => e.kind(),
        });
        result
    }

    async fn try_claim(
        &self,
        tenant_id: &TenantId,
        subdomain: &str,
        app_id: &AppId,
    ) -> Result<SubdomainClaim> {
        let name = normalize_subdomain(subdomain)?;

        if name.len() < SHORT_SUBDOMAIN_THRESHOLD {
            self.ensure_short_names_allowed(tenant_id, &name).await?;
        }

        let claim = self.claims.insert_claim(tenant_id, &name, app_id).await?;

        info!(subdomain = %claim.subdomain, "Subdomain claimed");
        self.usage
            .record_audit(
                tenant_id,
                "subdomain.claimed",
                serde_json::json!({ "subdomain": claim.subdomain, "appId": app_id.as_str() }),
            )
            .await;
        Ok(claim)
    }

    async fn ensure_short_names_allowed(&self, tenant_id: &TenantId, name: &str) -> Result<()> {
        let facts =
            Facts::new().with(SUBDOMAIN_LENGTH_FACT, FactValue::Number(name.len() as f64));
        let allowed = match self.policy.evaluate(SHORT_SUBDOMAINS_FLAG, tenant_id, &facts).await {
            Ok(evaluation) => evaluation.enabled,
            Err(GatewayError::NotFound { .. }) => false,
            Err(e) => return Err(e),
        };

        if !allowed {
            return Err(GatewayError::forbidden_with_hint(
                format!(
                    "Subdomains shorter than {} characters are not available on your plan",
                    SHORT_SUBDOMAIN_THRESHOLD
                ),
                "Upgrade to the Pro plan or choose a longer subdomain",
            ));
        }
        Ok(())
    }

    /// Release a claim held by this tenant.
    ///
    /// A missing claim and another tenant's claim both yield `NotFound`.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn release(&self, tenant_id: &TenantId, subdomain: &str) -> Result<()> {
        let name = subdomain.trim().to_ascii_lowercase();
        if !self.claims.delete_claim(tenant_id, &name).await? {
            return Err(GatewayError::not_found("subdomain", name));
        }

        info!(subdomain = %name, "Subdomain released");
        self.usage
            .record_audit(tenant_id, "subdomain.released", serde_json::json!({ "subdomain": name }))
            .await;
        Ok(())
    }

    pub async fn list(&self, tenant_id: &TenantId) -> Result<Vec<SubdomainClaim>> {
        self.claims.list_for_tenant(tenant_id).await
    }

    /// Public lookup; never reveals who holds a name
    pub async fn check_availability(&self, subdomain: &str) -> Result<Availability> {
        let name = match normalize_subdomain(subdomain) {
            Ok(name) => name,
            Err(GatewayError::Reserved { subdomain }) => {
                return Ok(Availability { subdomain, available: false, reason: Some("reserved".into()) })
            }
            Err(GatewayError::InvalidSubdomain { subdomain, reason }) => {
                return Ok(Availability { subdomain, available: false, reason: Some(reason) })
            }
            Err(e) => return Err(e),
        };

        let taken = self.claims.find(&name).await?.is_some();
        Ok(Availability {
            subdomain: name,
            available: !taken,
            reason: taken.then(|| "taken".to_string()),
        })
    }
}
