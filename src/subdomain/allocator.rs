//! Fallback subdomain allocation for app publishing.

use rand::{distributions::Uniform, rngs::OsRng, Rng};
use tracing::{debug, instrument};

use crate::domain::{AppId, TenantId};
use crate::errors::Result;
use crate::policy::SHORT_SUBDOMAIN_THRESHOLD;
use crate::storage::repositories::SubdomainClaim;
use crate::subdomain::arbiter::SubdomainArbiter;
use crate::subdomain::validation::{slugify, MAX_SUBDOMAIN_LEN};

pub const MAX_ATTEMPTS: usize = 5;
pub const SUFFIX_LEN: usize = 4;
const SUFFIX_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Base used when a name has no usable characters, e.g. "日本語"
const FALLBACK_BASE: &str = "app";

/// Random `[a-z0-9]` suffix
pub fn random_suffix() -> String {
    let dist = Uniform::from(0..SUFFIX_ALPHABET.len());
    OsRng.sample_iter(dist).take(SUFFIX_LEN).map(|i| SUFFIX_ALPHABET[i] as char).collect()
}

fn with_suffix(base: &str) -> String {
    let keep = MAX_SUBDOMAIN_LEN - SUFFIX_LEN - 1;
    let base = if base.len() > keep { base[..keep].trim_end_matches('-') } else { base };
    let base = if base.is_empty() { FALLBACK_BASE } else { base };
    format!("{}-{}", base, random_suffix())
}

#[derive(Debug, Clone)]
pub struct SubdomainAllocator {
    arbiter: SubdomainArbiter,
}

impl SubdomainAllocator {
    pub fn new(arbiter: SubdomainArbiter) -> Self {
        Self { arbiter }
    }

    /// Try `preferred` (or a name derived from `app_name`), then suffixed
    /// variants while the failure is a taken or reserved name.
    ///
    /// `Ok(None)` means every attempt collided; the app stays reachable by slug.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, app_id = %app_id))]
    pub async fn allocate(
        &self,
        tenant_id: &TenantId,
        app_id: &AppId,
        app_name: &str,
        preferred: Option<&str>,
    ) -> Result<Option<SubdomainClaim>> {
        let base = match preferred {
            Some(explicit) => explicit.trim().to_ascii_lowercase(),
            None => match slugify(app_name) {
                slug if slug.is_empty() => FALLBACK_BASE.to_string(),
                slug => slug,
            },
        };

        // Derived names too short to stand alone start suffixed
        let mut candidate = if preferred.is_none() && base.len() < SHORT_SUBDOMAIN_THRESHOLD {
            with_suffix(&base)
        } else {
            base.clone()
        };

        for attempt in 1..=MAX_ATTEMPTS {
            match self.arbiter.claim(tenant_id, &candidate, app_id).await {
                Ok(claim) => return Ok(Some(claim)),
                Err(e) if e.is_claim_retryable() => {
                    debug!(attempt, candidate = %candidate, reason = e.kind(), "Subdomain candidate rejected");
                    candidate = with_suffix(&slugify(&base));
                }
                Err(e) => return Err(e),
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PlanTier;
    use crate::policy::PolicyEvaluator;
    use crate::storage::repositories::AppRepository;
    use crate::storage::test_helpers::TestDatabase;
    use crate::subdomain::validation::normalize_subdomain;

    #[test]
    fn suffix_shape() {
        let suffix = random_suffix();
        assert_eq!(suffix.len(), SUFFIX_LEN);
        assert!(suffix.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()));
    }

    #[test]
    fn suffixed_names_stay_valid() {
        let long = "a".repeat(70);
        assert!(normalize_subdomain(&with_suffix(&long)).is_ok());
        assert!(normalize_subdomain(&with_suffix("chat")).is_ok());
    }

    #[test]
    fn suffixed_names_clear_the_short_name_gate() {
        for base in ["", "a", "chat"] {
            assert!(with_suffix(base).len() >= SHORT_SUBDOMAIN_THRESHOLD, "{:?}", base);
        }
        assert!(with_suffix("").starts_with("app-"));
    }

    async fn setup() -> (TestDatabase, SubdomainAllocator, TenantId) {
        let db = TestDatabase::new().await;
        let tenant = db.seed_tenant("acme", PlanTier::Free).await;
        let arbiter = SubdomainArbiter::new(db.pool.clone(), PolicyEvaluator::new(db.pool.clone()));
        (db, SubdomainAllocator::new(arbiter), tenant)
    }

    #[tokio::test]
    async fn taken_name_gets_suffix() {
        let (db, allocator, tenant) = setup().await;
        let apps = AppRepository::new(db.pool.clone());
        let first = apps.create(&tenant, "Weather Bot", "weather-bot-1111").await.unwrap();
        let second = apps.create(&tenant, "Weather Bot", "weather-bot-2222").await.unwrap();

        let a = allocator.allocate(&tenant, &first.id, &first.name, None).await.unwrap().unwrap();
        assert_eq!(a.subdomain, "weather-bot");

        let b = allocator.allocate(&tenant, &second.id, &second.name, None).await.unwrap().unwrap();
        assert!(b.subdomain.starts_with("weather-bot-"));
        assert_eq!(b.subdomain.len(), "weather-bot-".len() + SUFFIX_LEN);
    }

    #[tokio::test]
    async fn unsluggable_name_still_gets_a_subdomain_on_free_plan() {
        let (db, allocator, tenant) = setup().await;
        let apps = AppRepository::new(db.pool.clone());

        for (name, slug) in [("日本語", "app-5555"), ("!!!", "app-6666")] {
            let app = apps.create(&tenant, name, slug).await.unwrap();
            let claim = allocator.allocate(&tenant, &app.id, &app.name, None).await.unwrap().unwrap();
            assert!(claim.subdomain.starts_with("app-"), "{}", claim.subdomain);
            assert!(claim.subdomain.len() >= SHORT_SUBDOMAIN_THRESHOLD);
        }
    }

    #[tokio::test]
    async fn reserved_preference_falls_back() {
        let (db, allocator, tenant) = setup().await;
        let app = AppRepository::new(db.pool.clone()).create(&tenant, "Docs", "docs-3333").await.unwrap();

        let claim = allocator.allocate(&tenant, &app.id, &app.name, Some("docs")).await.unwrap().unwrap();
        assert!(claim.subdomain.starts_with("docs-"));
    }

    #[tokio::test]
    async fn app_with_subdomain_is_not_retried() {
        let (db, allocator, tenant) = setup().await;
        let app = AppRepository::new(db.pool.clone()).create(&tenant, "Notes", "notes-4444").await.unwrap();
        allocator.allocate(&tenant, &app.id, &app.name, Some("my-notes")).await.unwrap();

        let err = allocator.allocate(&tenant, &app.id, &app.name, Some("other-notes")).await.unwrap_err();
        assert_eq!(err.status_code(), 409);
    }
}
