//! # Usage and Audit Recording
//!
//! Append-only facts about proxy invocations and administrative actions.
//! Recording never fails the request that produced the fact: storage errors
//! are logged and counted, then dropped.

use crate::domain::{AppId, TenantId};
use crate::errors::Result;
use crate::observability::metrics;
use crate::storage::repositories::{NewUsageRecord, UsageKind, UsageRecord, UsageRepository};
use crate::storage::DbPool;
use tracing::{instrument, warn};

/// Maximum number of records returned by [`UsageRecorder::recent`]
pub const MAX_RECENT_LIMIT: u32 = 500;

/// One forwarding invocation
#[derive(Debug, Clone)]
pub struct ProxyUsage {
    pub tenant_id: TenantId,
    pub app_id: Option<AppId>,
    pub target: String,
    pub method: String,
    pub path: String,
    /// Upstream status, `0` when the upstream never answered
    pub status: u16,
    pub duration_ms: u64,
    pub streamed: bool,
    /// Error kind when the invocation failed
    pub error: Option<&'static str>,
}

#[derive(Debug, Clone)]
pub struct UsageRecorder {
    repo: UsageRepository,
}

impl UsageRecorder {
    pub fn new(pool: DbPool) -> Self {
        Self { repo: UsageRepository::new(pool) }
    }

    /// Persist a proxy fact
    #[instrument(skip(self, usage), fields(tenant_id = %usage.tenant_id, target = %usage.target, status = usage.status))]
    pub async fn record_proxy(&self, usage: ProxyUsage) {
        metrics::record_proxy_request(&usage.target, usage.status, usage.duration_ms as f64 / 1000.0);

        let record = NewUsageRecord {
            kind: UsageKind::Proxy,
            tenant_id: usage.tenant_id,
            app_id: usage.app_id,
            action: format!("proxy.{}", usage.target),
            endpoint: Some(usage.path),
            status: usage.status,
            duration_ms: usage.duration_ms,
            metadata: serde_json::json!({
                "method": usage.method,
                "streamed": usage.streamed,
                "error": usage.error,
            }),
        };
        self.persist(record).await;
    }

    /// Persist an administrative or lifecycle action
    #[instrument(skip(self, metadata), fields(tenant_id = %tenant_id, action = %action))]
    pub async fn record_audit(&self, tenant_id: &TenantId, action: &str, metadata: serde_json::Value) {
        let record = NewUsageRecord {
            kind: UsageKind::Audit,
            tenant_id: tenant_id.clone(),
            app_id: None,
            action: action.to_string(),
            endpoint: None,
            status: 0,
            duration_ms: 0,
            metadata,
        };
        self.persist(record).await;
    }

    async fn persist(&self, record: NewUsageRecord) {
        if let Err(e) = self.repo.insert(&record).await {
            metrics::record_usage_write_failure();
            warn!(error = %e, action = %record.action, "Failed to persist usage record");
        }
    }

    /// Recent records of a tenant, newest first; `limit` is clamped to 1..=500
    pub async fn recent(&self, tenant_id: &TenantId, limit: u32) -> Result<Vec<UsageRecord>> {
        self.repo.list_recent(tenant_id, limit.clamp(1, MAX_RECENT_LIMIT)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PlanTier;
    use crate::storage::test_helpers::TestDatabase;
    use tracing_test::traced_test;

    fn usage(tenant: &TenantId, status: u16) -> ProxyUsage {
        ProxyUsage {
            tenant_id: tenant.clone(),
            app_id: None,
            target: "openai".into(),
            method: "POST".into(),
            path: "/v1/chat/completions".into(),
            status,
            duration_ms: 42,
            streamed: false,
            error: None,
        }
    }

    #[tokio::test]
    async fn records_proxy_and_audit_facts() {
        let db = TestDatabase::new().await;
        let tenant = db.seed_tenant("acme", PlanTier::Free).await;
        let recorder = UsageRecorder::new(db.pool.clone());

        recorder.record_proxy(usage(&tenant, 200)).await;
        recorder.record_audit(&tenant, "secret.created", serde_json::json!({ "name": "X" })).await;

        let records = recorder.recent(&tenant, 10).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().any(|r| r.kind == UsageKind::Proxy && r.action == "proxy.openai"));
        assert!(records.iter().any(|r| r.kind == UsageKind::Audit && r.action == "secret.created"));
    }

    #[traced_test]
    #[tokio::test]
    async fn storage_failure_is_swallowed() {
        let db = TestDatabase::new().await;
        let tenant = db.seed_tenant("acme", PlanTier::Free).await;
        let recorder = UsageRecorder::new(db.pool.clone());
        db.pool.close().await;

        // Must not panic or propagate.
        recorder.record_proxy(usage(&tenant, 0)).await;
        assert!(logs_contain("Failed to persist usage record"));
    }

    #[tokio::test]
    async fn recent_clamps_limit() {
        let db = TestDatabase::new().await;
        let tenant = db.seed_tenant("acme", PlanTier::Free).await;
        let recorder = UsageRecorder::new(db.pool.clone());
        recorder.record_proxy(usage(&tenant, 200)).await;
        recorder.record_proxy(usage(&tenant, 500)).await;

        assert_eq!(recorder.recent(&tenant, 0).await.unwrap().len(), 1);
    }
}
