//! Usage and audit record repository
//!
//! Append-only. Proxy invocations and administrative actions share one table,
//! distinguished by `kind`.

use crate::domain::{AppId, TenantId, UsageRecordId};
use crate::errors::{GatewayError, Result};
use crate::storage::DbPool;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tracing::instrument;
use utoipa::ToSchema;

/// Record category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UsageKind {
    Proxy,
    Audit,
}

impl UsageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageKind::Proxy => "proxy",
            UsageKind::Audit => "audit",
        }
    }
}

/// New record to append
#[derive(Debug, Clone)]
pub struct NewUsageRecord {
    pub kind: UsageKind,
    pub tenant_id: TenantId,
    pub app_id: Option<AppId>,
    pub action: String,
    pub endpoint: Option<String>,
    /// HTTP status, `0` when no upstream response was received
    pub status: u16,
    pub duration_ms: u64,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, FromRow)]
struct UsageRow {
    pub id: String,
    pub kind: String,
    pub tenant_id: String,
    pub app_id: Option<String>,
    pub action: String,
    pub endpoint: Option<String>,
    pub status: i64,
    pub duration_ms: i64,
    pub metadata: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub id: UsageRecordId,
    pub kind: UsageKind,
    pub tenant_id: TenantId,
    pub app_id: Option<AppId>,
    pub action: String,
    pub endpoint: Option<String>,
    pub status: u16,
    pub duration_ms: u64,
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<UsageRow> for UsageRecord {
    fn from(row: UsageRow) -> Self {
        let kind = if row.kind == "audit" { UsageKind::Audit } else { UsageKind::Proxy };
        let metadata = row
            .metadata
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or(serde_json::Value::Null);

        Self {
            id: UsageRecordId::from_string(row.id),
            kind,
            tenant_id: TenantId::from_string(row.tenant_id),
            app_id: row.app_id.map(AppId::from_string),
            action: row.action,
            endpoint: row.endpoint,
            status: u16::try_from(row.status).unwrap_or(0),
            duration_ms: u64::try_from(row.duration_ms).unwrap_or(0),
            metadata,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UsageRepository {
    pool: DbPool,
}

impl UsageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, record), fields(tenant_id = %record.tenant_id, action = %record.action, kind = record.kind.as_str()), name = "db_insert_usage")]
    pub async fn insert(&self, record: &NewUsageRecord) -> Result<UsageRecordId> {
        let id = UsageRecordId::new();
        let metadata = serde_json::to_string(&record.metadata)?;

        sqlx::query(
            "INSERT INTO usage_records (id, kind, tenant_id, app_id, action, endpoint, status, duration_ms, metadata, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(record.kind.as_str())
        .bind(&record.tenant_id)
        .bind(record.app_id.as_ref())
        .bind(&record.action)
        .bind(record.endpoint.as_deref())
        .bind(i64::from(record.status))
        .bind(i64::try_from(record.duration_ms).unwrap_or(i64::MAX))
        .bind(metadata)
        .bind(chrono::Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| GatewayError::database(e, "Failed to write usage record"))?;

        Ok(id)
    }

    /// Most recent records for a tenant, newest first
    pub async fn list_recent(&self, tenant_id: &TenantId, limit: u32) -> Result<Vec<UsageRecord>> {
        let rows = sqlx::query_as::<_, UsageRow>(
            "SELECT id, kind, tenant_id, app_id, action, endpoint, status, duration_ms, metadata, created_at \
             FROM usage_records WHERE tenant_id = ? ORDER BY created_at DESC, rowid DESC LIMIT ?",
        )
        .bind(tenant_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GatewayError::database(e, "Failed to list usage records"))?;

        Ok(rows.into_iter().map(UsageRecord::from).collect())
    }

    #[cfg(test)]
    pub async fn count(&self, tenant_id: &TenantId, kind: UsageKind) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM usage_records WHERE tenant_id = ? AND kind = ?")
            .bind(tenant_id)
            .bind(kind.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| GatewayError::database(e, "Failed to count usage records"))
    }
}
