//! Secret repository
//!
//! Persists sealed secret material. Encryption and decryption happen in the
//! vault; this layer only ever sees ciphertext, nonce and salt.

use crate::domain::{SecretId, TenantId};
use crate::errors::{GatewayError, Result};
use crate::storage::DbPool;
use sqlx::FromRow;
use tracing::instrument;

/// Sealed secret as stored
#[derive(Debug, Clone, FromRow)]
pub struct SealedSecretRow {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub ciphertext: Vec<u8>,
    pub nonce: Vec<u8>,
    pub salt: Vec<u8>,
    pub key_version: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Name and timestamp only, for listings
#[derive(Debug, Clone, FromRow)]
pub struct SecretMetadataRow {
    pub id: String,
    pub name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Insert payload for a freshly sealed secret
#[derive(Debug, Clone)]
pub struct NewSealedSecret<'a> {
    pub id: SecretId,
    pub tenant_id: &'a TenantId,
    pub name: &'a str,
    pub ciphertext: Vec<u8>,
    pub nonce: Vec<u8>,
    pub salt: Vec<u8>,
    pub key_version: &'a str,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone)]
pub struct SecretRepository {
    pool: DbPool,
}

impl SecretRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert only while the tenant holds fewer than `quota` secrets.
    ///
    /// The count and the insert are one statement, so two concurrent stores at
    /// `quota - 1` cannot both succeed. Returns `LimitExceeded` when the guard
    /// filtered the row and `Conflict` when the name already exists. An
    /// existing name passes the guard so a duplicate at quota is a `Conflict`.
    #[instrument(skip(self, secret), fields(tenant_id = %secret.tenant_id, secret_name = %secret.name), name = "db_insert_secret")]
    pub async fn insert_within_quota(&self, secret: NewSealedSecret<'_>, quota: u32) -> Result<()> {
        let result = sqlx::query(
            "INSERT INTO secrets (id, tenant_id, name, ciphertext, nonce, salt, key_version, created_at) \
             SELECT ?, ?, ?, ?, ?, ?, ?, ? \
             WHERE (SELECT COUNT(*) FROM secrets WHERE tenant_id = ?) < ? \
             OR EXISTS (SELECT 1 FROM secrets WHERE tenant_id = ? AND name = ?)",
        )
        .bind(&secret.id)
        .bind(secret.tenant_id)
        .bind(secret.name)
        .bind(&secret.ciphertext)
        .bind(&secret.nonce)
        .bind(&secret.salt)
        .bind(secret.key_version)
        .bind(secret.created_at)
        .bind(secret.tenant_id)
        .bind(i64::from(quota))
        .bind(secret.tenant_id)
        .bind(secret.name)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if super::unique_violation_on(&e, "secrets.") {
                return GatewayError::conflict(
                    format!("Secret '{}' already exists", secret.name),
                    "secret",
                );
            }
            tracing::error!(error = %e, secret_name = %secret.name, "Failed to store secret");
            GatewayError::database(e, format!("Failed to store secret '{}'", secret.name))
        })?;

        if result.rows_affected() == 0 {
            return Err(GatewayError::limit_exceeded(
                format!("Secret quota of {} reached", quota),
                quota,
            ));
        }

        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, secret_name = %name), name = "db_find_secret")]
    pub async fn find(&self, tenant_id: &TenantId, name: &str) -> Result<Option<SealedSecretRow>> {
        sqlx::query_as::<_, SealedSecretRow>(
            "SELECT id, tenant_id, name, ciphertext, nonce, salt, key_version, created_at \
             FROM secrets WHERE tenant_id = ? AND name = ?",
        )
        .bind(tenant_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| GatewayError::database(e, format!("Failed to load secret '{}'", name)))
    }

    pub async fn list_metadata(&self, tenant_id: &TenantId) -> Result<Vec<SecretMetadataRow>> {
        sqlx::query_as::<_, SecretMetadataRow>(
            "SELECT id, name, created_at FROM secrets WHERE tenant_id = ? ORDER BY name",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GatewayError::database(e, "Failed to list secrets"))
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, secret_name = %name), name = "db_delete_secret")]
    pub async fn delete(&self, tenant_id: &TenantId, name: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM secrets WHERE tenant_id = ? AND name = ?")
            .bind(tenant_id)
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| GatewayError::database(e, format!("Failed to delete secret '{}'", name)))?;

        Ok(result.rows_affected() > 0)
    }

    #[cfg(test)]
    pub async fn count(&self, tenant_id: &TenantId) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM secrets WHERE tenant_id = ?")
            .bind(tenant_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| GatewayError::database(e, "Failed to count secrets"))
    }
}
