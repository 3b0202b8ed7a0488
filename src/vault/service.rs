//! Tenant-scoped secret storage.

use crate::domain::{SecretId, TenantId};
use crate::errors::{GatewayError, Result};
use crate::storage::repositories::{NewSealedSecret, SecretRepository, TenantRepository};
use crate::storage::DbPool;
use crate::usage::UsageRecorder;
use crate::vault::encryption::{SealedSecret, SecretCipher};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use zeroize::Zeroizing;

/// Placeholder shown instead of any stored value
pub const MASKED_VALUE: &str = "********";

/// Longest accepted normalized name
pub const MAX_SECRET_NAME_LEN: usize = 64;

/// Largest accepted plaintext value
pub const MAX_SECRET_VALUE_BYTES: usize = 16 * 1024;

/// Normalize a secret name: uppercase ASCII, every other character becomes `_`.
///
/// `openai-api-key` and `OPENAI_API_KEY` name the same secret.
pub fn normalize_secret_name(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(GatewayError::validation_field("Secret name cannot be empty", "name"));
    }

    let normalized: String = trimmed
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();

    if normalized.len() > MAX_SECRET_NAME_LEN {
        return Err(GatewayError::validation_field(
            format!("Secret name must be at most {} characters", MAX_SECRET_NAME_LEN),
            "name",
        ));
    }

    Ok(normalized)
}

fn binding(tenant_id: &TenantId, name: &str) -> Vec<u8> {
    format!("{}:{}", tenant_id, name).into_bytes()
}

/// Metadata returned when a secret is created
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoredSecret {
    pub id: SecretId,
    pub name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Listing entry; never carries the value
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MaskedSecret {
    pub id: SecretId,
    pub name: String,
    pub value: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone)]
pub struct SecretVault {
    secrets: SecretRepository,
    tenants: TenantRepository,
    cipher: SecretCipher,
    usage: UsageRecorder,
}

impl SecretVault {
    pub fn new(pool: DbPool, cipher: SecretCipher) -> Self {
        Self {
            secrets: SecretRepository::new(pool.clone()),
            tenants: TenantRepository::new(pool.clone()),
            usage: UsageRecorder::new(pool),
            cipher,
        }
    }

    /// Encrypt and persist a secret under the tenant's plan quota
    #[instrument(skip(self, plaintext), fields(tenant_id = %tenant_id, secret_name = %name))]
    pub async fn store(&self, tenant_id: &TenantId, name: &str, plaintext: &str) -> Result<StoredSecret> {
        let name = normalize_secret_name(name)?;
        if plaintext.is_empty() {
            return Err(GatewayError::validation_field("Secret value cannot be empty", "value"));
        }
        if plaintext.len() > MAX_SECRET_VALUE_BYTES {
            return Err(GatewayError::validation_field(
                format!("Secret value must be at most {} bytes", MAX_SECRET_VALUE_BYTES),
                "value",
            ));
        }

        let tenant = self.tenants.get(tenant_id).await?;
        let quota = tenant.plan_tier.secret_quota();

        let sealed = self.cipher.seal(plaintext.as_bytes(), &binding(tenant_id, &name))?;
        let id = SecretId::new();
        let created_at = chrono::Utc::now();

        self.secrets
            .insert_within_quota(
                NewSealedSecret {
                    id: id.clone(),
                    tenant_id,
                    name: &name,
                    ciphertext: sealed.ciphertext,
                    nonce: sealed.nonce,
                    salt: sealed.salt,
                    key_version: self.cipher.key_version(),
                    created_at,
                },
                quota,
            )
            .await?;

        info!(secret_id = %id, secret_name = %name, "Stored secret");
        self.usage
            .record_audit(tenant_id, "secret.created", serde_json::json!({ "name": name }))
            .await;

        Ok(StoredSecret { id, name, created_at })
    }

    /// Decrypt a secret for outbound injection. Never exposed over the API.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, secret_name = %name))]
    pub async fn retrieve(&self, tenant_id: &TenantId, name: &str) -> Result<Option<Zeroizing<String>>> {
        let name = normalize_secret_name(name)?;
        let Some(row) = self.secrets.find(tenant_id, &name).await? else {
            return Ok(None);
        };

        let sealed = SealedSecret { ciphertext: row.ciphertext, nonce: row.nonce, salt: row.salt };
        let plaintext = self.cipher.open(&sealed, &binding(tenant_id, &name))?;
        let value = std::str::from_utf8(&plaintext)
            .map_err(|_| GatewayError::internal("Stored secret is not valid UTF-8"))?;

        Ok(Some(Zeroizing::new(value.to_string())))
    }

    /// Names and creation times, values masked
    pub async fn list(&self, tenant_id: &TenantId) -> Result<Vec<MaskedSecret>> {
        let rows = self.secrets.list_metadata(tenant_id).await?;
        Ok(rows
            .into_iter()
            .map(|row| MaskedSecret {
                id: SecretId::from_string(row.id),
                name: row.name,
                value: MASKED_VALUE.to_string(),
                created_at: row.created_at,
            })
            .collect())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, secret_name = %name))]
    pub async fn delete(&self, tenant_id: &TenantId, name: &str) -> Result<()> {
        let name = normalize_secret_name(name)?;
        if !self.secrets.delete(tenant_id, &name).await? {
            return Err(GatewayError::not_found("secret", name));
        }

        info!(secret_name = %name, "Deleted secret");
        self.usage
            .record_audit(tenant_id, "secret.deleted", serde_json::json!({ "name": name }))
            .await;
        Ok(())
    }
}
