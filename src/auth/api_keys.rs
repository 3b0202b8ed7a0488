//! Tenant API keys of the form `kr_<id>.<secret>`.

use std::sync::Arc;

use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use serde::{Deserialize, Serialize};
use tracing::{field, info, instrument};
use utoipa::ToSchema;

use crate::auth::{hashing, models::AuthError};
use crate::domain::{ApiKeyId, TenantId};
use crate::errors::{GatewayError, Result};
use crate::storage::repositories::{ApiKeyData, ApiKeyRepository, ApiKeySummary, TenantRepository};
use crate::storage::DbPool;
use crate::usage::UsageRecorder;

pub const API_KEY_PREFIX: &str = "kr_";
const SECRET_LENGTH: usize = 48;

/// Returned once at issue time; the plaintext key is not recoverable afterwards
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssuedApiKey {
    pub id: ApiKeyId,
    pub name: String,
    pub key: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Clone)]
pub struct ApiKeyService {
    keys: ApiKeyRepository,
    tenants: TenantRepository,
    usage: UsageRecorder,
    argon2: Arc<Argon2<'static>>,
}

impl ApiKeyService {
    pub fn new(pool: DbPool) -> Result<Self> {
        let argon2 = hashing::password_hasher()
            .map_err(|e| GatewayError::config(format!("Invalid Argon2 parameters: {}", e)))?;
        Ok(Self {
            keys: ApiKeyRepository::new(pool.clone()),
            tenants: TenantRepository::new(pool.clone()),
            usage: UsageRecorder::new(pool),
            argon2: Arc::new(argon2),
        })
    }

    /// Mint a new key for an existing tenant
    #[instrument(skip(self), fields(tenant_id = %tenant_id, key_name = %name))]
    pub async fn issue(&self, tenant_id: &TenantId, name: &str) -> Result<IssuedApiKey> {
        let name = name.trim();
        if name.is_empty() || name.len() > 100 {
            return Err(GatewayError::validation_field(
                "Key name must be between 1 and 100 characters",
                "name",
            ));
        }
        self.tenants.get(tenant_id).await?;

        let id = ApiKeyId::new();
        let secret = generate_secret();
        let salt = SaltString::generate(&mut OsRng);
        let hashed = self
            .argon2
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| GatewayError::internal(format!("Failed to hash API key: {}", e)))?
            .to_string();

        let stored = self.keys.create(&id, tenant_id, name, &hashed).await?;

        info!(api_key_id = %id, "Issued API key");
        self.usage
            .record_audit(
                tenant_id,
                "api_key.issued",
                serde_json::json!({ "apiKeyId": id.as_str(), "name": name }),
            )
            .await;

        Ok(IssuedApiKey {
            key: format!("{}{}.{}", API_KEY_PREFIX, id, secret),
            id,
            name: stored.name,
            created_at: stored.created_at,
        })
    }

    /// Verify a presented key and return its record.
    ///
    /// Lookup is by id; the secret half is argon2-verified against the stored hash.
    #[instrument(skip(self, presented), fields(api_key_id = field::Empty))]
    pub async fn authenticate(&self, presented: &str) -> std::result::Result<ApiKeyData, AuthError> {
        let (id, secret) = parse_api_key(presented)?;
        tracing::Span::current().record("api_key_id", id.as_str());

        let record = self.keys.find(&id).await?.ok_or(AuthError::InvalidApiKey)?;

        if record.is_revoked() {
            return Err(AuthError::RevokedApiKey);
        }

        let parsed_hash = PasswordHash::new(&record.hashed_secret)
            .map_err(|_| AuthError::MalformedCredential("stored api key hash"))?;
        if self.argon2.verify_password(secret.as_bytes(), &parsed_hash).is_err() {
            return Err(AuthError::InvalidApiKey);
        }

        self.keys.touch_last_used(&record.id).await?;
        Ok(record)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, api_key_id = %id))]
    pub async fn revoke(&self, tenant_id: &TenantId, id: &ApiKeyId) -> Result<()> {
        if !self.keys.revoke(tenant_id, id).await? {
            return Err(GatewayError::not_found("api_key", id.as_str()));
        }
        self.usage
            .record_audit(tenant_id, "api_key.revoked", serde_json::json!({ "apiKeyId": id.as_str() }))
            .await;
        Ok(())
    }

    pub async fn list(&self, tenant_id: &TenantId) -> Result<Vec<ApiKeySummary>> {
        let keys = self.keys.list_for_tenant(tenant_id).await?;
        Ok(keys.iter().map(ApiKeySummary::from).collect())
    }
}

fn generate_secret() -> String {
    OsRng.sample_iter(&Alphanumeric).take(SECRET_LENGTH).map(char::from).collect()
}

/// Split `kr_<id>.<secret>` into its halves
fn parse_api_key(presented: &str) -> std::result::Result<(ApiKeyId, &str), AuthError> {
    let stripped = presented
        .trim()
        .strip_prefix(API_KEY_PREFIX)
        .ok_or(AuthError::MalformedCredential("api key"))?;

    let mut parts = stripped.splitn(2, '.');
    let id = parts.next().filter(|id| !id.is_empty());
    let secret = parts.next().filter(|secret| !secret.is_empty());

    match (id, secret) {
        (Some(id), Some(secret)) => {
            let id = ApiKeyId::parse(id).map_err(|_| AuthError::MalformedCredential("api key"))?;
            Ok((id, secret))
        }
        _ => Err(AuthError::MalformedCredential("api key")),
    }
}
