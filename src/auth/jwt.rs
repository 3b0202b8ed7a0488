//! HS256 bearer tokens naming a tenant.

use crate::auth::models::AuthError;
use crate::config::AuthConfig;
use crate::domain::TenantId;
use crate::errors::{GatewayError, Result};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Tenant id
    pub sub: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

/// A freshly issued token
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

/// Issues and verifies bearer tokens
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    expiry: chrono::Duration,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[config.jwt_issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            issuer: config.jwt_issuer.clone(),
            expiry: chrono::Duration::seconds(config.token_expiry_seconds as i64),
        }
    }

    /// Sign a token for `tenant_id` valid for the configured lifetime
    pub fn issue(&self, tenant_id: &TenantId) -> Result<IssuedToken> {
        self.issue_with_expiry(tenant_id, self.expiry)
    }

    pub(crate) fn issue_with_expiry(
        &self,
        tenant_id: &TenantId,
        lifetime: chrono::Duration,
    ) -> Result<IssuedToken> {
        let now = chrono::Utc::now();
        let expires_at = now + lifetime;
        let claims = Claims {
            sub: tenant_id.to_string(),
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| GatewayError::internal(format!("Failed to sign token: {}", e)))?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Verify signature, issuer and expiry and return the claims
    pub fn verify(&self, token: &str) -> std::result::Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidToken)
    }
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer").field("issuer", &self.issuer).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(&AuthConfig::default())
    }

    #[test]
    fn issue_and_verify() {
        let tenant = TenantId::new();
        let issued = issuer().issue(&tenant).unwrap();
        let claims = issuer().verify(&issued.token).unwrap();
        assert_eq!(claims.sub, tenant.as_str());
        assert_eq!(claims.iss, "keyrelay");
    }

    #[test]
    fn expired_token_rejected() {
        let issued =
            issuer().issue_with_expiry(&TenantId::new(), chrono::Duration::seconds(-10)).unwrap();
        assert!(matches!(issuer().verify(&issued.token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn wrong_secret_rejected() {
        let issued = issuer().issue(&TenantId::new()).unwrap();
        let other = TokenIssuer::new(&AuthConfig {
            jwt_secret: "another-signing-secret-that-is-long-enough".into(),
            ..Default::default()
        });
        assert!(other.verify(&issued.token).is_err());
    }

    #[test]
    fn wrong_issuer_rejected() {
        let issued = issuer().issue(&TenantId::new()).unwrap();
        let other =
            TokenIssuer::new(&AuthConfig { jwt_issuer: "someone-else".into(), ..Default::default() });
        assert!(other.verify(&issued.token).is_err());
    }

    #[test]
    fn garbage_rejected() {
        assert!(issuer().verify("not.a.jwt").is_err());
    }
}
