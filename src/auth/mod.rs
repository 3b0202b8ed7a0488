//! # Identity Resolution
//!
//! Turns request credentials into an [`Identity`]: bearer tokens, tenant API
//! keys, or a public app slug/id.

pub mod api_keys;
pub mod hashing;
pub mod identity;
pub mod jwt;
pub mod middleware;
pub mod models;

pub use api_keys::{ApiKeyService, IssuedApiKey};
pub use identity::IdentityResolver;
pub use jwt::{IssuedToken, TokenIssuer};
pub use models::{AuthError, Identity, IdentityMethod};
