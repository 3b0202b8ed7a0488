//! # Secret Vault
//!
//! Encrypted, tenant-scoped storage for upstream credentials. Plaintext leaves
//! the vault only through [`SecretVault::retrieve`], which the forwarding
//! engine uses to build outbound requests.

pub mod encryption;
pub mod service;

pub use encryption::{SealedSecret, SecretCipher};
pub use service::{normalize_secret_name, MaskedSecret, SecretVault, StoredSecret, MASKED_VALUE};
