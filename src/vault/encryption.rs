//! Secret sealing with AES-256-GCM
//!
//! Every secret gets its own key: HKDF-SHA256 over the process master key with
//! a fresh 16-byte salt. The additional authenticated data binds the ciphertext
//! to its tenant and normalized name, so a row copied to another tenant or
//! renamed in storage fails to open.
//!
//! ## Configuration
//!
//! The master key is `KEYRELAY_MASTER_KEY`, 64 hex characters (32 bytes).
//! Generate one with `openssl rand -hex 32`.

use crate::config::VaultConfig;
use crate::errors::{GatewayError, Result};
use ring::aead::{self, Aad, BoundKey, Nonce, NonceSequence, UnboundKey, AES_256_GCM};
use ring::hkdf;
use ring::rand::{SecureRandom, SystemRandom};
use std::sync::Arc;
use tracing::{debug, error, instrument};
use zeroize::Zeroizing;

/// Size of AES-256-GCM nonce in bytes
pub const NONCE_SIZE: usize = 12;

/// Size of the per-secret HKDF salt in bytes
pub const SALT_SIZE: usize = 16;

/// Size of AES-256-GCM tag in bytes
const TAG_SIZE: usize = 16;

const HKDF_INFO: &[u8] = b"keyrelay-secret-v1";

struct SingleNonce {
    nonce: Option<[u8; NONCE_SIZE]>,
}

impl SingleNonce {
    fn new(nonce_bytes: [u8; NONCE_SIZE]) -> Self {
        Self { nonce: Some(nonce_bytes) }
    }
}

impl NonceSequence for SingleNonce {
    fn advance(&mut self) -> std::result::Result<Nonce, ring::error::Unspecified> {
        self.nonce.take().map(Nonce::assume_unique_for_key).ok_or(ring::error::Unspecified)
    }
}

/// Output of [`SecretCipher::seal`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedSecret {
    /// Ciphertext with the GCM tag appended
    pub ciphertext: Vec<u8>,
    pub nonce: Vec<u8>,
    pub salt: Vec<u8>,
}

/// Seals and opens secret values under the master key
#[derive(Clone)]
pub struct SecretCipher {
    master_key: Arc<Zeroizing<[u8; 32]>>,
    key_version: String,
    rng: Arc<SystemRandom>,
}

impl SecretCipher {
    pub fn new(config: &VaultConfig) -> Result<Self> {
        let key_bytes = Zeroizing::new(hex::decode(config.master_key.trim()).map_err(|e| {
            GatewayError::config(format!("Invalid hex in KEYRELAY_MASTER_KEY: {}", e))
        })?);

        if key_bytes.len() != 32 {
            return Err(GatewayError::config(format!(
                "KEYRELAY_MASTER_KEY must be 32 bytes (256 bits), got {} bytes",
                key_bytes.len()
            )));
        }

        let mut master_key = Zeroizing::new([0u8; 32]);
        master_key.copy_from_slice(&key_bytes);

        debug!(key_version = %config.key_version, "Secret cipher initialized");

        Ok(Self {
            master_key: Arc::new(master_key),
            key_version: config.key_version.clone(),
            rng: Arc::new(SystemRandom::new()),
        })
    }

    /// Cipher with a fixed all-0x42 key for tests
    #[cfg(test)]
    pub fn for_testing() -> Self {
        Self::new(&VaultConfig::default()).expect("default vault config is valid")
    }

    pub fn key_version(&self) -> &str {
        &self.key_version
    }

    fn derive_key(&self, salt: &[u8]) -> Result<UnboundKey> {
        let prk = hkdf::Salt::new(hkdf::HKDF_SHA256, salt).extract(&self.master_key[..]);
        let okm = prk.expand(&[HKDF_INFO], &AES_256_GCM).map_err(|_| {
            error!("HKDF expansion failed");
            GatewayError::internal("Failed to derive secret key")
        })?;
        Ok(UnboundKey::from(okm))
    }

    fn fill_random<const N: usize>(&self) -> Result<[u8; N]> {
        let mut bytes = [0u8; N];
        self.rng.fill(&mut bytes).map_err(|_| {
            error!("System RNG failure");
            GatewayError::internal("Failed to generate random bytes")
        })?;
        Ok(bytes)
    }

    /// Encrypt `plaintext` bound to `aad`
    #[instrument(skip(self, plaintext, aad), fields(plaintext_len = plaintext.len()))]
    pub fn seal(&self, plaintext: &[u8], aad: &[u8]) -> Result<SealedSecret> {
        let salt: [u8; SALT_SIZE] = self.fill_random()?;
        let nonce: [u8; NONCE_SIZE] = self.fill_random()?;

        let mut sealing_key = aead::SealingKey::new(self.derive_key(&salt)?, SingleNonce::new(nonce));

        let mut ciphertext = Vec::with_capacity(plaintext.len() + TAG_SIZE);
        ciphertext.extend_from_slice(plaintext);
        sealing_key.seal_in_place_append_tag(Aad::from(aad), &mut ciphertext).map_err(|_| {
            error!("Encryption failed");
            GatewayError::internal("Failed to encrypt secret")
        })?;

        Ok(SealedSecret { ciphertext, nonce: nonce.to_vec(), salt: salt.to_vec() })
    }

    /// Decrypt a sealed value. Any mismatch in key, salt, nonce, tag or AAD fails.
    #[instrument(skip_all, fields(ciphertext_len = sealed.ciphertext.len()))]
    pub fn open(&self, sealed: &SealedSecret, aad: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        let nonce: [u8; NONCE_SIZE] = sealed.nonce.as_slice().try_into().map_err(|_| {
            GatewayError::internal(format!(
                "Invalid nonce length: expected {} bytes, got {} bytes",
                NONCE_SIZE,
                sealed.nonce.len()
            ))
        })?;

        if sealed.salt.len() != SALT_SIZE {
            return Err(GatewayError::internal(format!(
                "Invalid salt length: expected {} bytes, got {} bytes",
                SALT_SIZE,
                sealed.salt.len()
            )));
        }

        if sealed.ciphertext.len() < TAG_SIZE {
            return Err(GatewayError::internal("Ciphertext too short (missing authentication tag)"));
        }

        let mut opening_key =
            aead::OpeningKey::new(self.derive_key(&sealed.salt)?, SingleNonce::new(nonce));

        let mut buffer = Zeroizing::new(sealed.ciphertext.clone());
        let plaintext_len = opening_key
            .open_in_place(Aad::from(aad), &mut buffer)
            .map_err(|_| {
                error!("Decryption failed - possible tampering or wrong key");
                GatewayError::internal("Failed to decrypt secret - authentication failed")
            })?
            .len();
        buffer.truncate(plaintext_len);

        Ok(buffer)
    }
}

impl std::fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretCipher")
            .field("key_version", &self.key_version)
            .field("master_key", &"[REDACTED]")
            .finish()
    }
}
