use base64::{engine::general_purpose::STANDARD, Engine};
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::config::MIN_KDF_ITERATIONS;

/// Length of generated salts in bytes.
pub const SALT_LEN: usize = 32;

/// Length of the derived digest in bytes (one SHA-256 block).
pub const DIGEST_LEN: usize = 32;

/// Newtype for password to prevent accidental logging
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(password: String) -> Self {
        Self(password)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Salt and digest as persisted on the identity record (base64).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCredential {
    pub salt: String,
    pub digest: String,
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Stored credential is corrupt: {0}")]
    Corrupt(String),

    #[error("Entropy source unavailable: {0}")]
    EntropyUnavailable(String),
}

/// Salted PBKDF2-HMAC-SHA256 password derivation.
#[derive(Debug, Clone, Copy)]
pub struct CredentialHasher {
    iterations: u32,
}

impl Default for CredentialHasher {
    fn default() -> Self {
        Self::new(MIN_KDF_ITERATIONS)
    }
}

impl CredentialHasher {
    /// Counts below the floor are raised to it.
    pub fn new(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(MIN_KDF_ITERATIONS),
        }
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Derive a digest for `password`, generating a fresh salt when none is given.
    pub fn derive(
        &self,
        password: &Password,
        salt: Option<&[u8]>,
    ) -> Result<StoredCredential, CredentialError> {
        let salt = match salt {
            Some(salt) => salt.to_vec(),
            None => generate_salt()?,
        };
        let digest = self.digest(password, &salt);

        Ok(StoredCredential {
            salt: STANDARD.encode(&salt),
            digest: STANDARD.encode(digest),
        })
    }

    /// Recompute the digest with the stored salt and compare in constant time.
    pub fn verify(
        &self,
        password: &Password,
        stored: &StoredCredential,
    ) -> Result<bool, CredentialError> {
        let salt = STANDARD
            .decode(&stored.salt)
            .map_err(|e| CredentialError::Corrupt(format!("salt: {}", e)))?;
        let expected = STANDARD
            .decode(&stored.digest)
            .map_err(|e| CredentialError::Corrupt(format!("digest: {}", e)))?;

        if salt.is_empty() {
            return Err(CredentialError::Corrupt("salt: empty".to_string()));
        }
        if expected.len() != DIGEST_LEN {
            return Err(CredentialError::Corrupt(format!(
                "digest: expected {} bytes, found {}",
                DIGEST_LEN,
                expected.len()
            )));
        }

        let actual = self.digest(password, &salt);
        Ok(actual.as_slice().ct_eq(expected.as_slice()).into())
    }

    fn digest(&self, password: &Password, salt: &[u8]) -> [u8; DIGEST_LEN] {
        let mut out = [0u8; DIGEST_LEN];
        pbkdf2::pbkdf2_hmac::<Sha256>(
            password.as_str().as_bytes(),
            salt,
            self.iterations,
            &mut out,
        );
        out
    }
}

fn generate_salt() -> Result<Vec<u8>, CredentialError> {
    let mut salt = vec![0u8; SALT_LEN];
    OsRng
        .try_fill_bytes(&mut salt)
        .map_err(|e| CredentialError::EntropyUnavailable(e.to_string()))?;
    Ok(salt)
}
