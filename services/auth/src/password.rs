//! Password hashing and verification with Argon2id

use std::sync::Arc;

use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::{self, SaltString},
};
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("invalid argon2 parameters: {0}")]
    InvalidParams(String),

    #[error("failed to hash password: {0}")]
    Hashing(String),

    #[error("stored password hash is malformed: {0}")]
    MalformedHash(String),
}

/// Argon2 work factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PasswordSettings {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordSettings {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

#[cfg(any(test, feature = "testing"))]
impl PasswordSettings {
    /// Cheapest parameters argon2 accepts, to keep tests fast.
    pub fn cheap() -> Self {
        Self {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        }
    }
}

/// Hashes new passwords and checks login attempts against stored hashes.
#[derive(Clone)]
pub struct CredentialVerifier {
    argon2: Argon2<'static>,
    // Checked when the account does not exist, so an unknown username costs
    // the same as a wrong password.
    dummy_hash: Arc<str>,
}

impl CredentialVerifier {
    pub fn new(settings: PasswordSettings) -> Result<Self, CredentialError> {
        let params = Params::new(
            settings.memory_kib,
            settings.iterations,
            settings.parallelism,
            None,
        )
        .map_err(|e| CredentialError::InvalidParams(e.to_string()))?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let mut verifier = Self {
            argon2,
            dummy_hash: Arc::from(""),
        };
        verifier.dummy_hash = Arc::from(verifier.hash("memri-dummy-password")?);
        Ok(verifier)
    }

    /// Hash a plaintext password with a fresh random salt. Returns a PHC string.
    pub fn hash(&self, plaintext: &str) -> Result<String, CredentialError> {
        let salt = SaltString::generate(&mut rand::thread_rng());
        let hash = self
            .argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| CredentialError::Hashing(e.to_string()))?;
        Ok(hash.to_string())
    }

    /// Check a plaintext password against a stored PHC hash.
    ///
    /// A wrong password is `Ok(false)`; only a hash that cannot be parsed is
    /// an error. The parameters embedded in the hash are used, so hashes
    /// made under an older work factor keep verifying.
    pub fn verify(&self, plaintext: &str, hash: &str) -> Result<bool, CredentialError> {
        let parsed =
            PasswordHash::new(hash).map_err(|e| CredentialError::MalformedHash(e.to_string()))?;

        match self.argon2.verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(CredentialError::MalformedHash(e.to_string())),
        }
    }

    /// Burn the same work as a real verification. Always false.
    pub fn verify_dummy(&self, plaintext: &str) -> bool {
        let _ = self.verify(plaintext, &self.dummy_hash);
        false
    }
}
