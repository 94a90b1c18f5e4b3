//! Argon2id password hashing.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("invalid credentials")]
    InvalidCredentials,
}

/// Hash a plaintext password with a fresh random salt (PHC string output).
pub fn hash_password(plaintext: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| PasswordError::Hash(e.to_string()))
}

/// Verify a plaintext password against a stored PHC hash.
///
/// A malformed stored hash and a mismatch are indistinguishable to the caller.
pub fn verify_password(plaintext: &str, stored: &str) -> Result<(), PasswordError> {
    let parsed = PasswordHash::new(stored).map_err(|_| PasswordError::InvalidCredentials)?;
    Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .map_err(|_| PasswordError::InvalidCredentials)
}
