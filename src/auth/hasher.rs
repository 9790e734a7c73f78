//! One-way hashing for passwords, PINs, and one-time codes.
//!
//! Secrets are stored only as salted Argon2id PHC strings with a fixed work
//! factor; verification parses the digest and delegates the comparison to the
//! primitive.

use anyhow::Result;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use rand::rngs::OsRng;

#[derive(Clone, Copy, Debug, Default)]
pub struct SecretHasher;

impl SecretHasher {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Hash a secret into a PHC digest string.
    ///
    /// # Errors
    ///
    /// Returns an error if the hashing primitive fails.
    pub fn hash(&self, secret: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let digest = Argon2::default()
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|_| anyhow::anyhow!("failed to hash secret"))?
            .to_string();
        Ok(digest)
    }

    /// Verify a secret against a stored digest.
    ///
    /// Malformed digests verify as `false` rather than erroring; a stored
    /// digest that cannot be parsed must never authenticate anything.
    #[must_use]
    pub fn verify(&self, secret: &str, digest: &str) -> bool {
        PasswordHash::new(digest).is_ok_and(|parsed| {
            Argon2::default()
                .verify_password(secret.as_bytes(), &parsed)
                .is_ok()
        })
    }
}
