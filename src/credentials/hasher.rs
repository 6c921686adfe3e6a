//! Argon2id secret hashing.

use crate::error::TokenError;
use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use rand::rngs::OsRng;

/// Hashes and verifies secrets as Argon2id PHC strings.
#[derive(Debug, Clone)]
pub struct SecretHasher {
    params: Params,
    /// Hash of a fixed secret, verified against when the username is unknown.
    dummy_hash: String,
}

impl SecretHasher {
    /// Hasher with the Argon2 default cost parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if the dummy hash cannot be computed.
    pub fn new() -> Result<Self, TokenError> {
        Self::with_params(Params::default())
    }

    /// Hasher with explicit cost parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if the dummy hash cannot be computed.
    pub fn with_params(params: Params) -> Result<Self, TokenError> {
        let dummy_hash = hash_with(&params, "token-lifecycle-dummy-secret")?;
        Ok(SecretHasher { params, dummy_hash })
    }

    /// Hash `secret` into a PHC string with a random salt.
    ///
    /// # Errors
    ///
    /// Returns an error if Argon2 rejects the input.
    pub fn hash(&self, secret: &str) -> Result<String, TokenError> {
        hash_with(&self.params, secret)
    }

    /// Constant-time check of `secret` against a stored PHC string.
    ///
    /// An unparsable stored hash never verifies. The parameters embedded in
    /// the PHC string take precedence over this hasher's own.
    #[must_use]
    pub fn verify(&self, secret: &str, phc: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(phc) else {
            return false;
        };
        argon2(&self.params)
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok()
    }

    /// Burn the same work as a real verification; always false.
    #[must_use]
    pub fn verify_dummy(&self, secret: &str) -> bool {
        let _ = self.verify(secret, &self.dummy_hash);
        false
    }
}

fn argon2(params: &Params) -> Argon2<'static> {
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params.clone())
}

fn hash_with(params: &Params, secret: &str) -> Result<String, TokenError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = argon2(params)
        .hash_password(secret.as_bytes(), &salt)?
        .to_string();
    Ok(hash)
}

#[cfg(test)]
pub(crate) fn fast_params() -> Params {
    Params::new(1024, 1, 1, None).unwrap()
}
