//! Signing key material.

use crate::config::SigningAlgorithm;
use crate::error::TokenError;
use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey};
use rand::RngCore;
use ring::rand::SystemRandom;
use ring::signature::{Ed25519KeyPair, KeyPair};
use std::fmt;
use zeroize::Zeroizing;

/// HMAC secret length in bytes.
const HMAC_SECRET_LEN: usize = 64;

/// One signing key with its validity window.
///
/// `valid_until` is `None` while the key is current; retiring the key
/// stamps the end of its grace period.
#[derive(Clone)]
pub struct SigningKey {
    key_id: String,
    algorithm: SigningAlgorithm,
    material: Zeroizing<Vec<u8>>,
    encoding: EncodingKey,
    decoding: DecodingKey,
    valid_from: DateTime<Utc>,
    valid_until: Option<DateTime<Utc>>,
}

impl SigningKey {
    /// Generate fresh key material.
    ///
    /// # Errors
    ///
    /// Returns an error if the system RNG fails to produce an Ed25519 key.
    pub fn generate(
        algorithm: SigningAlgorithm,
        valid_from: DateTime<Utc>,
    ) -> Result<Self, TokenError> {
        let material = match algorithm {
            SigningAlgorithm::HS256 => {
                let mut secret = Zeroizing::new(vec![0u8; HMAC_SECRET_LEN]);
                rand::thread_rng().fill_bytes(&mut secret);
                secret
            }
            SigningAlgorithm::EdDSA => {
                let pkcs8 = Ed25519KeyPair::generate_pkcs8(&SystemRandom::new())
                    .map_err(|_| TokenError::internal("Ed25519 key generation failed"))?;
                Zeroizing::new(pkcs8.as_ref().to_vec())
            }
        };
        Self::from_material(
            uuid::Uuid::new_v4().to_string(),
            algorithm,
            material.to_vec(),
            valid_from,
            None,
        )
    }

    /// Rebuild a key from persisted material.
    ///
    /// For `HS256` the material is the raw secret; for `EdDSA` it is the
    /// PKCS#8 document.
    ///
    /// # Errors
    ///
    /// Returns an error if the material cannot be parsed for `algorithm`.
    pub fn from_material(
        key_id: String,
        algorithm: SigningAlgorithm,
        material: Vec<u8>,
        valid_from: DateTime<Utc>,
        valid_until: Option<DateTime<Utc>>,
    ) -> Result<Self, TokenError> {
        let material = Zeroizing::new(material);
        let (encoding, decoding) = match algorithm {
            SigningAlgorithm::HS256 => {
                if material.len() < 32 {
                    return Err(TokenError::config("HS256 secret must be at least 32 bytes"));
                }
                (
                    EncodingKey::from_secret(&material),
                    DecodingKey::from_secret(&material),
                )
            }
            SigningAlgorithm::EdDSA => {
                let pair = Ed25519KeyPair::from_pkcs8(&material)
                    .map_err(|_| TokenError::config("Invalid Ed25519 PKCS#8 document"))?;
                (
                    EncodingKey::from_ed_der(&material),
                    DecodingKey::from_ed_der(pair.public_key().as_ref()),
                )
            }
        };

        Ok(Self {
            key_id,
            algorithm,
            material,
            encoding,
            decoding,
            valid_from,
            valid_until,
        })
    }

    /// Key identifier placed in the `kid` header.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Algorithm of this key.
    #[must_use]
    pub const fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    /// Raw material, for persisting the key set.
    #[must_use]
    pub fn material(&self) -> &[u8] {
        &self.material
    }

    /// Start of the validity window.
    #[must_use]
    pub const fn valid_from(&self) -> DateTime<Utc> {
        self.valid_from
    }

    /// End of the validity window, if the key has been retired.
    #[must_use]
    pub const fn valid_until(&self) -> Option<DateTime<Utc>> {
        self.valid_until
    }

    /// Whether signatures made with this key are still acceptable at `now`.
    #[must_use]
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_from <= now && self.valid_until.map_or(true, |until| now <= until)
    }

    /// Copy of this key demoted to verify-only until `until`.
    #[must_use]
    pub fn retired_until(&self, until: DateTime<Utc>) -> Self {
        let mut retired = self.clone();
        retired.valid_until = Some(match self.valid_until {
            Some(existing) if existing < until => existing,
            _ => until,
        });
        retired
    }

    /// Sign `payload`, returning the base64url signature.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying primitive rejects the key.
    pub fn sign(&self, payload: &[u8]) -> Result<String, TokenError> {
        jsonwebtoken::crypto::sign(payload, &self.encoding, self.algorithm.jwt_algorithm())
            .map_err(|e| TokenError::internal(format!("signing failed: {e}")))
    }

    /// Check a base64url signature over `payload`.
    #[must_use]
    pub fn verify(&self, payload: &[u8], signature: &str) -> bool {
        jsonwebtoken::crypto::verify(
            signature,
            payload,
            &self.decoding,
            self.algorithm.jwt_algorithm(),
        )
        .unwrap_or(false)
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("key_id", &self.key_id)
            .field("algorithm", &self.algorithm)
            .field("valid_from", &self.valid_from)
            .field("valid_until", &self.valid_until)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_hs256_sign_verify() {
        let key = SigningKey::generate(SigningAlgorithm::HS256, Utc::now()).unwrap();
        let sig = key.sign(b"header.payload").unwrap();
        assert!(key.verify(b"header.payload", &sig));
        assert!(!key.verify(b"header.payloaD", &sig));
    }

    #[test]
    fn test_eddsa_sign_verify() {
        let key = SigningKey::generate(SigningAlgorithm::EdDSA, Utc::now()).unwrap();
        let sig = key.sign(b"header.payload").unwrap();
        assert!(key.verify(b"header.payload", &sig));
        assert!(!key.verify(b"header.payload", "AAAA"));
    }

    #[test]
    fn test_restore_from_material() {
        let key = SigningKey::generate(SigningAlgorithm::EdDSA, Utc::now()).unwrap();
        let sig = key.sign(b"data").unwrap();

        let restored = SigningKey::from_material(
            key.key_id().to_string(),
            key.algorithm(),
            key.material().to_vec(),
            key.valid_from(),
            None,
        )
        .unwrap();
        assert!(restored.verify(b"data", &sig));
    }

    #[test]
    fn test_short_hmac_secret_rejected() {
        let result = SigningKey::from_material(
            "k".to_string(),
            SigningAlgorithm::HS256,
            vec![1; 8],
            Utc::now(),
            None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_retired_window_inclusive() {
        let now = Utc::now();
        let key = SigningKey::generate(SigningAlgorithm::HS256, now).unwrap();
        let until = crate::clock::add_duration(now, Duration::from_secs(60));
        let retired = key.retired_until(until);

        assert!(retired.is_usable_at(until));
        assert!(!retired.is_usable_at(until + chrono::Duration::seconds(1)));
    }

    #[test]
    fn test_debug_redacts_material() {
        let key = SigningKey::generate(SigningAlgorithm::HS256, Utc::now()).unwrap();
        let rendered = format!("{key:?}");
        assert!(rendered.contains(key.key_id()));
        assert!(!rendered.contains("material"));
    }
}
