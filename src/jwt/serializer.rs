//! Compact JWS encoding and the shared decode/expiry/signature pipeline.

use crate::clock::Clock;
use crate::error::TokenError;
use crate::jwt::claims::{TokenClaims, TokenType};
use crate::keys::{SigningKey, SigningKeyManager};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Tokens longer than this are rejected before any decoding.
pub const MAX_TOKEN_LEN: usize = 8 * 1024;

const SUPPORTED_ALGORITHMS: &[&str] = &["HS256", "EdDSA"];

/// JWS protected header.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JwsHeader {
    /// Algorithm name; informational only
    pub alg: String,
    /// Always `JWT`
    pub typ: String,
    /// Id of the signing key
    pub kid: String,
}

/// A freshly signed token.
#[derive(Debug, Clone)]
pub struct EncodedToken {
    /// Compact serialization
    pub token: String,
    /// Key that produced the signature
    pub key_id: String,
    /// Base64url signature
    pub signature: String,
}

/// A token that passed structure, expiry and signature checks.
#[derive(Debug, Clone)]
pub struct Verified<C> {
    /// Decoded header
    pub header: JwsHeader,
    /// Decoded claims
    pub claims: C,
}

/// A token split into its parts; nothing has been verified yet.
struct Parsed<'a, C> {
    header: JwsHeader,
    claims: C,
    signing_input: &'a str,
    signature: &'a str,
}

/// Signs claims with the current key and verifies tokens against the key set.
pub struct JwsSerializer {
    keys: Arc<SigningKeyManager>,
    clock: Arc<dyn Clock>,
}

impl JwsSerializer {
    /// Serializer over `keys`, judging expiry by `clock`.
    pub fn new(keys: Arc<SigningKeyManager>, clock: Arc<dyn Clock>) -> Self {
        JwsSerializer { keys, clock }
    }

    /// The key manager.
    pub fn keys(&self) -> &Arc<SigningKeyManager> {
        &self.keys
    }

    /// Sign `claims` with the current key.
    ///
    /// The key is pinned once so the `kid` in the header always names the
    /// key that produced the signature, even across a concurrent rotation.
    pub fn serialize<C: Serialize>(&self, claims: &C) -> Result<EncodedToken, TokenError> {
        let key = self.keys.current();
        Self::serialize_with(claims, &key)
    }

    /// Sign `claims` with an explicit key.
    pub fn serialize_with<C: Serialize>(
        claims: &C,
        key: &SigningKey,
    ) -> Result<EncodedToken, TokenError> {
        let header = JwsHeader {
            alg: key.algorithm().as_str().to_string(),
            typ: "JWT".to_string(),
            kid: key.key_id().to_string(),
        };

        let header = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);
        let signing_input = format!("{header}.{payload}");
        let signature = key.sign(signing_input.as_bytes())?;

        Ok(EncodedToken {
            token: format!("{signing_input}.{signature}"),
            key_id: key.key_id().to_string(),
            signature,
        })
    }

    /// Decode and verify a token in the fixed order: structure
    /// (`Malformed`), expiry (`Expired`), signature (`SignatureInvalid`).
    pub fn deserialize<C>(&self, token: &str, expected: TokenType) -> Result<Verified<C>, TokenError>
    where
        C: DeserializeOwned + TokenClaims,
    {
        let parsed = Self::parse::<C>(token, expected)?;

        if self.clock.timestamp() >= parsed.claims.expires_at() {
            return Err(TokenError::Expired);
        }

        // The key's own algorithm is used for verification; the header
        // `alg` is never trusted to pick one.
        if !self.keys.verify(
            parsed.signing_input.as_bytes(),
            parsed.signature,
            &parsed.header.kid,
        ) {
            return Err(TokenError::SignatureInvalid);
        }

        Ok(Verified {
            header: parsed.header,
            claims: parsed.claims,
        })
    }

    fn parse<C>(token: &str, expected: TokenType) -> Result<Parsed<'_, C>, TokenError>
    where
        C: DeserializeOwned + TokenClaims,
    {
        if token.is_empty() {
            return Err(TokenError::malformed("empty token"));
        }
        if token.len() > MAX_TOKEN_LEN {
            return Err(TokenError::malformed("token too large"));
        }

        let mut parts = token.split('.');
        let (Some(header_b64), Some(payload_b64), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::malformed("expected three segments"));
        };
        if header_b64.is_empty() || payload_b64.is_empty() || signature.is_empty() {
            return Err(TokenError::malformed("empty segment"));
        }

        let header: JwsHeader = decode_segment(header_b64, "header")?;
        if header.kid.is_empty() {
            return Err(TokenError::malformed("missing key id"));
        }
        if !SUPPORTED_ALGORITHMS.contains(&header.alg.as_str()) {
            return Err(TokenError::malformed("unsupported algorithm"));
        }

        let claims: C = decode_segment(payload_b64, "payload")?;
        if claims.token_type() != expected {
            return Err(TokenError::malformed("unexpected token type"));
        }

        let signing_input = &token[..header_b64.len() + 1 + payload_b64.len()];
        Ok(Parsed {
            header,
            claims,
            signing_input,
            signature,
        })
    }
}

fn decode_segment<T: DeserializeOwned>(segment: &str, what: &str) -> Result<T, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| TokenError::malformed(format!("{what} is not base64url")))?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::malformed(format!("{what} is not valid JSON")))
}
