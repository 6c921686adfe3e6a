//! Builder for access token claims.

use crate::error::TokenError;
use crate::jwt::claims::{AccessClaims, TokenType};

/// Assembles [`AccessClaims`] with a fresh `jti`.
pub struct AccessClaimsBuilder {
    issuer: String,
    subject: Option<String>,
    audience: Vec<String>,
    issued_at: i64,
    ttl_seconds: i64,
    family_root_id: Option<String>,
}

impl AccessClaimsBuilder {
    /// Start claims issued by `issuer` at `issued_at` (Unix seconds).
    pub fn new(issuer: impl Into<String>, issued_at: i64) -> Self {
        AccessClaimsBuilder {
            issuer: issuer.into(),
            subject: None,
            audience: Vec::new(),
            issued_at,
            ttl_seconds: 900, // 15 minutes default
            family_root_id: None,
        }
    }

    /// Required subject.
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Audience list.
    pub fn audience(mut self, audience: Vec<String>) -> Self {
        self.audience = audience;
        self
    }

    /// Lifetime; defaults to 15 minutes.
    pub fn ttl_seconds(mut self, ttl: i64) -> Self {
        self.ttl_seconds = ttl;
        self
    }

    /// Family the token is bound to.
    pub fn family_root_id(mut self, family_root_id: Option<String>) -> Self {
        self.family_root_id = family_root_id;
        self
    }

    /// Finish the claims.
    ///
    /// # Errors
    ///
    /// Returns an error if no subject was set.
    pub fn build(self) -> Result<AccessClaims, TokenError> {
        let subject = self
            .subject
            .filter(|s| !s.is_empty())
            .ok_or_else(|| TokenError::internal("subject is required"))?;

        Ok(AccessClaims {
            iss: self.issuer,
            sub: subject,
            aud: self.audience,
            iat: self.issued_at,
            exp: self.issued_at.saturating_add(self.ttl_seconds),
            jti: uuid::Uuid::new_v4().to_string(),
            typ: TokenType::Access,
            fid: self.family_root_id,
        })
    }
}
