//! Claims carried by access and refresh tokens.

use serde::{Deserialize, Serialize};

/// Which kind of credential a token is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Short-lived bearer credential
    Access,
    /// Long-lived, single-use credential for obtaining a new pair
    Refresh,
}

/// Claims every signed token carries.
pub trait TokenClaims {
    /// Declared token type.
    fn token_type(&self) -> TokenType;

    /// Expiry as Unix seconds.
    fn expires_at(&self) -> i64;
}

/// Access token claims.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessClaims {
    /// Issuer
    pub iss: String,
    /// Subject
    pub sub: String,
    /// Audience
    pub aud: Vec<String>,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expiry (Unix seconds, exclusive)
    pub exp: i64,
    /// Token id
    pub jti: String,
    /// Always `access`
    pub typ: TokenType,

    /// Family root id; enables revocation of the whole session lineage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fid: Option<String>,
}

impl AccessClaims {
    /// The authenticated subject.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.sub
    }

    /// Family this token is bound to, if any.
    #[must_use]
    pub fn family_root_id(&self) -> Option<&str> {
        self.fid.as_deref()
    }

    /// Whether the token is unexpired at `timestamp`.
    pub fn is_valid_at(&self, timestamp: i64) -> bool {
        timestamp < self.exp
    }
}

impl TokenClaims for AccessClaims {
    fn token_type(&self) -> TokenType {
        self.typ
    }

    fn expires_at(&self) -> i64 {
        self.exp
    }
}

/// Refresh token claims. `jti` is the id of the persisted record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshClaims {
    /// Issuer
    pub iss: String,
    /// Subject
    pub sub: String,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expiry (Unix seconds, exclusive)
    pub exp: i64,
    /// Record id
    pub jti: String,
    /// Family root id
    pub fid: String,
    /// Always `refresh`
    pub typ: TokenType,
}

impl TokenClaims for RefreshClaims {
    fn token_type(&self) -> TokenType {
        self.typ
    }

    fn expires_at(&self) -> i64 {
        self.exp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_claim_omitted_when_absent() {
        let claims = AccessClaims {
            iss: "issuer".to_string(),
            sub: "user-123".to_string(),
            aud: vec!["api".to_string()],
            iat: 100,
            exp: 1000,
            jti: "j".to_string(),
            typ: TokenType::Access,
            fid: None,
        };

        let json = serde_json::to_string(&claims).unwrap();
        assert!(!json.contains("fid"));
        assert!(json.contains(r#""typ":"access""#));
    }

    #[test]
    fn test_expiry_is_exclusive() {
        let claims = AccessClaims {
            iss: "issuer".to_string(),
            sub: "user-123".to_string(),
            aud: Vec::new(),
            iat: 100,
            exp: 1000,
            jti: "j".to_string(),
            typ: TokenType::Access,
            fid: Some("family".to_string()),
        };

        assert!(claims.is_valid_at(999));
        assert!(!claims.is_valid_at(1000));
        assert_eq!(claims.family_root_id(), Some("family"));
    }
}
