//! Response bodies returned by the request handlers.

use crate::error::TokenError;
use crate::issuer::TokenPair;
use crate::jwt::AccessClaims;
use serde::Serialize;

/// Body returned by authenticate and refresh.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPairResponse {
    /// Signed access token
    pub access_token: String,
    /// Signed refresh token
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: u64,
    /// Always `Bearer`
    pub token_type: &'static str,
}

impl From<TokenPair> for TokenPairResponse {
    fn from(pair: TokenPair) -> Self {
        TokenPairResponse {
            access_token: pair.access.token,
            refresh_token: pair.refresh.token,
            expires_in: pair.expires_in,
            token_type: "Bearer",
        }
    }
}

/// Body returned by validate.
#[derive(Debug, Clone, Serialize)]
pub struct ValidateResponse {
    /// Always true; failures are errors
    pub valid: bool,
    /// Verified claims
    pub claims: AccessClaims,
}

impl From<AccessClaims> for ValidateResponse {
    fn from(claims: AccessClaims) -> Self {
        ValidateResponse {
            valid: true,
            claims,
        }
    }
}

/// Body returned by logout.
#[derive(Debug, Clone, Serialize)]
pub struct LogoutResponse {
    /// Records revoked
    pub revoked: u64,
}

/// Error body handed to the boundary; carries no internal detail.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    /// Stable error code
    pub code: &'static str,
    /// Caller-safe message
    pub message: String,
}

impl From<&TokenError> for ErrorBody {
    fn from(err: &TokenError) -> Self {
        ErrorBody {
            code: err.code().as_str(),
            message: err.public_message(),
        }
    }
}
