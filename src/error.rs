//! Error taxonomy for the token lifecycle core.
//!
//! Every failure crosses the boundary as a [`TokenError`]. The boundary maps
//! [`ErrorCode`] to its own transport representation; the core never
//! produces transport status codes.

use std::time::Duration;
use thiserror::Error;

/// Errors returned by the token lifecycle operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TokenError {
    /// Unknown username or wrong secret.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Too many consecutive failures inside the lockout window.
    #[error("Account locked")]
    AccountLocked,

    /// Token is structurally invalid.
    #[error("Token malformed: {reason}")]
    Malformed {
        /// What was wrong with the token
        reason: String,
    },

    /// Token expiry has passed.
    #[error("Token expired")]
    Expired,

    /// Signature did not verify against any usable key.
    #[error("Token signature invalid")]
    SignatureInvalid,

    /// Token or its family has been revoked.
    #[error("Token revoked")]
    Revoked,

    /// A refresh token was presented after it had already been rotated.
    #[error("Refresh token reused - replay detected")]
    ReplayDetected,

    /// Backing store failed or could not be reached.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// A store call exceeded the caller's deadline.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Boundary payload rejected by the request pipeline.
    #[error("Invalid request: {field}: {reason}")]
    InvalidRequest {
        /// Offending field
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (details never exposed).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TokenError {
    /// Create a malformed-token error.
    #[must_use]
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }

    /// Create a store-unavailable error.
    #[must_use]
    pub fn store(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    /// Create a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create an invalid-request error.
    #[must_use]
    pub fn invalid_request(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            field,
            reason: reason.into(),
        }
    }

    /// Stable code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidCredentials => ErrorCode::InvalidCredentials,
            Self::AccountLocked => ErrorCode::AccountLocked,
            Self::Malformed { .. } => ErrorCode::Malformed,
            Self::Expired => ErrorCode::Expired,
            Self::SignatureInvalid => ErrorCode::SignatureInvalid,
            Self::Revoked => ErrorCode::Revoked,
            Self::ReplayDetected => ErrorCode::ReplayDetected,
            Self::StoreUnavailable(_) => ErrorCode::StoreUnavailable,
            Self::Timeout(_) => ErrorCode::Timeout,
            Self::InvalidRequest { .. } => ErrorCode::InvalidRequest,
            Self::Config(_) | Self::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Only infrastructure failures are worth retrying.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_) | Self::Timeout(_))
    }

    /// Human-readable message safe to send to a caller.
    ///
    /// Never includes key identifiers, store addresses or parser internals.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::InvalidCredentials => "Invalid username or password".to_string(),
            Self::AccountLocked => "Account temporarily locked".to_string(),
            Self::Malformed { .. } => "Token is malformed".to_string(),
            Self::Expired => "Token has expired".to_string(),
            Self::SignatureInvalid => "Token signature is invalid".to_string(),
            Self::Revoked => "Token has been revoked".to_string(),
            Self::ReplayDetected => {
                "Refresh token reuse detected; session revoked".to_string()
            }
            Self::StoreUnavailable(_) => "Service temporarily unavailable".to_string(),
            Self::Timeout(_) => "Request timed out".to_string(),
            Self::InvalidRequest { field, .. } => format!("Invalid field: {field}"),
            Self::Config(_) | Self::Internal(_) => "Internal error".to_string(),
        }
    }
}

impl From<redis::RedisError> for TokenError {
    fn from(err: redis::RedisError) -> Self {
        TokenError::StoreUnavailable(err.to_string())
    }
}

impl From<argon2::password_hash::Error> for TokenError {
    fn from(err: argon2::password_hash::Error) -> Self {
        TokenError::Internal(format!("secret hashing failed: {err}"))
    }
}

impl From<serde_json::Error> for TokenError {
    fn from(err: serde_json::Error) -> Self {
        TokenError::Internal(format!("serialization failed: {err}"))
    }
}

/// Error codes handed to the boundary layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Wrong username or secret
    InvalidCredentials,
    /// Account locked out
    AccountLocked,
    /// Token malformed
    Malformed,
    /// Token expired
    Expired,
    /// Signature invalid
    SignatureInvalid,
    /// Token revoked
    Revoked,
    /// Refresh token replay
    ReplayDetected,
    /// Store unavailable
    StoreUnavailable,
    /// Deadline exceeded
    Timeout,
    /// Request rejected before reaching the core
    InvalidRequest,
    /// Anything else
    Internal,
}

impl ErrorCode {
    /// String form of the code.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "AUTH_INVALID_CREDENTIALS",
            Self::AccountLocked => "AUTH_ACCOUNT_LOCKED",
            Self::Malformed => "TOKEN_MALFORMED",
            Self::Expired => "TOKEN_EXPIRED",
            Self::SignatureInvalid => "TOKEN_SIGNATURE_INVALID",
            Self::Revoked => "TOKEN_REVOKED",
            Self::ReplayDetected => "TOKEN_REFRESH_REUSED",
            Self::StoreUnavailable => "STORE_UNAVAILABLE",
            Self::Timeout => "TIMEOUT",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::Internal => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(TokenError::store("down").is_retryable());
        assert!(TokenError::Timeout(Duration::from_millis(5)).is_retryable());
        assert!(!TokenError::ReplayDetected.is_retryable());
        assert!(!TokenError::InvalidCredentials.is_retryable());
        assert!(!TokenError::malformed("x").is_retryable());
    }

    #[test]
    fn test_replay_keeps_its_own_code() {
        assert_eq!(TokenError::ReplayDetected.code(), ErrorCode::ReplayDetected);
        assert_ne!(
            TokenError::ReplayDetected.code(),
            TokenError::InvalidCredentials.code()
        );
    }

    #[test]
    fn test_public_message_hides_details() {
        let err = TokenError::store("redis://10.0.0.4:6379 connection refused");
        assert!(!err.public_message().contains("10.0.0.4"));

        let err = TokenError::malformed("unknown kid 3f2a");
        assert!(!err.public_message().contains("3f2a"));
    }

    #[test]
    fn test_error_code_strings() {
        assert_eq!(ErrorCode::Revoked.as_str(), "TOKEN_REVOKED");
        assert_eq!(ErrorCode::ReplayDetected.to_string(), "TOKEN_REFRESH_REUSED");
    }
}
