//! Boundary payloads and the validation steps that type them.
//!
//! Each field runs through a fixed list of steps; the first failing step
//! rejects the request with [`TokenError::InvalidRequest`]. Token structure
//! is left to the core so it reports `Malformed` consistently.

use crate::error::TokenError;
use crate::jwt::MAX_TOKEN_LEN;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;
use zeroize::Zeroizing;

/// Longest accepted username, in bytes.
pub const MAX_USERNAME_LEN: usize = 256;
/// Longest accepted secret, in bytes.
pub const MAX_SECRET_LEN: usize = 1024;

/// One validation step applied to a named field.
pub type Step = fn(&'static str, &str) -> Result<(), TokenError>;

const USERNAME_STEPS: &[Step] = &[
    require_non_empty,
    within_max_len::<MAX_USERNAME_LEN>,
    no_control_chars,
];
const SECRET_STEPS: &[Step] = &[require_non_empty, within_max_len::<MAX_SECRET_LEN>];
/// Empty or whitespace-only tokens stop here as `InvalidRequest`, never `Malformed`.
const TOKEN_STEPS: &[Step] = &[
    require_non_empty,
    within_max_len::<MAX_TOKEN_LEN>,
    no_whitespace,
];

/// Rejects an empty value.
pub fn require_non_empty(field: &'static str, value: &str) -> Result<(), TokenError> {
    if value.is_empty() {
        return Err(TokenError::invalid_request(field, "must not be empty"));
    }
    Ok(())
}

/// Rejects a value longer than `MAX` bytes.
pub fn within_max_len<const MAX: usize>(field: &'static str, value: &str) -> Result<(), TokenError> {
    if value.len() > MAX {
        return Err(TokenError::invalid_request(
            field,
            format!("must be at most {MAX} bytes"),
        ));
    }
    Ok(())
}

/// Rejects control characters.
pub fn no_control_chars(field: &'static str, value: &str) -> Result<(), TokenError> {
    if value.chars().any(char::is_control) {
        return Err(TokenError::invalid_request(field, "contains control characters"));
    }
    Ok(())
}

/// Rejects any whitespace.
pub fn no_whitespace(field: &'static str, value: &str) -> Result<(), TokenError> {
    if value.chars().any(char::is_whitespace) {
        return Err(TokenError::invalid_request(field, "contains whitespace"));
    }
    Ok(())
}

fn run_steps(field: &'static str, value: &str, steps: &[Step]) -> Result<(), TokenError> {
    steps.iter().try_for_each(|step| step(field, value))
}

/// Decode a JSON body into a raw payload.
///
/// # Errors
///
/// Returns `InvalidRequest` if the body is not the expected JSON object.
pub fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, TokenError> {
    serde_json::from_slice(body).map_err(|e| TokenError::invalid_request("body", e.to_string()))
}

/// Authenticate body as received.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAuthenticateRequest {
    /// Login name
    #[serde(default)]
    pub username: String,
    /// Plain secret
    #[serde(default)]
    pub secret: String,
}

impl fmt::Debug for RawAuthenticateRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawAuthenticateRequest")
            .field("username", &self.username)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Validate body as received.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawValidateRequest {
    /// Compact access token
    #[serde(default)]
    pub access_token: String,
}

/// Body shared by refresh and logout.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRefreshRequest {
    /// Compact refresh token
    #[serde(default)]
    pub refresh_token: String,
}

/// Authenticate request that passed the pipeline.
pub struct AuthenticateRequest {
    username: String,
    secret: Zeroizing<String>,
}

impl AuthenticateRequest {
    /// Login name.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Plain secret; zeroized on drop.
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for AuthenticateRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticateRequest")
            .field("username", &self.username)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl TryFrom<RawAuthenticateRequest> for AuthenticateRequest {
    type Error = TokenError;

    fn try_from(raw: RawAuthenticateRequest) -> Result<Self, Self::Error> {
        let secret = Zeroizing::new(raw.secret);
        run_steps("username", &raw.username, USERNAME_STEPS)?;
        run_steps("secret", &secret, SECRET_STEPS)?;
        Ok(AuthenticateRequest {
            username: raw.username,
            secret,
        })
    }
}

/// Validate request that passed the pipeline.
#[derive(Debug, Clone)]
pub struct ValidateRequest {
    access_token: String,
}

impl ValidateRequest {
    /// Access token to check.
    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}

impl TryFrom<RawValidateRequest> for ValidateRequest {
    type Error = TokenError;

    fn try_from(raw: RawValidateRequest) -> Result<Self, Self::Error> {
        run_steps("accessToken", &raw.access_token, TOKEN_STEPS)?;
        Ok(ValidateRequest {
            access_token: raw.access_token,
        })
    }
}

/// A typed refresh token payload, used by both refresh and logout.
#[derive(Debug, Clone)]
pub struct RefreshRequest {
    refresh_token: String,
}

impl RefreshRequest {
    /// Refresh token to exchange or revoke.
    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }
}

impl TryFrom<RawRefreshRequest> for RefreshRequest {
    type Error = TokenError;

    fn try_from(raw: RawRefreshRequest) -> Result<Self, Self::Error> {
        run_steps("refreshToken", &raw.refresh_token, TOKEN_STEPS)?;
        Ok(RefreshRequest {
            refresh_token: raw.refresh_token,
        })
    }
}
