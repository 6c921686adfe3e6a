//! Centralized configuration for the token lifecycle core.
//!
//! All configuration is loaded from environment variables and validated
//! before any component is built.

use crate::error::TokenError;
use std::env;
use std::time::Duration;

/// Signing algorithm for newly generated keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningAlgorithm {
    /// HMAC with SHA-256
    HS256,
    /// Ed25519
    EdDSA,
}

impl SigningAlgorithm {
    /// Parse algorithm from string.
    pub fn parse(s: &str) -> Result<Self, TokenError> {
        match s.to_uppercase().as_str() {
            "HS256" => Ok(Self::HS256),
            "EDDSA" | "ED25519" => Ok(Self::EdDSA),
            _ => Err(TokenError::config(format!("Invalid signing algorithm: {s}"))),
        }
    }

    /// Algorithm name for the JWS header.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::HS256 => "HS256",
            Self::EdDSA => "EdDSA",
        }
    }

    /// Matching `jsonwebtoken` algorithm.
    #[must_use]
    pub const fn jwt_algorithm(&self) -> jsonwebtoken::Algorithm {
        match self {
            Self::HS256 => jsonwebtoken::Algorithm::HS256,
            Self::EdDSA => jsonwebtoken::Algorithm::EdDSA,
        }
    }
}

/// Token lifecycle configuration.
#[derive(Debug, Clone)]
pub struct Config {
    // JWT settings
    /// `iss` claim
    pub jwt_issuer: String,
    /// `aud` claim
    pub jwt_audience: String,
    /// Access token TTL
    pub access_token_ttl: Duration,
    /// Refresh token TTL
    pub refresh_token_ttl: Duration,

    // Signing keys
    /// Algorithm for generated keys
    pub signing_algorithm: SigningAlgorithm,
    /// How often the scheduler rotates the current key
    pub key_rotation_interval: Duration,
    /// How long a retired key keeps verifying
    pub key_grace_period: Duration,
    /// Upper bound on retired keys kept in the snapshot
    pub max_retired_keys: usize,

    // Lockout
    /// Consecutive failures that lock an account
    pub lockout_threshold: u32,
    /// Window in which failures are counted
    pub lockout_window: Duration,

    // Storage
    /// Default deadline for store calls
    pub store_timeout: Duration,
    /// Redis URL; in-memory store when absent
    pub redis_url: Option<String>,
    /// Key prefix for Redis records
    pub key_prefix: String,

    // Logging
    /// Log level filter
    pub log_level: String,
    /// Emit JSON logs
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        let refresh_token_ttl = Duration::from_secs(604_800);
        Self {
            jwt_issuer: "auth-platform".to_string(),
            jwt_audience: "api".to_string(),
            access_token_ttl: Duration::from_secs(900),
            refresh_token_ttl,
            signing_algorithm: SigningAlgorithm::HS256,
            key_rotation_interval: Duration::from_secs(86_400),
            key_grace_period: refresh_token_ttl,
            max_retired_keys: 8,
            lockout_threshold: 5,
            lockout_window: Duration::from_secs(900),
            store_timeout: Duration::from_millis(2000),
            redis_url: None,
            key_prefix: "token-lifecycle".to_string(),
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but invalid, or the
    /// resulting configuration fails [`Config::validate`].
    pub fn from_env() -> Result<Self, TokenError> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let refresh_token_ttl = Duration::from_secs(parse_env(
            "REFRESH_TOKEN_TTL",
            defaults.refresh_token_ttl.as_secs(),
        )?);

        let config = Self {
            jwt_issuer: env::var("JWT_ISSUER").unwrap_or(defaults.jwt_issuer),
            jwt_audience: env::var("JWT_AUDIENCE").unwrap_or(defaults.jwt_audience),
            access_token_ttl: Duration::from_secs(parse_env(
                "ACCESS_TOKEN_TTL",
                defaults.access_token_ttl.as_secs(),
            )?),
            refresh_token_ttl,
            signing_algorithm: match env::var("SIGNING_ALGORITHM") {
                Ok(alg) => SigningAlgorithm::parse(&alg)?,
                Err(_) => defaults.signing_algorithm,
            },
            key_rotation_interval: Duration::from_secs(parse_env(
                "KEY_ROTATION_INTERVAL",
                defaults.key_rotation_interval.as_secs(),
            )?),
            key_grace_period: Duration::from_secs(parse_env(
                "KEY_GRACE_PERIOD",
                refresh_token_ttl.as_secs(),
            )?),
            max_retired_keys: parse_env("MAX_RETIRED_KEYS", defaults.max_retired_keys)?,
            lockout_threshold: parse_env("LOCKOUT_THRESHOLD", defaults.lockout_threshold)?,
            lockout_window: Duration::from_secs(parse_env(
                "LOCKOUT_WINDOW",
                defaults.lockout_window.as_secs(),
            )?),
            store_timeout: Duration::from_millis(parse_env(
                "STORE_TIMEOUT_MS",
                u64::try_from(defaults.store_timeout.as_millis()).unwrap_or(2000),
            )?),
            redis_url: env::var("REDIS_URL").ok().filter(|url| !url.is_empty()),
            key_prefix: env::var("KEY_PREFIX").unwrap_or(defaults.key_prefix),
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_json: parse_env("LOG_JSON", defaults.log_json)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Config`] describing the first violated rule.
    pub fn validate(&self) -> Result<(), TokenError> {
        if self.access_token_ttl.is_zero() || self.refresh_token_ttl.is_zero() {
            return Err(TokenError::config("token TTLs must be non-zero"));
        }
        if self.refresh_token_ttl < self.access_token_ttl {
            return Err(TokenError::config(
                "REFRESH_TOKEN_TTL must not be shorter than ACCESS_TOKEN_TTL",
            ));
        }
        if self.key_grace_period < self.access_token_ttl {
            return Err(TokenError::config(
                "KEY_GRACE_PERIOD must cover at least one ACCESS_TOKEN_TTL",
            ));
        }
        if self.key_rotation_interval.is_zero() {
            return Err(TokenError::config("KEY_ROTATION_INTERVAL must be non-zero"));
        }
        if self.key_grace_period.as_millis()
            >= self.key_rotation_interval.as_millis() * self.max_retired_keys as u128
        {
            return Err(TokenError::config(
                "MAX_RETIRED_KEYS must exceed KEY_GRACE_PERIOD / KEY_ROTATION_INTERVAL",
            ));
        }
        if self.lockout_threshold == 0 {
            return Err(TokenError::config("LOCKOUT_THRESHOLD must be at least 1"));
        }
        if self.store_timeout.is_zero() {
            return Err(TokenError::config("STORE_TIMEOUT_MS must be non-zero"));
        }
        if self.key_grace_period < self.refresh_token_ttl {
            tracing::warn!(
                grace_secs = self.key_grace_period.as_secs(),
                refresh_ttl_secs = self.refresh_token_ttl.as_secs(),
                "Key grace period shorter than refresh TTL; refresh tokens may outlive their key"
            );
        }
        Ok(())
    }
}

/// Parse environment variable with default value.
fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T, TokenError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(val) => val
            .parse()
            .map_err(|e| TokenError::config(format!("Invalid {name}: {e}"))),
        Err(_) => Ok(default),
    }
}
