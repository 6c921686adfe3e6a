//! Username and secret checks with lockout.

use crate::clock::Clock;
use crate::config::Config;
use crate::credentials::hasher::SecretHasher;
use crate::credentials::lockout::LockoutTracker;
use crate::credentials::store::{IdentityStore, Subject};
use crate::deadline::Deadline;
use crate::error::TokenError;
use crate::metrics;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use zeroize::Zeroizing;

/// Verifies username/secret pairs and enforces lockout.
pub struct CredentialValidator {
    identities: Arc<dyn IdentityStore>,
    hasher: Arc<SecretHasher>,
    lockout: LockoutTracker,
    clock: Arc<dyn Clock>,
}

impl CredentialValidator {
    /// Validator over `identities`.
    pub fn new(
        identities: Arc<dyn IdentityStore>,
        hasher: Arc<SecretHasher>,
        lockout: LockoutTracker,
        clock: Arc<dyn Clock>,
    ) -> Self {
        CredentialValidator {
            identities,
            hasher,
            lockout,
            clock,
        }
    }

    /// Validator with lockout settings from `config`.
    pub fn from_config(
        config: &Config,
        identities: Arc<dyn IdentityStore>,
        hasher: Arc<SecretHasher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::new(
            identities,
            hasher,
            LockoutTracker::new(config.lockout_threshold, config.lockout_window),
            clock,
        )
    }

    /// Failure tracker.
    pub fn lockout(&self) -> &LockoutTracker {
        &self.lockout
    }

    /// Check `secret` for `username`.
    ///
    /// Unknown usernames and wrong secrets fail identically. A locked
    /// account fails with `AccountLocked` without the secret being checked.
    #[instrument(skip(self, secret, deadline), fields(username = %username))]
    pub async fn authenticate(
        &self,
        username: &str,
        secret: &str,
        deadline: &Deadline,
    ) -> Result<Subject, TokenError> {
        if self.lockout.is_locked(username, self.clock.now()) {
            metrics::record_auth_attempt("locked");
            warn!(username = %username, "Authentication attempt on locked account");
            return Err(TokenError::AccountLocked);
        }

        let credential = deadline
            .run(self.identities.find_credential(username))
            .await?;

        let hasher = Arc::clone(&self.hasher);
        let secret = Zeroizing::new(secret.to_string());
        let stored_hash = credential.as_ref().map(|c| c.secret_hash.clone());
        let verified = tokio::task::spawn_blocking(move || match stored_hash {
            Some(hash) => hasher.verify(&secret, &hash),
            None => hasher.verify_dummy(&secret),
        })
        .await
        .map_err(|e| TokenError::internal(format!("secret verification task failed: {e}")))?;

        match credential {
            Some(_) if verified && !self.lockout.record_success(username, self.clock.now()) => {
                metrics::record_auth_attempt("locked");
                warn!(username = %username, "Account locked while authentication was in flight");
                Err(TokenError::AccountLocked)
            }
            Some(credential) if verified => {
                metrics::record_auth_attempt("success");
                debug!(subject = %credential.subject, "Authenticated");
                Ok(credential.subject)
            }
            _ => {
                metrics::record_auth_attempt("failure");
                if self.lockout.record_failure(username, self.clock.now()) {
                    metrics::record_security_event("ACCOUNT_LOCKED");
                    warn!(
                        username = %username,
                        failures = self.lockout.failures(username),
                        "Account locked after repeated authentication failures"
                    );
                }
                Err(TokenError::InvalidCredentials)
            }
        }
    }
}
