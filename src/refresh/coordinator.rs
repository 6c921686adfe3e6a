//! Single-use refresh token rotation with replay detection.

use crate::deadline::Deadline;
use crate::error::TokenError;
use crate::issuer::{TokenIssuer, TokenPair};
use crate::jwt::{RefreshClaims, TokenType};
use crate::metrics;
use crate::refresh::record::RefreshTokenRecord;
use crate::refresh::store::{RefreshTokenStore, RotationOutcome};
use crate::retry::RetryPolicy;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// Rotates refresh tokens and detects their reuse.
pub struct RefreshCoordinator {
    issuer: Arc<TokenIssuer>,
    store: Arc<dyn RefreshTokenStore>,
    retry: RetryPolicy,
    attempt_timeout: Duration,
}

impl RefreshCoordinator {
    /// `attempt_timeout` bounds each store call made by the detached
    /// rotation task, independently of the caller's deadline.
    pub fn new(
        issuer: Arc<TokenIssuer>,
        store: Arc<dyn RefreshTokenStore>,
        retry: RetryPolicy,
        attempt_timeout: Duration,
    ) -> Self {
        RefreshCoordinator {
            issuer,
            store,
            retry,
            attempt_timeout,
        }
    }

    /// Exchange a refresh token for a new pair.
    ///
    /// The presented token is consumed. Presenting an already-consumed
    /// token revokes its whole family and fails with `ReplayDetected`.
    #[instrument(skip_all)]
    pub async fn refresh(&self, token: &str, deadline: &Deadline) -> Result<TokenPair, TokenError> {
        let result = self.rotate(token, deadline).await;
        metrics::record_token_refreshed(match &result {
            Ok(_) => "success",
            Err(e) => e.code().as_str(),
        });
        result
    }

    /// Revoke the family of a refresh token. Returns how many records changed.
    #[instrument(skip_all)]
    pub async fn logout(&self, token: &str, deadline: &Deadline) -> Result<u64, TokenError> {
        let claims = self.decode(token)?;
        let count = deadline.run(self.store.revoke_family(&claims.fid)).await?;

        metrics::record_tokens_revoked("logout", count);
        info!(family_id = %claims.fid, subject = %claims.sub, revoked = count, "Revoked token family on logout");
        Ok(count)
    }

    fn decode(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        Ok(self
            .issuer
            .serializer()
            .deserialize::<RefreshClaims>(token, TokenType::Refresh)?
            .claims)
    }

    async fn rotate(&self, token: &str, deadline: &Deadline) -> Result<TokenPair, TokenError> {
        let claims = self.decode(token)?;

        let record = deadline
            .run(self.store.get(&claims.jti))
            .await?
            .ok_or(TokenError::Revoked)?;
        if record.subject != claims.sub || record.family_root_id != claims.fid {
            return Err(TokenError::malformed("refresh token does not match its record"));
        }
        if record.revoked
            || deadline
                .run(self.store.is_family_revoked(&record.family_root_id))
                .await?
        {
            return Err(TokenError::Revoked);
        }

        let child = self.issuer.child_record(&record);
        match self.commit(record.id.clone(), child, deadline).await? {
            RotationOutcome::Rotated(child) => {
                let access = self
                    .issuer
                    .issue_access(&child.subject, Some(&child.family_root_id))?;
                info!(
                    family_id = %child.family_root_id,
                    parent_id = %record.id,
                    "Rotated refresh token"
                );
                let refresh = self.issuer.encode_refresh(child)?;
                Ok(self.issuer.pair(access, refresh))
            }
            RotationOutcome::Conflict { family_root_id } => {
                metrics::record_security_event("REFRESH_REPLAY");
                warn!(
                    family_id = %family_root_id,
                    subject = %record.subject,
                    token_id = %record.id,
                    "Refresh token replay detected"
                );
                Err(TokenError::ReplayDetected)
            }
            RotationOutcome::Revoked { .. } | RotationOutcome::NotFound => Err(TokenError::Revoked),
        }
    }

    /// Run the store rotation, and the family revocation a conflict calls
    /// for, on a detached task.
    ///
    /// Dropping the caller's future only stops the wait; the task always
    /// runs to completion.
    async fn commit(
        &self,
        parent_id: String,
        child: RefreshTokenRecord,
        deadline: &Deadline,
    ) -> Result<RotationOutcome, TokenError> {
        let store = Arc::clone(&self.store);
        let retry = self.retry.clone();
        let attempt_timeout = self.attempt_timeout;

        let task = tokio::spawn(async move {
            let outcome = retry
                .execute(|| {
                    let store = Arc::clone(&store);
                    let parent_id = parent_id.clone();
                    let child = child.clone();
                    async move {
                        Deadline::after(attempt_timeout)
                            .run(store.use_and_create_child(&parent_id, &child))
                            .await
                    }
                })
                .await?;

            if let RotationOutcome::Conflict { family_root_id } = &outcome {
                let revoked = retry
                    .execute(|| {
                        let store = Arc::clone(&store);
                        let family_root_id = family_root_id.clone();
                        async move {
                            Deadline::after(attempt_timeout)
                                .run(store.revoke_family(&family_root_id))
                                .await
                        }
                    })
                    .await;

                match revoked {
                    Ok(count) => {
                        metrics::record_tokens_revoked("replay", count);
                        warn!(family_id = %family_root_id, revoked = count, "Revoked token family after replay");
                    }
                    Err(e) => {
                        error!(family_id = %family_root_id, error = %e, "Failed to revoke token family after replay");
                    }
                }
            }

            Ok::<_, TokenError>(outcome)
        });

        deadline
            .run(async move {
                task.await
                    .map_err(|e| TokenError::internal(format!("rotation task failed: {e}")))?
            })
            .await
    }
}
