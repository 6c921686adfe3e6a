//! Stateless access token validation.

use crate::deadline::Deadline;
use crate::error::TokenError;
use crate::jwt::{AccessClaims, JwsSerializer, TokenType};
use crate::metrics;
use crate::refresh::RefreshTokenStore;
use crate::retry::RetryPolicy;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Verifies access tokens.
pub struct TokenValidator {
    serializer: Arc<JwsSerializer>,
    store: Arc<dyn RefreshTokenStore>,
    retry: RetryPolicy,
}

impl TokenValidator {
    /// The family lookup is a read, so `retry` may repeat it within the
    /// caller's deadline.
    pub fn new(
        serializer: Arc<JwsSerializer>,
        store: Arc<dyn RefreshTokenStore>,
        retry: RetryPolicy,
    ) -> Self {
        TokenValidator {
            serializer,
            store,
            retry,
        }
    }

    /// Verify an access token and return its claims.
    ///
    /// Checks run in order: structure, expiry, signature, then family
    /// revocation when the token carries a family id. The store is only
    /// read, never written.
    #[instrument(skip_all)]
    pub async fn validate(
        &self,
        token: &str,
        deadline: &Deadline,
    ) -> Result<AccessClaims, TokenError> {
        let result = self.check(token, deadline).await;
        metrics::record_token_validated(match &result {
            Ok(_) => "valid",
            Err(e) => e.code().as_str(),
        });
        result
    }

    async fn check(&self, token: &str, deadline: &Deadline) -> Result<AccessClaims, TokenError> {
        let claims = self
            .serializer
            .deserialize::<AccessClaims>(token, TokenType::Access)?
            .claims;

        if let Some(fid) = claims.family_root_id() {
            let revoked = self
                .retry
                .execute_within(deadline, || self.store.is_family_revoked(fid))
                .await?;
            if revoked {
                debug!(family_id = %fid, "Access token family revoked");
                return Err(TokenError::Revoked);
            }
        }

        Ok(claims)
    }
}
