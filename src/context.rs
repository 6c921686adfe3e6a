//! Startup-built context that owns every lifecycle component.

use crate::api::{AuthenticateRequest, RefreshRequest, ValidateRequest};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::credentials::{CredentialValidator, IdentityStore, SecretHasher};
use crate::deadline::Deadline;
use crate::error::TokenError;
use crate::issuer::{TokenIssuer, TokenPair};
use crate::jwt::{AccessClaims, JwsSerializer};
use crate::keys::{RotationScheduler, SigningKeyManager};
use crate::refresh::{
    InMemoryRefreshTokenStore, RedisRefreshTokenStore, RefreshCoordinator, RefreshTokenStore,
};
use crate::retry::RetryPolicy;
use crate::validator::TokenValidator;
use std::sync::Arc;
use tracing::{info, instrument};

/// Entry point for the boundary: one instance per process.
pub struct AuthContext {
    config: Config,
    keys: Arc<SigningKeyManager>,
    refresh_store: Arc<dyn RefreshTokenStore>,
    credentials: CredentialValidator,
    issuer: Arc<TokenIssuer>,
    validator: TokenValidator,
    coordinator: RefreshCoordinator,
}

impl AuthContext {
    /// Start building a context from `config`.
    #[must_use]
    pub fn builder(config: Config, identities: Arc<dyn IdentityStore>) -> AuthContextBuilder {
        AuthContextBuilder {
            config,
            identities,
            clock: None,
            refresh_store: None,
            hasher: None,
            keys: None,
            retry: None,
        }
    }

    /// Build from configuration, connecting to Redis when `redis_url` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, key generation
    /// fails or Redis cannot be reached.
    pub async fn from_config(
        config: Config,
        identities: Arc<dyn IdentityStore>,
    ) -> Result<Self, TokenError> {
        config.validate()?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let refresh_store: Arc<dyn RefreshTokenStore> = match &config.redis_url {
            Some(url) => {
                let store = RedisRefreshTokenStore::connect(
                    url,
                    config.key_prefix.clone(),
                    config.refresh_token_ttl,
                    Arc::clone(&clock),
                )
                .await?;
                info!(prefix = %config.key_prefix, "Using Redis refresh token store");
                Arc::new(store)
            }
            None => {
                info!("Using in-memory refresh token store");
                Arc::new(InMemoryRefreshTokenStore::new(Arc::clone(&clock)))
            }
        };

        Self::builder(config, identities)
            .clock(clock)
            .refresh_store(refresh_store)
            .build()
    }

    /// Validated configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Signing key manager.
    pub fn keys(&self) -> &Arc<SigningKeyManager> {
        &self.keys
    }

    /// Refresh token store.
    pub fn refresh_store(&self) -> &Arc<dyn RefreshTokenStore> {
        &self.refresh_store
    }

    /// Token issuer.
    pub fn issuer(&self) -> &Arc<TokenIssuer> {
        &self.issuer
    }

    /// Credential validator.
    pub fn credentials(&self) -> &CredentialValidator {
        &self.credentials
    }

    /// Deadline for one request using the configured store timeout.
    #[must_use]
    pub fn deadline(&self) -> Deadline {
        Deadline::after(self.config.store_timeout)
    }

    /// Verify credentials and issue a new token family.
    #[instrument(skip_all, fields(username = %request.username()))]
    pub async fn authenticate(
        &self,
        request: &AuthenticateRequest,
        deadline: &Deadline,
    ) -> Result<TokenPair, TokenError> {
        let subject = self
            .credentials
            .authenticate(request.username(), request.secret(), deadline)
            .await?;
        self.issuer.issue(&subject, None, deadline).await
    }

    /// Verify an access token.
    pub async fn validate(
        &self,
        request: &ValidateRequest,
        deadline: &Deadline,
    ) -> Result<AccessClaims, TokenError> {
        self.validator.validate(request.access_token(), deadline).await
    }

    /// Exchange a refresh token for a new pair.
    pub async fn refresh(
        &self,
        request: &RefreshRequest,
        deadline: &Deadline,
    ) -> Result<TokenPair, TokenError> {
        self.coordinator.refresh(request.refresh_token(), deadline).await
    }

    /// Revoke the family of a refresh token.
    pub async fn logout(
        &self,
        request: &RefreshRequest,
        deadline: &Deadline,
    ) -> Result<u64, TokenError> {
        self.coordinator.logout(request.refresh_token(), deadline).await
    }

    /// Start rotating signing keys every `key_rotation_interval`.
    #[must_use]
    pub fn start_key_rotation(&self) -> RotationScheduler {
        RotationScheduler::spawn(Arc::clone(&self.keys), self.config.key_rotation_interval)
    }
}

/// Builder for [`AuthContext`]; unset parts fall back to defaults.
pub struct AuthContextBuilder {
    config: Config,
    identities: Arc<dyn IdentityStore>,
    clock: Option<Arc<dyn Clock>>,
    refresh_store: Option<Arc<dyn RefreshTokenStore>>,
    hasher: Option<Arc<SecretHasher>>,
    keys: Option<Arc<SigningKeyManager>>,
    retry: Option<RetryPolicy>,
}

impl AuthContextBuilder {
    /// Time source; the system clock by default.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Refresh token store; in-memory by default.
    #[must_use]
    pub fn refresh_store(mut self, store: Arc<dyn RefreshTokenStore>) -> Self {
        self.refresh_store = Some(store);
        self
    }

    /// Secret hasher; Argon2 defaults otherwise.
    #[must_use]
    pub fn hasher(mut self, hasher: Arc<SecretHasher>) -> Self {
        self.hasher = Some(hasher);
        self
    }

    /// Use an existing key manager, e.g. one rebuilt with
    /// [`SigningKeyManager::restore`].
    #[must_use]
    pub fn keys(mut self, keys: Arc<SigningKeyManager>) -> Self {
        self.keys = Some(keys);
        self
    }

    /// Retry policy for store calls.
    #[must_use]
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or key generation fails.
    pub fn build(self) -> Result<AuthContext, TokenError> {
        self.config.validate()?;
        let config = self.config;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let keys = match self.keys {
            Some(keys) => keys,
            None => Arc::new(SigningKeyManager::from_config(&config, Arc::clone(&clock))?),
        };
        let hasher = match self.hasher {
            Some(hasher) => hasher,
            None => Arc::new(SecretHasher::new()?),
        };
        let refresh_store = self
            .refresh_store
            .unwrap_or_else(|| Arc::new(InMemoryRefreshTokenStore::new(Arc::clone(&clock))));

        let serializer = Arc::new(JwsSerializer::new(Arc::clone(&keys), Arc::clone(&clock)));
        let issuer = Arc::new(TokenIssuer::new(
            &config,
            Arc::clone(&serializer),
            Arc::clone(&refresh_store),
            Arc::clone(&clock),
        ));
        let retry = self.retry.unwrap_or_default();
        let validator =
            TokenValidator::new(serializer, Arc::clone(&refresh_store), retry.clone());
        let coordinator = RefreshCoordinator::new(
            Arc::clone(&issuer),
            Arc::clone(&refresh_store),
            retry,
            config.store_timeout,
        );
        let credentials =
            CredentialValidator::from_config(&config, self.identities, hasher, Arc::clone(&clock));

        info!(
            algorithm = config.signing_algorithm.as_str(),
            key_id = %keys.current_key_id(),
            issuer = %config.jwt_issuer,
            "Token lifecycle context ready"
        );

        Ok(AuthContext {
            config,
            keys,
            refresh_store,
            credentials,
            issuer,
            validator,
            coordinator,
        })
    }
}
