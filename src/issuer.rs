//! Access/refresh token pair issuance.

use crate::clock::{add_duration, Clock};
use crate::config::Config;
use crate::credentials::Subject;
use crate::deadline::Deadline;
use crate::error::TokenError;
use crate::jwt::{AccessClaims, AccessClaimsBuilder, JwsSerializer, RefreshClaims, TokenType};
use crate::metrics;
use crate::refresh::{RefreshTokenRecord, RefreshTokenStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Signed access token with its decoded claims.
#[derive(Debug, Clone)]
pub struct IssuedAccessToken {
    /// Compact token
    pub token: String,
    /// Claims it carries
    pub claims: AccessClaims,
    /// Key that signed it
    pub key_id: String,
}

/// Signed refresh token with the record it stands for.
#[derive(Debug, Clone)]
pub struct IssuedRefreshToken {
    /// Compact token
    pub token: String,
    /// Persisted record
    pub record: RefreshTokenRecord,
}

/// Access and refresh token issued together.
#[derive(Debug, Clone)]
pub struct TokenPair {
    /// Access token
    pub access: IssuedAccessToken,
    /// Refresh token
    pub refresh: IssuedRefreshToken,
    /// Access token lifetime in seconds
    pub expires_in: u64,
}

/// Builds and signs token pairs.
pub struct TokenIssuer {
    serializer: Arc<JwsSerializer>,
    store: Arc<dyn RefreshTokenStore>,
    clock: Arc<dyn Clock>,
    issuer: String,
    audience: Vec<String>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    /// Issuer using TTLs and issuer/audience from `config`.
    pub fn new(
        config: &Config,
        serializer: Arc<JwsSerializer>,
        store: Arc<dyn RefreshTokenStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        TokenIssuer {
            serializer,
            store,
            clock,
            issuer: config.jwt_issuer.clone(),
            audience: vec![config.jwt_audience.clone()],
            access_ttl: config.access_token_ttl,
            refresh_ttl: config.refresh_token_ttl,
        }
    }

    /// Serializer used for signing.
    pub fn serializer(&self) -> &Arc<JwsSerializer> {
        &self.serializer
    }

    /// Refresh token lifetime.
    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Issue a pair for `subject`.
    ///
    /// Without `family_root_id` a new family is started and the refresh
    /// record is its root. The record is persisted before returning.
    #[instrument(skip(self, deadline), fields(subject = %subject))]
    pub async fn issue(
        &self,
        subject: &Subject,
        family_root_id: Option<&str>,
        deadline: &Deadline,
    ) -> Result<TokenPair, TokenError> {
        let now = self.clock.now();
        let id = uuid::Uuid::new_v4().to_string();
        let expires_at = add_duration(now, self.refresh_ttl);
        let record = match family_root_id {
            Some(fid) => RefreshTokenRecord::in_family(
                id,
                fid.to_string(),
                subject.to_string(),
                now,
                expires_at,
            ),
            None => RefreshTokenRecord::root(id, subject.to_string(), now, expires_at),
        };

        let refresh = self.encode_refresh(record)?;
        let access = self.issue_access(subject.as_str(), Some(&refresh.record.family_root_id))?;

        deadline.run(self.store.create(&refresh.record)).await?;
        metrics::record_token_issued("refresh", self.serializer.keys().current().algorithm().as_str());

        debug!(
            family_id = %refresh.record.family_root_id,
            key_id = %access.key_id,
            "Issued token pair"
        );
        Ok(self.pair(access, refresh))
    }

    /// Sign an access token bound to `family_root_id`.
    pub fn issue_access(
        &self,
        subject: &str,
        family_root_id: Option<&str>,
    ) -> Result<IssuedAccessToken, TokenError> {
        let claims = AccessClaimsBuilder::new(self.issuer.clone(), self.clock.timestamp())
            .subject(subject)
            .audience(self.audience.clone())
            .ttl_seconds(ttl_secs(self.access_ttl))
            .family_root_id(family_root_id.map(str::to_string))
            .build()?;

        let encoded = self.serializer.serialize(&claims)?;
        metrics::record_token_issued("access", self.serializer.keys().current().algorithm().as_str());

        Ok(IssuedAccessToken {
            token: encoded.token,
            claims,
            key_id: encoded.key_id,
        })
    }

    /// Wire form of a refresh record. Does not persist anything.
    pub fn encode_refresh(
        &self,
        record: RefreshTokenRecord,
    ) -> Result<IssuedRefreshToken, TokenError> {
        let claims = RefreshClaims {
            iss: self.issuer.clone(),
            sub: record.subject.clone(),
            iat: record.issued_at.timestamp(),
            exp: record.expires_at.timestamp(),
            jti: record.id.clone(),
            fid: record.family_root_id.clone(),
            typ: TokenType::Refresh,
        };
        let encoded = self.serializer.serialize(&claims)?;
        Ok(IssuedRefreshToken {
            token: encoded.token,
            record,
        })
    }

    /// Successor record for `parent` with a fresh expiry.
    pub fn child_record(&self, parent: &RefreshTokenRecord) -> RefreshTokenRecord {
        let now = self.clock.now();
        parent.child(
            uuid::Uuid::new_v4().to_string(),
            now,
            add_duration(now, self.refresh_ttl),
        )
    }

    /// Combine into a pair.
    pub fn pair(&self, access: IssuedAccessToken, refresh: IssuedRefreshToken) -> TokenPair {
        TokenPair {
            access,
            refresh,
            expires_in: self.access_ttl.as_secs(),
        }
    }
}

fn ttl_secs(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::jwt::Verified;
    use crate::keys::SigningKeyManager;
    use crate::refresh::InMemoryRefreshTokenStore;

    struct Fixture {
        issuer: TokenIssuer,
        store: Arc<InMemoryRefreshTokenStore>,
        clock: Arc<ManualClock>,
    }

    fn fixture() -> Fixture {
        let config = Config::default();
        let clock = Arc::new(ManualClock::starting_now());
        let keys = Arc::new(SigningKeyManager::from_config(&config, clock.clone()).unwrap());
        let serializer = Arc::new(JwsSerializer::new(keys, clock.clone()));
        let store = Arc::new(InMemoryRefreshTokenStore::new(clock.clone()));
        let issuer = TokenIssuer::new(&config, serializer, store.clone(), clock.clone());
        Fixture {
            issuer,
            store,
            clock,
        }
    }

    fn deadline() -> Deadline {
        Deadline::after(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_issue_starts_family() {
        let f = fixture();
        let pair = f
            .issuer
            .issue(&Subject::new("alice"), None, &deadline())
            .await
            .unwrap();

        let record = &pair.refresh.record;
        assert!(record.is_root());
        assert_eq!(pair.access.claims.fid.as_deref(), Some(record.id.as_str()));
        assert_eq!(pair.expires_in, 900);
        assert_eq!(pair.access.claims.exp - pair.access.claims.iat, 900);
        assert_eq!(
            (record.expires_at - record.issued_at).num_seconds(),
            604_800
        );
        assert_eq!(f.store.get(&record.id).await.unwrap().as_ref(), Some(record));
    }

    #[tokio::test]
    async fn test_issue_continues_existing_family() {
        let f = fixture();
        let pair = f
            .issuer
            .issue(&Subject::new("alice"), Some("family-1"), &deadline())
            .await
            .unwrap();

        assert_eq!(pair.refresh.record.family_root_id, "family-1");
        assert_ne!(pair.refresh.record.id, "family-1");
        assert_eq!(pair.access.claims.family_root_id(), Some("family-1"));
    }

    #[tokio::test]
    async fn test_refresh_token_encodes_record() {
        let f = fixture();
        let pair = f
            .issuer
            .issue(&Subject::new("alice"), None, &deadline())
            .await
            .unwrap();

        let verified: Verified<RefreshClaims> = f
            .issuer
            .serializer()
            .deserialize(&pair.refresh.token, TokenType::Refresh)
            .unwrap();
        assert_eq!(verified.claims.jti, pair.refresh.record.id);
        assert_eq!(verified.claims.fid, pair.refresh.record.family_root_id);
        assert_eq!(verified.claims.iat, f.clock.timestamp());
    }

    #[tokio::test]
    async fn test_store_outage_fails_issue() {
        let f = fixture();
        f.store.set_available(false);

        let err = f
            .issuer
            .issue(&Subject::new("alice"), None, &deadline())
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::StoreUnavailable(_)));
    }
}
