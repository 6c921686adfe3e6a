//! Identity lookup for stored credentials.

use crate::error::TokenError;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// Opaque, stable identifier of an authenticated principal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Subject(String);

impl Subject {
    /// Wrap an identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Subject(id.into())
    }

    /// Identifier as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Subject {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Credential material held for one username.
#[derive(Clone)]
pub struct StoredCredential {
    /// Principal the credential authenticates
    pub subject: Subject,
    /// Argon2id PHC string
    pub secret_hash: String,
}

impl fmt::Debug for StoredCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredCredential")
            .field("subject", &self.subject)
            .field("secret_hash", &"[REDACTED]")
            .finish()
    }
}

/// Lookup of credential material by username.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_credential(&self, username: &str)
        -> Result<Option<StoredCredential>, TokenError>;
}

/// Identity store held in process memory.
#[derive(Default)]
pub struct InMemoryIdentityStore {
    users: RwLock<HashMap<String, StoredCredential>>,
    unavailable: AtomicBool,
}

impl InMemoryIdentityStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `username` with an already-hashed secret.
    pub fn insert(&self, username: impl Into<String>, subject: Subject, secret_hash: String) {
        self.users.write().insert(
            username.into(),
            StoredCredential {
                subject,
                secret_hash,
            },
        );
    }

    /// Remove `username`; returns whether it existed.
    pub fn remove(&self, username: &str) -> bool {
        self.users.write().remove(username).is_some()
    }

    /// Simulate an outage.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn find_credential(
        &self,
        username: &str,
    ) -> Result<Option<StoredCredential>, TokenError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(TokenError::store("identity store marked unavailable"));
        }
        Ok(self.users.read().get(username).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup() {
        let store = InMemoryIdentityStore::new();
        store.insert("alice", Subject::new("user-1"), "$argon2id$...".to_string());

        let found = store.find_credential("alice").await.unwrap().unwrap();
        assert_eq!(found.subject.as_str(), "user-1");
        assert!(store.find_credential("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_outage_surfaces_store_unavailable() {
        let store = InMemoryIdentityStore::new();
        store.set_available(false);
        let err = store.find_credential("alice").await.unwrap_err();
        assert!(matches!(err, TokenError::StoreUnavailable(_)));
    }

    #[test]
    fn test_debug_redacts_hash() {
        let cred = StoredCredential {
            subject: Subject::new("user-1"),
            secret_hash: "$argon2id$secret".to_string(),
        };
        assert!(!format!("{cred:?}").contains("argon2id"));
    }
}
