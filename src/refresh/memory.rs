//! In-process refresh token store.
//!
//! All mutations run inside one mutex critical section, which makes
//! `use_and_create_child` linearizable.

use crate::clock::Clock;
use crate::error::TokenError;
use crate::refresh::record::RefreshTokenRecord;
use crate::refresh::store::{RefreshTokenStore, RotationOutcome};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct State {
    records: HashMap<String, RefreshTokenRecord>,
    families: HashMap<String, Vec<String>>,
    revoked_families: HashSet<String>,
}

/// Refresh token store held in process memory.
pub struct InMemoryRefreshTokenStore {
    state: Mutex<State>,
    clock: Arc<dyn Clock>,
    available: AtomicBool,
    latency: Mutex<Option<Duration>>,
}

impl InMemoryRefreshTokenStore {
    /// Empty store.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        InMemoryRefreshTokenStore {
            state: Mutex::new(State::default()),
            clock,
            available: AtomicBool::new(true),
            latency: Mutex::new(None),
        }
    }

    /// Simulate an outage: every call fails with `StoreUnavailable` while false.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    /// Whether no records are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn enter(&self) -> Result<(), TokenError> {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TokenError::store("in-memory store marked unavailable"))
        }
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryRefreshTokenStore {
    async fn create(&self, record: &RefreshTokenRecord) -> Result<(), TokenError> {
        self.enter().await?;
        let mut state = self.state.lock();
        if state.records.contains_key(&record.id) {
            return Err(TokenError::internal("refresh token id collision"));
        }
        state
            .families
            .entry(record.family_root_id.clone())
            .or_default()
            .push(record.id.clone());
        state.records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn use_and_create_child(
        &self,
        token_id: &str,
        child: &RefreshTokenRecord,
    ) -> Result<RotationOutcome, TokenError> {
        self.enter().await?;
        let now = self.clock.now();
        let mut state = self.state.lock();

        let Some(parent) = state.records.get(token_id) else {
            return Ok(RotationOutcome::NotFound);
        };
        let family_root_id = parent.family_root_id.clone();

        if child.family_root_id != family_root_id || child.parent_id.as_deref() != Some(token_id) {
            return Err(TokenError::internal("child does not descend from parent"));
        }
        if parent.revoked || state.revoked_families.contains(&family_root_id) {
            return Ok(RotationOutcome::Revoked { family_root_id });
        }
        if parent.used {
            if parent.replaced_by.as_deref() == Some(child.id.as_str()) {
                let existing = state.records.get(&child.id).cloned().unwrap_or_else(|| child.clone());
                return Ok(RotationOutcome::Rotated(existing));
            }
            return Ok(RotationOutcome::Conflict { family_root_id });
        }
        if state.records.contains_key(&child.id) {
            return Err(TokenError::internal("refresh token id collision"));
        }

        if let Some(parent) = state.records.get_mut(token_id) {
            parent.mark_used(&child.id, now);
        }
        state
            .families
            .entry(family_root_id)
            .or_default()
            .push(child.id.clone());
        state.records.insert(child.id.clone(), child.clone());

        Ok(RotationOutcome::Rotated(child.clone()))
    }

    async fn revoke_family(&self, family_root_id: &str) -> Result<u64, TokenError> {
        self.enter().await?;
        let now = self.clock.now();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        state.revoked_families.insert(family_root_id.to_string());

        let mut count = 0;
        if let Some(ids) = state.families.get(family_root_id) {
            for id in ids {
                if let Some(record) = state.records.get_mut(id) {
                    if record.revoke(now) {
                        count += 1;
                    }
                }
            }
        }
        Ok(count)
    }

    async fn get(&self, token_id: &str) -> Result<Option<RefreshTokenRecord>, TokenError> {
        self.enter().await?;
        Ok(self.state.lock().records.get(token_id).cloned())
    }

    async fn is_family_revoked(&self, family_root_id: &str) -> Result<bool, TokenError> {
        self.enter().await?;
        Ok(self.state.lock().revoked_families.contains(family_root_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::Utc;

    fn store() -> InMemoryRefreshTokenStore {
        InMemoryRefreshTokenStore::new(Arc::new(ManualClock::starting_now()))
    }

    fn root(id: &str) -> RefreshTokenRecord {
        let now = Utc::now();
        RefreshTokenRecord::root(
            id.to_string(),
            "alice".to_string(),
            now,
            now + chrono::Duration::days(1),
        )
    }

    fn child_of(parent: &RefreshTokenRecord, id: &str) -> RefreshTokenRecord {
        parent.child(id.to_string(), parent.issued_at, parent.expires_at)
    }

    #[tokio::test]
    async fn test_rotate_marks_parent_used() {
        let store = store();
        let root = root("r");
        store.create(&root).await.unwrap();

        let child = child_of(&root, "c1");
        let outcome = store.use_and_create_child("r", &child).await.unwrap();
        assert_eq!(outcome, RotationOutcome::Rotated(child.clone()));

        let parent = store.get("r").await.unwrap().unwrap();
        assert!(parent.used);
        assert_eq!(parent.replaced_by.as_deref(), Some("c1"));
        assert!(parent.used_at.is_some());
        assert_eq!(store.get("c1").await.unwrap(), Some(child));
    }

    #[tokio::test]
    async fn test_second_child_conflicts() {
        let store = store();
        let root = root("r");
        store.create(&root).await.unwrap();

        store.use_and_create_child("r", &child_of(&root, "c1")).await.unwrap();
        let outcome = store.use_and_create_child("r", &child_of(&root, "c2")).await.unwrap();

        assert_eq!(
            outcome,
            RotationOutcome::Conflict {
                family_root_id: "r".to_string()
            }
        );
        assert!(store.get("c2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_retry_with_same_child_is_idempotent() {
        let store = store();
        let root = root("r");
        store.create(&root).await.unwrap();
        let child = child_of(&root, "c1");

        store.use_and_create_child("r", &child).await.unwrap();
        let again = store.use_and_create_child("r", &child).await.unwrap();
        assert_eq!(again, RotationOutcome::Rotated(child));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_parent_is_not_found() {
        let store = store();
        let ghost = root("ghost");
        let outcome = store
            .use_and_create_child("ghost", &child_of(&ghost, "c1"))
            .await
            .unwrap();
        assert_eq!(outcome, RotationOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_revoke_family_counts_and_blocks_rotation() {
        let store = store();
        let root = root("r");
        store.create(&root).await.unwrap();
        let child = child_of(&root, "c1");
        store.use_and_create_child("r", &child).await.unwrap();

        assert_eq!(store.revoke_family("r").await.unwrap(), 2);
        assert_eq!(store.revoke_family("r").await.unwrap(), 0);
        assert!(store.is_family_revoked("r").await.unwrap());

        let outcome = store
            .use_and_create_child("c1", &child_of(&child, "c2"))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            RotationOutcome::Revoked {
                family_root_id: "r".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_unavailable_store_fails() {
        let store = store();
        store.set_available(false);
        let err = store.get("r").await.unwrap_err();
        assert!(matches!(err, TokenError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn test_concurrent_rotation_has_one_winner() {
        let store = Arc::new(store());
        let root = root("r");
        store.create(&root).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            let child = child_of(&root, &format!("c{i}"));
            handles.push(tokio::spawn(async move {
                store.use_and_create_child("r", &child).await.unwrap()
            }));
        }

        let mut rotated = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), RotationOutcome::Rotated(_)) {
                rotated += 1;
            }
        }
        assert_eq!(rotated, 1);
    }
}
