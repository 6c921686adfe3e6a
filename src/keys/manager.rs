//! Signing key manager with lock-free snapshot reads.
//!
//! The key set is published through an [`ArcSwap`]; verifiers load the
//! current snapshot and never wait on a rotation in progress.

use crate::clock::{add_duration, Clock};
use crate::config::{Config, SigningAlgorithm};
use crate::error::TokenError;
use crate::keys::material::SigningKey;
use crate::metrics;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Immutable snapshot of the current key and the retired keys still in grace.
#[derive(Debug, Clone)]
pub struct KeySet {
    current: Arc<SigningKey>,
    retired: Vec<Arc<SigningKey>>,
}

impl KeySet {
    /// Key used for new signatures.
    #[must_use]
    pub fn current(&self) -> &Arc<SigningKey> {
        &self.current
    }

    /// Retired keys, newest first.
    #[must_use]
    pub fn retired(&self) -> &[Arc<SigningKey>] {
        &self.retired
    }

    /// Find a key by id. Linear scan; the set is small and bounded.
    #[must_use]
    pub fn find(&self, key_id: &str) -> Option<&Arc<SigningKey>> {
        std::iter::once(&self.current)
            .chain(self.retired.iter())
            .find(|key| key.key_id() == key_id)
    }

    /// Number of keys in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        1 + self.retired.len()
    }

    /// A key set always holds a current key.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }
}

/// Owns signing keys; signs, verifies and rotates.
pub struct SigningKeyManager {
    keys: ArcSwap<KeySet>,
    algorithm: SigningAlgorithm,
    grace_period: Duration,
    max_retired: usize,
    clock: Arc<dyn Clock>,
    rotation: Mutex<()>,
}

impl SigningKeyManager {
    /// Create a manager with one freshly generated current key.
    ///
    /// # Errors
    ///
    /// Returns an error if key generation fails.
    pub fn new(
        algorithm: SigningAlgorithm,
        grace_period: Duration,
        max_retired: usize,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, TokenError> {
        let current = SigningKey::generate(algorithm, clock.now())?;
        info!(key_id = %current.key_id(), algorithm = algorithm.as_str(), "Generated initial signing key");
        Ok(Self::with_key_set(
            current,
            Vec::new(),
            grace_period,
            max_retired,
            clock,
        ))
    }

    /// Create a manager from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if key generation fails.
    pub fn from_config(config: &Config, clock: Arc<dyn Clock>) -> Result<Self, TokenError> {
        Self::new(
            config.signing_algorithm,
            config.key_grace_period,
            config.max_retired_keys,
            clock,
        )
    }

    /// Rehydrate a manager from persisted keys.
    ///
    /// Retired keys whose window has already elapsed are dropped; keys
    /// still in grace are all kept.
    #[must_use]
    pub fn restore(
        current: SigningKey,
        retired: Vec<SigningKey>,
        grace_period: Duration,
        max_retired: usize,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_key_set(current, retired, grace_period, max_retired, clock)
    }

    fn with_key_set(
        current: SigningKey,
        retired: Vec<SigningKey>,
        grace_period: Duration,
        max_retired: usize,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let now = clock.now();
        let algorithm = current.algorithm();
        let retired = retired
            .into_iter()
            .filter(|key| key.valid_until().is_some() && key.is_usable_at(now))
            .map(Arc::new)
            .collect();

        Self {
            keys: ArcSwap::from_pointee(KeySet {
                current: Arc::new(current),
                retired,
            }),
            algorithm,
            grace_period,
            max_retired,
            clock,
            rotation: Mutex::new(()),
        }
    }

    /// Current snapshot. Cheap; never blocks.
    #[must_use]
    pub fn snapshot(&self) -> Arc<KeySet> {
        self.keys.load_full()
    }

    /// Current signing key.
    #[must_use]
    pub fn current(&self) -> Arc<SigningKey> {
        Arc::clone(self.keys.load().current())
    }

    /// Id of the current signing key.
    #[must_use]
    pub fn current_key_id(&self) -> String {
        self.keys.load().current().key_id().to_string()
    }

    /// Sign `payload` with the current key, returning `(signature, key_id)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the signing primitive fails.
    pub fn sign(&self, payload: &[u8]) -> Result<(String, String), TokenError> {
        let key = self.current();
        let signature = key.sign(payload)?;
        Ok((signature, key.key_id().to_string()))
    }

    /// Verify `signature` over `payload` with the key named `key_id`.
    ///
    /// Unknown keys and keys past `valid_until` never verify.
    #[must_use]
    pub fn verify(&self, payload: &[u8], signature: &str, key_id: &str) -> bool {
        let snapshot = self.keys.load();
        match snapshot.find(key_id) {
            Some(key) if key.is_usable_at(self.clock.now()) => key.verify(payload, signature),
            _ => false,
        }
    }

    /// Replace the current key.
    ///
    /// The previous current key stays verifiable for the grace period and
    /// retired keys past their window are pruned. A key still in grace is
    /// never evicted: when `max_retired` keys are in grace the rotation is
    /// refused.
    ///
    /// # Errors
    ///
    /// Returns an error if the retired list is full of keys still in grace
    /// or key generation fails; the published set is unchanged in both cases.
    pub fn rotate(&self) -> Result<String, TokenError> {
        let _guard = self.rotation.lock();
        let now = self.clock.now();
        let previous = self.keys.load_full();

        let still_in_grace = previous
            .retired()
            .iter()
            .filter(|key| key.is_usable_at(now))
            .count();
        if still_in_grace >= self.max_retired {
            warn!(
                key_id = %previous.current().key_id(),
                retired = still_in_grace,
                "Retired key capacity reached; keeping current signing key"
            );
            return Err(TokenError::internal(
                "retired key capacity reached while keys are still in grace",
            ));
        }

        let next = SigningKey::generate(self.algorithm, now)?;
        let demoted = Arc::new(
            previous
                .current()
                .retired_until(add_duration(now, self.grace_period)),
        );

        let retired: Vec<Arc<SigningKey>> = std::iter::once(demoted)
            .chain(
                previous
                    .retired()
                    .iter()
                    .filter(|key| key.is_usable_at(now))
                    .cloned(),
            )
            .collect();

        let new_key_id = next.key_id().to_string();
        let retired_count = retired.len();
        self.keys.store(Arc::new(KeySet {
            current: Arc::new(next),
            retired,
        }));

        metrics::record_key_rotation();
        info!(
            key_id = %new_key_id,
            previous_key_id = %previous.current().key_id(),
            retired = retired_count,
            "Rotated signing key"
        );
        Ok(new_key_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn manager(clock: Arc<ManualClock>) -> SigningKeyManager {
        SigningKeyManager::new(
            SigningAlgorithm::HS256,
            Duration::from_secs(600),
            2,
            clock,
        )
        .unwrap()
    }

    #[test]
    fn test_sign_and_verify_with_current_key() {
        let clock = Arc::new(ManualClock::starting_now());
        let keys = manager(clock);

        let (sig, kid) = keys.sign(b"payload").unwrap();
        assert_eq!(kid, keys.current_key_id());
        assert!(keys.verify(b"payload", &sig, &kid));
        assert!(!keys.verify(b"payload", &sig, "unknown-kid"));
    }

    #[test]
    fn test_retired_key_verifies_through_grace() {
        let clock = Arc::new(ManualClock::starting_now());
        let keys = manager(clock.clone());

        let (sig, kid) = keys.sign(b"payload").unwrap();
        let new_kid = keys.rotate().unwrap();
        assert_ne!(kid, new_kid);

        clock.advance(Duration::from_secs(600));
        assert!(keys.verify(b"payload", &sig, &kid));

        clock.advance(Duration::from_secs(1));
        assert!(!keys.verify(b"payload", &sig, &kid));
    }

    #[test]
    fn test_full_retired_list_refuses_rotation() {
        let clock = Arc::new(ManualClock::starting_now());
        let keys = manager(clock.clone());

        let (sig, kid) = keys.sign(b"payload").unwrap();
        keys.rotate().unwrap();
        let current = keys.rotate().unwrap();
        assert_eq!(keys.snapshot().retired().len(), 2);

        assert!(keys.rotate().is_err());
        assert_eq!(keys.current_key_id(), current);
        assert_eq!(keys.snapshot().len(), 3);
        assert!(keys.verify(b"payload", &sig, &kid));
    }

    #[test]
    fn test_rotation_resumes_once_grace_elapses() {
        let clock = Arc::new(ManualClock::starting_now());
        let keys = manager(clock.clone());

        keys.rotate().unwrap();
        keys.rotate().unwrap();
        assert!(keys.rotate().is_err());

        clock.advance(Duration::from_secs(601));
        keys.rotate().unwrap();
        assert_eq!(keys.snapshot().retired().len(), 1);
    }

    #[test]
    fn test_rotation_prunes_elapsed_keys() {
        let clock = Arc::new(ManualClock::starting_now());
        let keys = manager(clock.clone());

        keys.rotate().unwrap();
        clock.advance(Duration::from_secs(601));
        keys.rotate().unwrap();

        assert_eq!(keys.snapshot().retired().len(), 1);
    }

    #[test]
    fn test_snapshot_survives_rotation() {
        let clock = Arc::new(ManualClock::starting_now());
        let keys = manager(clock);

        let before = keys.snapshot();
        keys.rotate().unwrap();
        let after = keys.snapshot();

        assert_ne!(before.current().key_id(), after.current().key_id());
        assert!(after.find(before.current().key_id()).is_some());
    }

    #[test]
    fn test_restore_drops_elapsed_retired_keys() {
        let clock = Arc::new(ManualClock::starting_now());
        let now = clock.now();
        let current = SigningKey::generate(SigningAlgorithm::HS256, now).unwrap();
        let live = SigningKey::generate(SigningAlgorithm::HS256, now)
            .unwrap()
            .retired_until(add_duration(now, Duration::from_secs(60)));
        let dead = SigningKey::generate(SigningAlgorithm::HS256, now)
            .unwrap()
            .retired_until(now - chrono::Duration::seconds(1));

        let keys = SigningKeyManager::restore(
            current,
            vec![live.clone(), dead],
            Duration::from_secs(600),
            4,
            clock,
        );
        let snapshot = keys.snapshot();
        assert_eq!(snapshot.retired().len(), 1);
        assert!(snapshot.find(live.key_id()).is_some());
    }
}
