//! Per-account failed-attempt tracking.

use crate::clock::add_duration;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

/// Entries are swept once the map grows past this many accounts.
const SWEEP_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct FailureWindow {
    failures: u32,
    started_at: DateTime<Utc>,
    locked: bool,
}

/// Counts consecutive failures inside a fixed window.
///
/// `threshold` failures within `window` of the first counted failure lock
/// the account until that window ends.
pub struct LockoutTracker {
    threshold: u32,
    window: Duration,
    accounts: Mutex<HashMap<String, FailureWindow>>,
}

impl LockoutTracker {
    /// Lock after `threshold` failures within `window`.
    pub fn new(threshold: u32, window: Duration) -> Self {
        LockoutTracker {
            threshold: threshold.max(1),
            window,
            accounts: Mutex::new(HashMap::new()),
        }
    }

    fn window_end(&self, entry: &FailureWindow) -> DateTime<Utc> {
        add_duration(entry.started_at, self.window)
    }

    /// Whether `account` is locked at `now`. Drops an elapsed window.
    pub fn is_locked(&self, account: &str, now: DateTime<Utc>) -> bool {
        let mut accounts = self.accounts.lock();
        let Some(entry) = accounts.get(account).copied() else {
            return false;
        };
        if now >= self.window_end(&entry) {
            accounts.remove(account);
            return false;
        }
        entry.locked
    }

    /// Count a failure; returns true if the account is now locked.
    pub fn record_failure(&self, account: &str, now: DateTime<Utc>) -> bool {
        let mut accounts = self.accounts.lock();
        if accounts.len() >= SWEEP_THRESHOLD {
            let window = self.window;
            accounts.retain(|_, entry| now < add_duration(entry.started_at, window));
        }

        let fresh = FailureWindow {
            failures: 0,
            started_at: now,
            locked: false,
        };
        let entry = accounts.entry(account.to_string()).or_insert(fresh);
        if now >= self.window_end(entry) {
            *entry = fresh;
        }

        entry.failures = entry.failures.saturating_add(1);
        if entry.failures >= self.threshold {
            entry.locked = true;
        }
        entry.locked
    }

    /// Clear the counter after a successful authentication.
    ///
    /// Returns false, leaving the entry untouched, if the account locked
    /// while the attempt was in flight.
    pub fn record_success(&self, account: &str, now: DateTime<Utc>) -> bool {
        let mut accounts = self.accounts.lock();
        if let Some(entry) = accounts.get(account) {
            if entry.locked && now < self.window_end(entry) {
                return false;
            }
        }
        accounts.remove(account);
        true
    }

    /// Failures counted in the current window.
    pub fn failures(&self, account: &str) -> u32 {
        self.accounts
            .lock()
            .get(account)
            .map_or(0, |entry| entry.failures)
    }
}
