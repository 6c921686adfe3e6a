//! Prometheus metrics for the token lifecycle core.

use once_cell::sync::Lazy;
use prometheus::{register_counter_vec, register_int_counter, CounterVec, IntCounter};

/// Tokens issued counter.
pub static TOKENS_ISSUED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "token_lifecycle_tokens_issued_total",
        "Total number of tokens issued",
        &["token_type", "algorithm"]
    )
    .expect("Failed to register tokens_issued metric")
});

/// Refresh attempts by outcome.
pub static TOKENS_REFRESHED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "token_lifecycle_tokens_refreshed_total",
        "Total number of refresh attempts",
        &["status"]
    )
    .expect("Failed to register tokens_refreshed metric")
});

/// Access token validations by outcome.
pub static TOKENS_VALIDATED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "token_lifecycle_tokens_validated_total",
        "Total number of access token validations",
        &["status"]
    )
    .expect("Failed to register tokens_validated metric")
});

/// Refresh token records revoked.
pub static TOKENS_REVOKED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "token_lifecycle_tokens_revoked_total",
        "Total number of refresh token records revoked",
        &["reason"]
    )
    .expect("Failed to register tokens_revoked metric")
});

/// Authentication attempts by outcome.
pub static AUTH_ATTEMPTS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "token_lifecycle_auth_attempts_total",
        "Total number of authentication attempts",
        &["status"]
    )
    .expect("Failed to register auth_attempts metric")
});

/// Security events counter.
pub static SECURITY_EVENTS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "token_lifecycle_security_events_total",
        "Total number of security events",
        &["event_type"]
    )
    .expect("Failed to register security_events metric")
});

/// Signing key rotations.
pub static KEY_ROTATIONS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "token_lifecycle_key_rotations_total",
        "Total number of signing key rotations"
    )
    .expect("Failed to register key_rotations metric")
});

/// Record a token issuance.
pub fn record_token_issued(token_type: &str, algorithm: &str) {
    TOKENS_ISSUED
        .with_label_values(&[token_type, algorithm])
        .inc();
}

/// Record a refresh outcome.
pub fn record_token_refreshed(status: &str) {
    TOKENS_REFRESHED.with_label_values(&[status]).inc();
}

/// Record a validation outcome.
pub fn record_token_validated(status: &str) {
    TOKENS_VALIDATED.with_label_values(&[status]).inc();
}

/// Record revoked records.
pub fn record_tokens_revoked(reason: &str, count: u64) {
    #[allow(clippy::cast_precision_loss)]
    let amount = count as f64;
    TOKENS_REVOKED.with_label_values(&[reason]).inc_by(amount);
}

/// Record an authentication outcome.
pub fn record_auth_attempt(status: &str) {
    AUTH_ATTEMPTS.with_label_values(&[status]).inc();
}

/// Record a security event.
pub fn record_security_event(event_type: &str) {
    SECURITY_EVENTS.with_label_values(&[event_type]).inc();
}

/// Record a key rotation.
pub fn record_key_rotation() {
    KEY_ROTATIONS.inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_token_issued() {
        record_token_issued("access", "HS256");
        let value = TOKENS_ISSUED
            .with_label_values(&["access", "HS256"])
            .get();
        assert!(value > 0.0);
    }

    #[test]
    fn test_record_security_event() {
        record_security_event("REFRESH_REPLAY");
        let value = SECURITY_EVENTS
            .with_label_values(&["REFRESH_REPLAY"])
            .get();
        assert!(value > 0.0);
    }

    #[test]
    fn test_record_revocations_by_count() {
        let before = TOKENS_REVOKED.with_label_values(&["test"]).get();
        record_tokens_revoked("test", 3);
        let after = TOKENS_REVOKED.with_label_values(&["test"]).get();
        assert!((after - before - 3.0).abs() < f64::EPSILON);
    }
}
