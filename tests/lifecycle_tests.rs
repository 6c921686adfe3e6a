//! End-to-end token lifecycle through the context API.

mod common;

use common::*;
use std::time::Duration;
use token_lifecycle::api::{ErrorBody, TokenPairResponse, ValidateResponse};
use token_lifecycle::refresh::{RefreshTokenState, RefreshTokenStore};
use token_lifecycle::{Clock, Config, TokenError};

#[tokio::test]
async fn test_session_scenario() {
    let h = harness();

    let first = h
        .ctx
        .authenticate(&login_request(ALICE, ALICE_SECRET), &deadline())
        .await
        .unwrap();
    assert_eq!(first.expires_in, 900);

    h.clock.advance(Duration::from_secs(10 * 60));
    let claims = h
        .ctx
        .validate(&validate_request(&first.access.token), &deadline())
        .await
        .unwrap();
    assert_eq!(claims.sub, "user-alice");

    h.clock.advance(Duration::from_secs(6 * 60));
    let err = h
        .ctx
        .validate(&validate_request(&first.access.token), &deadline())
        .await
        .unwrap_err();
    assert!(matches!(err, TokenError::Expired));

    let second = h
        .ctx
        .refresh(&refresh_request(&first.refresh.token), &deadline())
        .await
        .unwrap();
    assert!(h
        .ctx
        .validate(&validate_request(&second.access.token), &deadline())
        .await
        .is_ok());

    let err = h
        .ctx
        .refresh(&refresh_request(&first.refresh.token), &deadline())
        .await
        .unwrap_err();
    assert!(matches!(err, TokenError::ReplayDetected));

    let err = h
        .ctx
        .validate(&validate_request(&second.access.token), &deadline())
        .await
        .unwrap_err();
    assert!(matches!(err, TokenError::Revoked));

    let record = h.store.get(&second.refresh.record.id).await.unwrap().unwrap();
    assert_eq!(record.state(h.clock.now()), RefreshTokenState::Revoked);
}

#[tokio::test]
async fn test_expiry_boundary() {
    let h = harness();
    let pair = h
        .ctx
        .authenticate(&login_request(ALICE, ALICE_SECRET), &deadline())
        .await
        .unwrap();
    let request = validate_request(&pair.access.token);

    h.clock.advance(Duration::from_secs(899));
    assert!(h.ctx.validate(&request, &deadline()).await.is_ok());

    h.clock.advance(Duration::from_secs(1));
    let err = h.ctx.validate(&request, &deadline()).await.unwrap_err();
    assert!(matches!(err, TokenError::Expired));

    h.clock.advance(Duration::from_secs(1));
    let err = h.ctx.validate(&request, &deadline()).await.unwrap_err();
    assert!(matches!(err, TokenError::Expired));
}

#[tokio::test]
async fn test_refresh_chain_stays_in_family() {
    let h = harness();
    let mut pair = h
        .ctx
        .authenticate(&login_request(ALICE, ALICE_SECRET), &deadline())
        .await
        .unwrap();
    let family = pair.refresh.record.family_root_id.clone();

    for _ in 0..5 {
        h.clock.advance(Duration::from_secs(60));
        pair = h
            .ctx
            .refresh(&refresh_request(&pair.refresh.token), &deadline())
            .await
            .unwrap();
        assert_eq!(pair.refresh.record.family_root_id, family);
        assert_eq!(pair.access.claims.fid.as_deref(), Some(family.as_str()));
    }
    assert_eq!(h.store.len(), 6);
}

#[tokio::test]
async fn test_lockout_after_threshold() {
    let config = Config {
        lockout_threshold: 3,
        ..Config::default()
    };
    let h = harness_with(config);

    for _ in 0..3 {
        let err = h
            .ctx
            .authenticate(&login_request(ALICE, "wrong"), &deadline())
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::InvalidCredentials));
    }

    let err = h
        .ctx
        .authenticate(&login_request(ALICE, ALICE_SECRET), &deadline())
        .await
        .unwrap_err();
    assert!(matches!(err, TokenError::AccountLocked));
    assert!(h.store.is_empty());

    h.clock.advance(Duration::from_secs(900));
    assert!(h
        .ctx
        .authenticate(&login_request(ALICE, ALICE_SECRET), &deadline())
        .await
        .is_ok());
}

#[tokio::test]
async fn test_unknown_user_is_invalid_credentials() {
    let h = harness();
    let err = h
        .ctx
        .authenticate(&login_request("mallory", ALICE_SECRET), &deadline())
        .await
        .unwrap_err();
    assert!(matches!(err, TokenError::InvalidCredentials));
}

#[tokio::test]
async fn test_logout_revokes_session() {
    let h = harness();
    let pair = h
        .ctx
        .authenticate(&login_request(ALICE, ALICE_SECRET), &deadline())
        .await
        .unwrap();

    let revoked = h
        .ctx
        .logout(&refresh_request(&pair.refresh.token), &deadline())
        .await
        .unwrap();
    assert_eq!(revoked, 1);

    let err = h
        .ctx
        .validate(&validate_request(&pair.access.token), &deadline())
        .await
        .unwrap_err();
    assert!(matches!(err, TokenError::Revoked));

    let err = h
        .ctx
        .refresh(&refresh_request(&pair.refresh.token), &deadline())
        .await
        .unwrap_err();
    assert!(matches!(err, TokenError::Revoked));
}

#[tokio::test]
async fn test_store_outage_on_authenticate() {
    let h = harness();
    h.store.set_available(false);

    let err = h
        .ctx
        .authenticate(&login_request(ALICE, ALICE_SECRET), &deadline())
        .await
        .unwrap_err();
    assert!(matches!(err, TokenError::StoreUnavailable(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_boundary_bodies() {
    let h = harness();
    let pair = h
        .ctx
        .authenticate(&login_request(ALICE, ALICE_SECRET), &deadline())
        .await
        .unwrap();

    let claims = h
        .ctx
        .validate(&validate_request(&pair.access.token), &deadline())
        .await
        .unwrap();
    let body = serde_json::to_value(ValidateResponse::from(claims)).unwrap();
    assert_eq!(body["valid"], true);
    assert_eq!(body["claims"]["sub"], "user-alice");
    assert_eq!(body["claims"]["typ"], "access");

    let body = serde_json::to_value(TokenPairResponse::from(pair)).unwrap();
    assert_eq!(body["expiresIn"], 900);
    assert_eq!(body["tokenType"], "Bearer");
    assert!(body["accessToken"].as_str().unwrap().split('.').count() == 3);

    let err = h
        .ctx
        .validate(&validate_request("garbage"), &deadline())
        .await
        .unwrap_err();
    let body = serde_json::to_value(ErrorBody::from(&err)).unwrap();
    assert_eq!(body["code"], "TOKEN_MALFORMED");
}
