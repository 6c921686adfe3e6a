//! Shared harness for integration tests.

#![allow(dead_code)]

use argon2::Params;
use std::sync::Arc;
use std::time::Duration;
use token_lifecycle::api::{
    parse_json, AuthenticateRequest, RawAuthenticateRequest, RawRefreshRequest,
    RawValidateRequest, RefreshRequest, ValidateRequest,
};
use token_lifecycle::credentials::{InMemoryIdentityStore, SecretHasher, Subject};
use token_lifecycle::refresh::InMemoryRefreshTokenStore;
use token_lifecycle::{AuthContext, Config, Deadline, ManualClock};

pub const ALICE: &str = "alice";
pub const ALICE_SECRET: &str = "correct horse battery staple";

pub struct Harness {
    pub ctx: AuthContext,
    pub clock: Arc<ManualClock>,
    pub store: Arc<InMemoryRefreshTokenStore>,
    pub identities: Arc<InMemoryIdentityStore>,
}

pub fn fast_hasher() -> Arc<SecretHasher> {
    Arc::new(SecretHasher::with_params(Params::new(1024, 1, 1, None).unwrap()).unwrap())
}

pub fn harness() -> Harness {
    harness_with(Config::default())
}

pub fn harness_with(config: Config) -> Harness {
    let clock = Arc::new(ManualClock::starting_now());
    let hasher = fast_hasher();
    let identities = Arc::new(InMemoryIdentityStore::new());
    identities.insert(
        ALICE,
        Subject::new("user-alice"),
        hasher.hash(ALICE_SECRET).unwrap(),
    );
    let store = Arc::new(InMemoryRefreshTokenStore::new(clock.clone()));

    let ctx = AuthContext::builder(config, identities.clone())
        .clock(clock.clone())
        .hasher(hasher)
        .refresh_store(store.clone())
        .build()
        .unwrap();

    Harness {
        ctx,
        clock,
        store,
        identities,
    }
}

pub fn deadline() -> Deadline {
    Deadline::after(Duration::from_secs(5))
}

pub fn login_request(username: &str, secret: &str) -> AuthenticateRequest {
    let body = serde_json::json!({ "username": username, "secret": secret }).to_string();
    let raw: RawAuthenticateRequest = parse_json(body.as_bytes()).unwrap();
    AuthenticateRequest::try_from(raw).unwrap()
}

pub fn validate_request(token: &str) -> ValidateRequest {
    let body = serde_json::json!({ "accessToken": token }).to_string();
    let raw: RawValidateRequest = parse_json(body.as_bytes()).unwrap();
    ValidateRequest::try_from(raw).unwrap()
}

pub fn refresh_request(token: &str) -> RefreshRequest {
    let body = serde_json::json!({ "refreshToken": token }).to_string();
    let raw: RawRefreshRequest = parse_json(body.as_bytes()).unwrap();
    RefreshRequest::try_from(raw).unwrap()
}
