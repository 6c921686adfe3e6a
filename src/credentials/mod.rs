//! Credential verification and lockout.

pub mod hasher;
pub mod lockout;
pub mod store;
pub mod validator;

pub use hasher::SecretHasher;
pub use lockout::LockoutTracker;
pub use store::{IdentityStore, InMemoryIdentityStore, StoredCredential, Subject};
pub use validator::CredentialValidator;
