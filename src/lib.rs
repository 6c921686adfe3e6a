//! Token lifecycle core.
//!
//! Verifies credentials, issues signed access/refresh token pairs,
//! validates access tokens across signing key rotation and rotates
//! single-use refresh tokens with replay detection.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod clock;
pub mod config;
pub mod context;
pub mod credentials;
pub mod deadline;
pub mod error;
pub mod issuer;
pub mod jwt;
pub mod keys;
pub mod metrics;
pub mod observability;
pub mod refresh;
pub mod retry;
pub mod validator;

// Re-exports for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, SigningAlgorithm};
pub use context::{AuthContext, AuthContextBuilder};
pub use credentials::Subject;
pub use deadline::Deadline;
pub use error::{ErrorCode, TokenError};
pub use issuer::{TokenIssuer, TokenPair};
pub use validator::TokenValidator;
