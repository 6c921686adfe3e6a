//! Boundary-facing request and response types.

pub mod request;
pub mod response;

pub use request::{
    parse_json, AuthenticateRequest, RawAuthenticateRequest, RawRefreshRequest,
    RawValidateRequest, RefreshRequest, ValidateRequest,
};
pub use response::{ErrorBody, LogoutResponse, TokenPairResponse, ValidateResponse};
