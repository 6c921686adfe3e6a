//! Access and refresh token claims and their compact JWS form.

pub mod builder;
pub mod claims;
pub mod serializer;

pub use builder::AccessClaimsBuilder;
pub use claims::{AccessClaims, RefreshClaims, TokenClaims, TokenType};
pub use serializer::{EncodedToken, JwsHeader, JwsSerializer, Verified, MAX_TOKEN_LEN};
