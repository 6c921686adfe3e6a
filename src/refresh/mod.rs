//! Refresh token records, persistence and rotation.

pub mod coordinator;
pub mod memory;
pub mod record;
pub mod redis_store;
pub mod store;

pub use coordinator::RefreshCoordinator;
pub use memory::InMemoryRefreshTokenStore;
pub use record::{RefreshTokenRecord, RefreshTokenState};
pub use redis_store::RedisRefreshTokenStore;
pub use store::{RefreshTokenStore, RotationOutcome};
