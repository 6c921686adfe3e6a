//! Signing key lifecycle: generation, verification and rotation.

pub mod manager;
pub mod material;
pub mod rotation;

pub use manager::{KeySet, SigningKeyManager};
pub use material::SigningKey;
pub use rotation::RotationScheduler;
