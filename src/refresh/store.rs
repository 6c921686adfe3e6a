//! Storage contract for refresh token records.

use crate::error::TokenError;
use crate::refresh::record::RefreshTokenRecord;
use async_trait::async_trait;

/// Result of an atomic "mark used and create child" step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationOutcome {
    /// Parent marked used, child persisted.
    Rotated(RefreshTokenRecord),
    /// Parent was already used by a different child: replay.
    Conflict {
        /// Family the replayed token belongs to
        family_root_id: String,
    },
    /// Parent or its family is revoked.
    Revoked {
        /// Family the token belongs to
        family_root_id: String,
    },
    /// No record with that id.
    NotFound,
}

/// Persistence for refresh token records and their lineage.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Persist a new record.
    async fn create(&self, record: &RefreshTokenRecord) -> Result<(), TokenError>;

    /// Atomically flip `used` on `token_id` and persist `child`.
    ///
    /// Linearizable per id. Re-submitting the child that already replaced
    /// the parent returns [`RotationOutcome::Rotated`].
    async fn use_and_create_child(
        &self,
        token_id: &str,
        child: &RefreshTokenRecord,
    ) -> Result<RotationOutcome, TokenError>;

    /// Revoke every record in the family; returns how many changed.
    async fn revoke_family(&self, family_root_id: &str) -> Result<u64, TokenError>;

    /// Fetch a record by id.
    async fn get(&self, token_id: &str) -> Result<Option<RefreshTokenRecord>, TokenError>;

    /// Whether the family has been revoked.
    async fn is_family_revoked(&self, family_root_id: &str) -> Result<bool, TokenError>;
}
