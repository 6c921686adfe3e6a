//! Refresh token records and their lineage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a single refresh token record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTokenState {
    /// Live and never presented
    Issued,
    /// Exchanged for a child
    Used,
    /// Past its expiry without being used
    Expired,
    /// Revoked, alone or with its family
    Revoked,
}

/// Persisted refresh token.
///
/// The root of a family has `family_root_id == id` and no parent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    /// Record id; the `jti` of the refresh token
    pub id: String,
    /// Id of the family root
    pub family_root_id: String,
    /// Record this one replaced, if any
    pub parent_id: Option<String>,
    /// Owner of the session
    pub subject: String,
    /// Issue time
    #[serde(with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,
    /// Expiry time
    #[serde(with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
    /// Exchanged for a child
    pub used: bool,
    /// Revoked, alone or with its family
    pub revoked: bool,
    /// Child that replaced this record
    #[serde(default)]
    pub replaced_by: Option<String>,
    /// When the record was exchanged
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub used_at: Option<DateTime<Utc>>,
    /// When the record was revoked
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub revoked_at: Option<DateTime<Utc>>,
}

impl RefreshTokenRecord {
    /// Start a new family.
    pub fn root(
        id: String,
        subject: String,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        RefreshTokenRecord {
            family_root_id: id.clone(),
            id,
            parent_id: None,
            subject,
            issued_at,
            expires_at,
            used: false,
            revoked: false,
            replaced_by: None,
            used_at: None,
            revoked_at: None,
        }
    }

    /// Continue an existing family without a known parent.
    ///
    /// Used when a fresh pair is issued into a family that already exists.
    pub fn in_family(
        id: String,
        family_root_id: String,
        subject: String,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        RefreshTokenRecord {
            family_root_id,
            ..Self::root(id, subject, issued_at, expires_at)
        }
    }

    /// Successor of `self` in the same family.
    pub fn child(&self, id: String, issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        RefreshTokenRecord {
            family_root_id: self.family_root_id.clone(),
            parent_id: Some(self.id.clone()),
            ..Self::root(id, self.subject.clone(), issued_at, expires_at)
        }
    }

    /// Whether this record started its family.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none() && self.id == self.family_root_id
    }

    /// Expiry is exclusive: the record is expired at `expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// State as seen at `now`. Revocation wins over every other state.
    pub fn state(&self, now: DateTime<Utc>) -> RefreshTokenState {
        if self.revoked {
            RefreshTokenState::Revoked
        } else if self.used {
            RefreshTokenState::Used
        } else if self.is_expired_at(now) {
            RefreshTokenState::Expired
        } else {
            RefreshTokenState::Issued
        }
    }

    pub(crate) fn mark_used(&mut self, child_id: &str, at: DateTime<Utc>) {
        self.used = true;
        self.replaced_by = Some(child_id.to_string());
        self.used_at = Some(at);
    }

    pub(crate) fn revoke(&mut self, at: DateTime<Utc>) -> bool {
        if self.revoked {
            return false;
        }
        self.revoked = true;
        self.revoked_at = Some(at);
        true
    }
}
