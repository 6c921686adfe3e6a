//! Redis-backed refresh token store.
//!
//! Every multi-key mutation runs as a Lua script so Redis executes it
//! atomically. Records are JSON under `{prefix}:rt:{id}`, family membership
//! is a set under `{prefix}:family:{fid}` and family revocation is a flag
//! under `{prefix}:revoked:{fid}`.
//!
//! The scripts touch record keys derived from set members, so this store
//! targets a standalone Redis or a single-slot deployment.

use crate::clock::Clock;
use crate::error::TokenError;
use crate::refresh::record::RefreshTokenRecord;
use crate::refresh::store::{RefreshTokenStore, RotationOutcome};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

static CREATE: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r"
if redis.call('SET', KEYS[1], ARGV[2], 'NX', 'EX', ARGV[3]) then
  redis.call('SADD', KEYS[2], ARGV[1])
  redis.call('EXPIRE', KEYS[2], ARGV[4])
  return 1
end
return 0
",
    )
});

static USE_AND_CREATE_CHILD: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r"
local raw = redis.call('GET', KEYS[1])
if not raw then
  return {'not_found'}
end
local parent = cjson.decode(raw)
if parent.family_root_id ~= ARGV[6] then
  return {'mismatch'}
end
if parent.revoked or redis.call('EXISTS', KEYS[4]) == 1 then
  return {'revoked', parent.family_root_id}
end
if parent.used then
  if parent.replaced_by == ARGV[1] then
    local existing = redis.call('GET', KEYS[2])
    return {'rotated', existing or ARGV[2]}
  end
  return {'conflict', parent.family_root_id}
end
if redis.call('EXISTS', KEYS[2]) == 1 then
  return {'collision'}
end
parent.used = true
parent.replaced_by = ARGV[1]
parent.used_at = tonumber(ARGV[3])
local ttl = redis.call('TTL', KEYS[1])
if ttl > 0 then
  redis.call('SET', KEYS[1], cjson.encode(parent), 'EX', ttl)
else
  redis.call('SET', KEYS[1], cjson.encode(parent))
end
redis.call('SET', KEYS[2], ARGV[2], 'EX', ARGV[4])
redis.call('SADD', KEYS[3], ARGV[1])
redis.call('EXPIRE', KEYS[3], ARGV[5])
return {'rotated', ARGV[2]}
",
    )
});

static REVOKE_FAMILY: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r"
redis.call('SET', KEYS[2], '1', 'EX', ARGV[3])
local count = 0
for _, id in ipairs(redis.call('SMEMBERS', KEYS[1])) do
  local key = ARGV[1] .. id
  local raw = redis.call('GET', key)
  if raw then
    local record = cjson.decode(raw)
    if not record.revoked then
      record.revoked = true
      record.revoked_at = tonumber(ARGV[2])
      local ttl = redis.call('TTL', key)
      if ttl > 0 then
        redis.call('SET', key, cjson.encode(record), 'EX', ttl)
      else
        redis.call('SET', key, cjson.encode(record))
      end
      count = count + 1
    end
  end
end
return count
",
    )
});

/// Extra time records outlive their expiry, for audit and replay detection.
const DEFAULT_RETENTION: Duration = Duration::from_secs(86_400);

/// Refresh token store backed by Redis.
pub struct RedisRefreshTokenStore {
    conn: ConnectionManager,
    prefix: String,
    family_ttl: Duration,
    retention: Duration,
    clock: Arc<dyn Clock>,
}

impl RedisRefreshTokenStore {
    /// Connect to `redis_url`.
    ///
    /// `family_ttl` bounds how long family sets and revocation flags live;
    /// it should be at least the refresh token TTL.
    pub async fn connect(
        redis_url: &str,
        prefix: impl Into<String>,
        family_ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, TokenError> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;

        Ok(RedisRefreshTokenStore {
            conn,
            prefix: prefix.into(),
            family_ttl,
            retention: DEFAULT_RETENTION,
            clock,
        })
    }

    /// How long records outlive their expiry.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    fn record_prefix(&self) -> String {
        format!("{}:rt:", self.prefix)
    }

    fn record_key(&self, id: &str) -> String {
        format!("{}:rt:{}", self.prefix, id)
    }

    fn family_key(&self, family_root_id: &str) -> String {
        format!("{}:family:{}", self.prefix, family_root_id)
    }

    fn revoked_key(&self, family_root_id: &str) -> String {
        format!("{}:revoked:{}", self.prefix, family_root_id)
    }

    fn record_ttl_secs(&self, record: &RefreshTokenRecord) -> u64 {
        let remaining = (record.expires_at - self.clock.now()).num_seconds().max(1);
        u64::try_from(remaining)
            .unwrap_or(1)
            .saturating_add(self.retention.as_secs())
    }

    fn family_ttl_secs(&self) -> u64 {
        self.family_ttl
            .as_secs()
            .saturating_add(self.retention.as_secs())
    }
}

#[async_trait]
impl RefreshTokenStore for RedisRefreshTokenStore {
    async fn create(&self, record: &RefreshTokenRecord) -> Result<(), TokenError> {
        let mut conn = self.conn.clone();
        let created: i64 = CREATE
            .key(self.record_key(&record.id))
            .key(self.family_key(&record.family_root_id))
            .arg(&record.id)
            .arg(serde_json::to_string(record)?)
            .arg(self.record_ttl_secs(record))
            .arg(self.family_ttl_secs())
            .invoke_async(&mut conn)
            .await?;

        if created == 0 {
            return Err(TokenError::internal("refresh token id collision"));
        }
        debug!(token_id = %record.id, family_id = %record.family_root_id, "Stored refresh token");
        Ok(())
    }

    async fn use_and_create_child(
        &self,
        token_id: &str,
        child: &RefreshTokenRecord,
    ) -> Result<RotationOutcome, TokenError> {
        if child.parent_id.as_deref() != Some(token_id) {
            return Err(TokenError::internal("child does not descend from parent"));
        }

        let mut conn = self.conn.clone();
        let reply: Vec<String> = USE_AND_CREATE_CHILD
            .key(self.record_key(token_id))
            .key(self.record_key(&child.id))
            .key(self.family_key(&child.family_root_id))
            .key(self.revoked_key(&child.family_root_id))
            .arg(&child.id)
            .arg(serde_json::to_string(child)?)
            .arg(self.clock.timestamp())
            .arg(self.record_ttl_secs(child))
            .arg(self.family_ttl_secs())
            .arg(&child.family_root_id)
            .invoke_async(&mut conn)
            .await?;

        match reply.as_slice() {
            [status] if status == "not_found" => Ok(RotationOutcome::NotFound),
            [status] if status == "mismatch" => {
                Err(TokenError::internal("child does not descend from parent"))
            }
            [status] if status == "collision" => {
                Err(TokenError::internal("refresh token id collision"))
            }
            [status, json] if status == "rotated" => {
                Ok(RotationOutcome::Rotated(serde_json::from_str(json)?))
            }
            [status, fid] if status == "conflict" => Ok(RotationOutcome::Conflict {
                family_root_id: fid.clone(),
            }),
            [status, fid] if status == "revoked" => Ok(RotationOutcome::Revoked {
                family_root_id: fid.clone(),
            }),
            _ => Err(TokenError::internal("unexpected rotation script reply")),
        }
    }

    async fn revoke_family(&self, family_root_id: &str) -> Result<u64, TokenError> {
        let mut conn = self.conn.clone();
        let count: u64 = REVOKE_FAMILY
            .key(self.family_key(family_root_id))
            .key(self.revoked_key(family_root_id))
            .arg(self.record_prefix())
            .arg(self.clock.timestamp())
            .arg(self.family_ttl_secs())
            .invoke_async(&mut conn)
            .await?;
        Ok(count)
    }

    async fn get(&self, token_id: &str) -> Result<Option<RefreshTokenRecord>, TokenError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(self.record_key(token_id)).await?;
        raw.map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(TokenError::from)
    }

    async fn is_family_revoked(&self, family_root_id: &str) -> Result<bool, TokenError> {
        let mut conn = self.conn.clone();
        let revoked: bool = conn.exists(self.revoked_key(family_root_id)).await?;
        Ok(revoked)
    }
}
