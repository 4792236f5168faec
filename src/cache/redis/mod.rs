//! Redis Cache Module
//!
//! A [`DistributedCache`] backed by a Redis server.
//!
//! Each entry is a Redis hash holding the payload next to its expiration
//! metadata (see [`CacheEntry`]). Redis only knows one TTL per key, so the
//! sliding window is emulated: every read re-arms the key's TTL to
//! `min(remaining absolute, sliding)`.
//!
//! ## Example
//!
//! ```ignore
//! let cache = RedisCache::new(
//!     RedisCacheOptions::from_url("redis://localhost:6379").with_instance_name("app:"),
//! )?;
//! cache.set("greeting", b"hello", &EntryOptions::new()).await?;
//! ```

mod connection;
mod options;

use std::collections::HashMap;
use std::time::Duration;

use ::redis::Script;
use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::entry::{ABSOLUTE_EXPIRATION_FIELD, DATA_FIELD, SLIDING_EXPIRATION_FIELD};
use crate::cache::expiration::{self, NOT_PRESENT};
use crate::cache::{
    lock_token, lock_ttl_millis, require, run_cancellable, CacheEntry, DistributedCache, EntryOptions,
    DEFAULT_HASH_EXPIRATION,
};
use crate::error::{CacheError, Result};

use connection::{Connected, LazyConnection};

pub use connection::ServerCapability;
pub use options::{ConnectionParams, RedisCacheOptions, ServerCommands};

// == Set Script ==
/// Writes payload and metadata in one step.
///
/// KEYS[1] = key, ARGV[1] = absolute expiration ticks, ARGV[2] = sliding
/// expiration ticks, ARGV[3] = TTL in seconds, ARGV[4] = payload. `-1` marks
/// an absent value; the key only gets a TTL when ARGV[3] is not `-1`.
const SET_SCRIPT: &str = r"
redis.call('HSET', KEYS[1], 'absexp', ARGV[1], 'sldexp', ARGV[2], 'data', ARGV[4])
if ARGV[3] ~= '-1' then
  redis.call('EXPIRE', KEYS[1], ARGV[3])
end
return 1";

// == Redis Cache ==
/// Redis-backed cache with emulated sliding expiration.
pub struct RedisCache {
    connection: LazyConnection,
    instance: String,
    set_script: Script,
}

impl RedisCache {
    // == Constructor ==
    /// Creates a cache from options. The connection is opened on first use.
    pub fn new(options: RedisCacheOptions) -> Result<Self> {
        let connection = LazyConnection::new(&options)?;
        Ok(Self {
            connection,
            instance: options.instance_name,
            set_script: Script::new(SET_SCRIPT),
        })
    }

    /// Opens the connection now instead of on first use.
    pub async fn connect(&self, token: &CancellationToken) -> Result<ServerCapability> {
        run_cancellable(token, async {
            self.connection.get().await.map(|connected| connected.capability)
        })
        .await
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// True while a handshake is in flight.
    pub fn is_connecting(&self) -> bool {
        self.connection.is_connecting()
    }

    /// Capability of the current connection, or the declared one before
    /// connecting.
    pub fn capability(&self) -> Option<ServerCapability> {
        self.connection
            .current()
            .map(|connected| connected.capability)
            .or_else(|| self.connection.declared_capability())
    }

    /// Drops the connection. The next operation reconnects.
    pub fn close(&self) {
        if self.connection.close() {
            info!("Redis connection closed");
        }
    }

    pub fn instance_name(&self) -> &str {
        &self.instance
    }

    fn physical(&self, key: &str) -> String {
        format!("{}{}", self.instance, key)
    }

    /// Fails with `NotSupported` unless field-level TTL is available.
    ///
    /// A declared capability is checked without touching the network.
    async fn require_field_ttl(&self) -> Result<()> {
        let capability = match self.connection.declared_capability() {
            Some(capability) => capability,
            None => self.connection.get().await?.capability,
        };

        if capability.supports_field_ttl() {
            Ok(())
        } else {
            Err(CacheError::NotSupported(
                "hash field expiration requires a server with field TTL support".to_string(),
            ))
        }
    }

    /// Reads metadata (and optionally the payload) in one round trip, then
    /// re-arms the TTL when the entry has a sliding window.
    async fn get_and_refresh(&self, key: &str, with_data: bool) -> Result<Option<Vec<u8>>> {
        require("key", key)?;
        let Connected { mut conn, .. } = self.connection.get().await?;
        let physical = self.physical(key);

        let mut cmd = ::redis::cmd("HMGET");
        cmd.arg(&physical)
            .arg(ABSOLUTE_EXPIRATION_FIELD)
            .arg(SLIDING_EXPIRATION_FIELD);
        if with_data {
            cmd.arg(DATA_FIELD);
        }
        let fields: Vec<Option<Vec<u8>>> = cmd.query_async(&mut conn).await?;

        let Some(entry) = CacheEntry::from_fields(fields) else {
            return Ok(None);
        };

        let now = Utc::now();
        if let Some(ttl) = entry.refresh_ttl(now) {
            let _: i64 = ::redis::cmd("PEXPIRE")
                .arg(&physical)
                .arg(expiration::ttl_millis(ttl)?)
                .query_async(&mut conn)
                .await?;
        }

        if entry.is_expired_at(now) {
            return Ok(None);
        }
        Ok(entry.payload)
    }

    async fn increment_by(
        &self,
        hash_key: &str,
        field: &str,
        delta: i64,
        expiration: Option<Duration>,
    ) -> Result<i64> {
        require("hash_key", hash_key)?;
        require("field", field)?;
        if expiration.is_some() {
            self.require_field_ttl().await?;
        }

        let Connected { mut conn, .. } = self.connection.get().await?;
        let result: i64 = ::redis::cmd("HINCRBY")
            .arg(self.physical(hash_key))
            .arg(field)
            .arg(delta)
            .query_async(&mut conn)
            .await?;

        if let Some(ttl) = expiration {
            self.hash_fields_expire(hash_key, &[field.to_string()], ttl)
                .await?;
        }

        Ok(result)
    }
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache")
            .field("instance", &self.instance)
            .field("connected", &self.is_connected())
            .field("connecting", &self.is_connecting())
            .field("capability", &self.capability())
            .finish()
    }
}

#[async_trait]
impl DistributedCache for RedisCache {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.get_and_refresh(key, true).await
    }

    async fn set(&self, key: &str, value: &[u8], options: &EntryOptions) -> Result<()> {
        require("key", key)?;

        let creation_time = Utc::now();
        let absolute = expiration::absolute_expiration(creation_time, options)?;
        let ttl = expiration::ttl_seconds(creation_time, absolute, options.sliding_expiration);
        let entry = CacheEntry::new(value.to_vec(), absolute, options.sliding_expiration);

        let Connected { mut conn, .. } = self.connection.get().await?;
        let _: i64 = self
            .set_script
            .key(self.physical(key))
            .arg(entry.absolute_ticks())
            .arg(entry.sliding_ticks())
            .arg(ttl.unwrap_or(NOT_PRESENT))
            .arg(value)
            .invoke_async(&mut conn)
            .await?;

        Ok(())
    }

    async fn refresh(&self, key: &str) -> Result<()> {
        self.get_and_refresh(key, false).await.map(|_| ())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        require("key", key)?;
        let Connected { mut conn, .. } = self.connection.get().await?;

        let _: i64 = ::redis::cmd("DEL")
            .arg(self.physical(key))
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn find_keys(&self, pattern: &str) -> Result<Vec<String>> {
        require("pattern", pattern)?;
        let Connected { mut conn, .. } = self.connection.get().await?;

        let physical_pattern = format!("{}{}", escape_glob(&self.instance), pattern);
        let keys: Vec<String> = ::redis::cmd("KEYS")
            .arg(&physical_pattern)
            .query_async(&mut conn)
            .await?;

        Ok(keys
            .into_iter()
            .filter_map(|key| key.strip_prefix(self.instance.as_str()).map(str::to_string))
            .collect())
    }

    async fn remove_range(&self, keys: &[String]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let Connected { mut conn, .. } = self.connection.get().await?;

        let physical: Vec<String> = keys.iter().map(|key| self.physical(key)).collect();
        let removed: u64 = ::redis::cmd("DEL")
            .arg(&physical)
            .query_async(&mut conn)
            .await?;

        debug!("Redis removed {} of {} keys", removed, keys.len());
        Ok(removed)
    }

    async fn hash_get(&self, hash_key: &str, field: &str) -> Result<Option<String>> {
        require("hash_key", hash_key)?;
        require("field", field)?;
        let Connected { mut conn, .. } = self.connection.get().await?;

        let value: Option<String> = ::redis::cmd("HGET")
            .arg(self.physical(hash_key))
            .arg(field)
            .query_async(&mut conn)
            .await?;
        Ok(value.filter(|v| !v.is_empty()))
    }

    /// Arms the bucket TTL (one hour unless given) only when the field is new.
    async fn hash_set(
        &self,
        hash_key: &str,
        field: &str,
        value: &str,
        expiration: Option<Duration>,
    ) -> Result<bool> {
        require("hash_key", hash_key)?;
        require("field", field)?;
        let bucket_ttl = expiration::ttl_millis(expiration.unwrap_or(DEFAULT_HASH_EXPIRATION))?;
        let Connected { mut conn, .. } = self.connection.get().await?;
        let physical = self.physical(hash_key);

        let created: i64 = ::redis::cmd("HSET")
            .arg(&physical)
            .arg(field)
            .arg(value)
            .query_async(&mut conn)
            .await?;

        if created > 0 {
            let _: i64 = ::redis::cmd("PEXPIRE")
                .arg(&physical)
                .arg(bucket_ttl)
                .query_async(&mut conn)
                .await?;
        }

        Ok(created > 0)
    }

    async fn hash_increment(
        &self,
        hash_key: &str,
        field: &str,
        by: i64,
        expiration: Option<Duration>,
    ) -> Result<i64> {
        self.increment_by(hash_key, field, by, expiration).await
    }

    async fn hash_decrement(
        &self,
        hash_key: &str,
        field: &str,
        by: i64,
        expiration: Option<Duration>,
    ) -> Result<i64> {
        let delta = by
            .checked_neg()
            .ok_or_else(|| CacheError::OutOfRange("hash decrement overflows i64".to_string()))?;
        self.increment_by(hash_key, field, delta, expiration).await
    }

    async fn hash_get_all(&self, hash_key: &str) -> Result<HashMap<String, String>> {
        require("hash_key", hash_key)?;
        let Connected { mut conn, .. } = self.connection.get().await?;

        let fields: HashMap<String, String> = ::redis::cmd("HGETALL")
            .arg(self.physical(hash_key))
            .query_async(&mut conn)
            .await?;
        Ok(fields)
    }

    async fn hash_remove(&self, hash_key: &str, field: &str) -> Result<bool> {
        require("hash_key", hash_key)?;
        require("field", field)?;
        let Connected { mut conn, .. } = self.connection.get().await?;

        let removed: i64 = ::redis::cmd("HDEL")
            .arg(self.physical(hash_key))
            .arg(field)
            .query_async(&mut conn)
            .await?;
        Ok(removed > 0)
    }

    async fn hash_field_exists(&self, hash_key: &str, field: &str) -> Result<bool> {
        require("hash_key", hash_key)?;
        require("field", field)?;
        let Connected { mut conn, .. } = self.connection.get().await?;

        let exists: bool = ::redis::cmd("HEXISTS")
            .arg(self.physical(hash_key))
            .arg(field)
            .query_async(&mut conn)
            .await?;
        Ok(exists)
    }

    async fn key_expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        require("key", key)?;
        let millis = expiration::ttl_millis(ttl)?;
        let Connected { mut conn, .. } = self.connection.get().await?;

        let armed: bool = ::redis::cmd("PEXPIRE")
            .arg(self.physical(key))
            .arg(millis)
            .query_async(&mut conn)
            .await?;
        Ok(armed)
    }

    async fn hash_fields_expire(
        &self,
        hash_key: &str,
        fields: &[String],
        ttl: Duration,
    ) -> Result<bool> {
        require("hash_key", hash_key)?;
        if fields.is_empty() {
            return Err(CacheError::empty("fields"));
        }
        for field in fields {
            require("field", field)?;
        }
        let millis = expiration::ttl_millis(ttl)?;
        self.require_field_ttl().await?;

        let Connected { mut conn, .. } = self.connection.get().await?;
        // Per field: -2 missing, 0 condition not met, 1 armed, 2 deleted
        let codes: Vec<i64> = ::redis::cmd("HPEXPIRE")
            .arg(self.physical(hash_key))
            .arg(millis)
            .arg("FIELDS")
            .arg(fields.len())
            .arg(fields)
            .query_async(&mut conn)
            .await?;

        Ok(codes.iter().any(|code| *code > 0))
    }

    async fn try_acquire_lock(
        &self,
        key: &str,
        ttl: Duration,
        value: Option<&str>,
    ) -> Result<bool> {
        require("key", key)?;
        let millis = lock_ttl_millis(ttl)?;
        let Connected { mut conn, .. } = self.connection.get().await?;

        let owner = value.map(str::to_string).unwrap_or_else(lock_token);
        let reply: Option<String> = ::redis::cmd("SET")
            .arg(self.physical(key))
            .arg(&owner)
            .arg("NX")
            .arg("PX")
            .arg(millis)
            .query_async(&mut conn)
            .await?;

        let acquired = reply.is_some();
        debug!("Lock '{}' acquired: {}", key, acquired);
        Ok(acquired)
    }
}

/// Escapes glob metacharacters so a prefix matches literally in `KEYS`.
fn escape_glob(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
