//! Cache Module
//!
//! The cache contract shared by every backend, the expiration engine, and the
//! two backends: Redis and an in-process store.

pub mod blocking;
mod entry;
pub mod expiration;
pub mod memory;
mod options;
pub mod redis;


use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::error::{CacheError, Result};

// Re-export public types
pub use blocking::BlockingCache;
pub use entry::CacheEntry;
pub use memory::{MemoryCache, MemoryStore};
pub use options::{CacheOptions, EntryOptions};
pub use self::redis::{
    ConnectionParams, RedisCache, RedisCacheOptions, ServerCapability, ServerCommands,
};

// == Public Constants ==
/// Bucket lifetime armed by `hash_set` when the caller gives none
pub const DEFAULT_HASH_EXPIRATION: Duration = Duration::from_secs(60 * 60);

// == Cache Contract ==
/// Capability surface implemented by every backend.
///
/// Misses are `Ok(None)`; only invalid arguments, unsupported commands and
/// backend failures produce errors. Nothing is retried.
#[async_trait]
pub trait DistributedCache: Send + Sync {
    /// Short backend name for logs and health output
    fn backend_name(&self) -> &'static str;

    /// Returns the payload stored under `key`, refreshing its sliding window.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Stores `value` under `key` with the requested expiration.
    async fn set(&self, key: &str, value: &[u8], options: &EntryOptions) -> Result<()>;

    /// Re-arms the sliding window of `key` without reading the payload.
    async fn refresh(&self, key: &str) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;

    /// Enumerates keys matching a glob pattern.
    ///
    /// This scans the whole keyspace and is not paginated.
    async fn find_keys(&self, pattern: &str) -> Result<Vec<String>>;

    /// Removes the given keys and returns how many existed.
    async fn remove_range(&self, keys: &[String]) -> Result<u64>;

    /// Removes every key matching `pattern`. Same cost as [`find_keys`](Self::find_keys).
    async fn remove_pattern(&self, pattern: &str) -> Result<u64> {
        require("pattern", pattern)?;
        let keys = self.find_keys(pattern).await?;
        if keys.is_empty() {
            return Ok(0);
        }
        self.remove_range(&keys).await
    }

    async fn hash_get(&self, hash_key: &str, field: &str) -> Result<Option<String>>;

    /// Sets a field; returns true when the field was newly created.
    async fn hash_set(
        &self,
        hash_key: &str,
        field: &str,
        value: &str,
        expiration: Option<Duration>,
    ) -> Result<bool>;

    async fn hash_increment(
        &self,
        hash_key: &str,
        field: &str,
        by: i64,
        expiration: Option<Duration>,
    ) -> Result<i64>;

    async fn hash_decrement(
        &self,
        hash_key: &str,
        field: &str,
        by: i64,
        expiration: Option<Duration>,
    ) -> Result<i64>;

    async fn hash_get_all(&self, hash_key: &str) -> Result<HashMap<String, String>>;

    async fn hash_remove(&self, hash_key: &str, field: &str) -> Result<bool>;

    async fn hash_field_exists(&self, hash_key: &str, field: &str) -> Result<bool>;

    /// Arms a TTL on a whole key; returns false when the key does not exist.
    async fn key_expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Arms a TTL on individual hash fields.
    ///
    /// Fails with `NotSupported` when the backend lacks field-level TTL.
    async fn hash_fields_expire(
        &self,
        hash_key: &str,
        fields: &[String],
        ttl: Duration,
    ) -> Result<bool>;

    /// Attempts a single non-blocking acquisition of `key` for `ttl`.
    ///
    /// `value` identifies the owner and defaults to a timestamp token.
    async fn try_acquire_lock(&self, key: &str, ttl: Duration, value: Option<&str>)
        -> Result<bool>;

    /// Reads `key` as UTF-8 text.
    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        match self.get(key).await? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| CacheError::InvalidArgument(format!("value is not UTF-8: {}", e))),
            None => Ok(None),
        }
    }

    /// Stores `value` under `key` as UTF-8 text.
    async fn set_string(&self, key: &str, value: &str, options: &EntryOptions) -> Result<()> {
        self.set(key, value.as_bytes(), options).await
    }
}

// == Argument Validation ==
/// Rejects empty required string arguments.
pub(crate) fn require(name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(CacheError::empty(name));
    }
    Ok(())
}

/// Lock TTL in whole milliseconds. Sub-millisecond and unrepresentable TTLs
/// are `OutOfRange`.
pub(crate) fn lock_ttl_millis(ttl: Duration) -> Result<i64> {
    let millis = expiration::ttl_millis(ttl)?;
    if millis == 0 {
        return Err(CacheError::OutOfRange(
            "lock ttl must be at least 1ms".to_string(),
        ));
    }
    Ok(millis)
}

/// Default lock owner: ticks of the current time.
pub(crate) fn lock_token() -> String {
    expiration::to_ticks(Utc::now()).to_string()
}

// == Cancellation ==
/// Runs `operation` unless `token` is already cancelled.
///
/// The token is checked once before the operation starts; an operation that
/// has started runs to completion.
pub async fn run_cancellable<F, T>(token: &CancellationToken, operation: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if token.is_cancelled() {
        return Err(CacheError::Cancelled);
    }
    operation.await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_rejects_empty() {
        assert!(matches!(require("key", ""), Err(CacheError::InvalidArgument(_))));
        assert!(require("key", "k").is_ok());
    }

    #[test]
    fn test_lock_ttl_bounds() {
        assert_eq!(lock_ttl_millis(Duration::from_secs(2)).unwrap(), 2_000);
        assert!(matches!(
            lock_ttl_millis(Duration::ZERO),
            Err(CacheError::OutOfRange(_))
        ));
        assert!(matches!(
            lock_ttl_millis(Duration::from_micros(500)),
            Err(CacheError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_lock_token_is_numeric() {
        assert!(lock_token().parse::<i64>().unwrap() > expiration::UNIX_EPOCH_TICKS);
    }

    #[tokio::test]
    async fn test_run_cancellable_checks_before_start() {
        let token = CancellationToken::new();
        token.cancel();

        let result = run_cancellable(&token, async { Ok(1) }).await;
        assert!(matches!(result, Err(CacheError::Cancelled)));
    }

    #[tokio::test]
    async fn test_run_cancellable_runs_when_live() {
        let token = CancellationToken::new();
        let result = run_cancellable(&token, async { Ok(7) }).await.unwrap();
        assert_eq!(result, 7);
    }
}
