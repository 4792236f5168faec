//! Blocking Cache Module
//!
//! Synchronous call path over any [`DistributedCache`]. Every method drives
//! the same async implementation to completion on a private runtime, so both
//! paths return identical results.
//!
//! Must not be used from inside an async runtime; `block_on` panics there.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::{Builder, Runtime};
use tokio_util::sync::CancellationToken;

use crate::cache::{run_cancellable, DistributedCache, EntryOptions};
use crate::error::{CacheError, Result};

// == Blocking Cache ==
/// Blocking facade over a shared cache backend.
pub struct BlockingCache {
    inner: Arc<dyn DistributedCache>,
    runtime: Runtime,
    cancellation: CancellationToken,
}

impl BlockingCache {
    // == Constructor ==
    /// Wraps `inner` with a single-worker runtime.
    ///
    /// The worker keeps background connection tasks (such as the Redis
    /// multiplexer) running between calls.
    pub fn new(inner: Arc<dyn DistributedCache>) -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("blocking-cache")
            .enable_all()
            .build()
            .map_err(|e| CacheError::Internal(format!("failed to build runtime: {}", e)))?;

        Ok(Self {
            inner,
            runtime,
            cancellation: CancellationToken::new(),
        })
    }

    /// Token checked before every call; cancel it to reject further calls.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn inner(&self) -> &Arc<dyn DistributedCache> {
        &self.inner
    }

    fn run<T>(&self, operation: impl Future<Output = Result<T>>) -> Result<T> {
        self.runtime
            .block_on(run_cancellable(&self.cancellation, operation))
    }

    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.run(self.inner.get(key))
    }

    pub fn set(&self, key: &str, value: &[u8], options: &EntryOptions) -> Result<()> {
        self.run(self.inner.set(key, value, options))
    }

    pub fn refresh(&self, key: &str) -> Result<()> {
        self.run(self.inner.refresh(key))
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.run(self.inner.remove(key))
    }

    pub fn get_string(&self, key: &str) -> Result<Option<String>> {
        self.run(self.inner.get_string(key))
    }

    pub fn set_string(&self, key: &str, value: &str, options: &EntryOptions) -> Result<()> {
        self.run(self.inner.set_string(key, value, options))
    }

    /// Full keyspace scan, see [`DistributedCache::find_keys`].
    pub fn find_keys(&self, pattern: &str) -> Result<Vec<String>> {
        self.run(self.inner.find_keys(pattern))
    }

    pub fn remove_range(&self, keys: &[String]) -> Result<u64> {
        self.run(self.inner.remove_range(keys))
    }

    pub fn remove_pattern(&self, pattern: &str) -> Result<u64> {
        self.run(self.inner.remove_pattern(pattern))
    }

    pub fn hash_get(&self, hash_key: &str, field: &str) -> Result<Option<String>> {
        self.run(self.inner.hash_get(hash_key, field))
    }

    pub fn hash_set(
        &self,
        hash_key: &str,
        field: &str,
        value: &str,
        expiration: Option<Duration>,
    ) -> Result<bool> {
        self.run(self.inner.hash_set(hash_key, field, value, expiration))
    }

    pub fn hash_increment(
        &self,
        hash_key: &str,
        field: &str,
        by: i64,
        expiration: Option<Duration>,
    ) -> Result<i64> {
        self.run(self.inner.hash_increment(hash_key, field, by, expiration))
    }

    pub fn hash_decrement(
        &self,
        hash_key: &str,
        field: &str,
        by: i64,
        expiration: Option<Duration>,
    ) -> Result<i64> {
        self.run(self.inner.hash_decrement(hash_key, field, by, expiration))
    }

    pub fn hash_get_all(&self, hash_key: &str) -> Result<HashMap<String, String>> {
        self.run(self.inner.hash_get_all(hash_key))
    }

    pub fn hash_remove(&self, hash_key: &str, field: &str) -> Result<bool> {
        self.run(self.inner.hash_remove(hash_key, field))
    }

    pub fn hash_field_exists(&self, hash_key: &str, field: &str) -> Result<bool> {
        self.run(self.inner.hash_field_exists(hash_key, field))
    }

    pub fn key_expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        self.run(self.inner.key_expire(key, ttl))
    }

    pub fn hash_fields_expire(
        &self,
        hash_key: &str,
        fields: &[String],
        ttl: Duration,
    ) -> Result<bool> {
        self.run(self.inner.hash_fields_expire(hash_key, fields, ttl))
    }

    pub fn try_acquire_lock(&self, key: &str, ttl: Duration, value: Option<&str>) -> Result<bool> {
        self.run(self.inner.try_acquire_lock(key, ttl, value))
    }
}

impl std::fmt::Debug for BlockingCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingCache")
            .field("backend", &self.inner.backend_name())
            .finish()
    }
}
