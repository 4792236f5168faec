//! In-Process Cache Module
//!
//! A [`DistributedCache`] over a concurrent map, for tests and single-process
//! deployments.
//!
//! # Known limitations
//! - Expiration is validated but never enforced: `refresh`, `key_expire` and
//!   `hash_fields_expire` are accepted and have no effect, and locks never
//!   time out.
//! - Hash buckets are not field maps. A bucket is a single stored string and a
//!   field "exists" when that string contains the field name as a substring.
//!   Field names that are substrings of one another cannot be told apart and a
//!   bucket holds one logical value. Existing callers depend on this exact
//!   behavior, so it is kept as is.
//! - Key patterns follow Redis `KEYS` syntax, except that an empty or
//!   unterminated `[...]` class is rejected as an invalid argument.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use glob::Pattern;
use tracing::debug;

use crate::cache::{
    expiration, lock_token, lock_ttl_millis, require, DistributedCache, EntryOptions,
};
use crate::error::{CacheError, Result};

// == Memory Store ==
/// Owned storage behind one or more [`MemoryCache`] handles.
///
/// Clones share data; separately created stores never do.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored keys across all instance prefixes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every stored key.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

// == Memory Cache ==
/// In-process cache backend.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    store: MemoryStore,
    instance: String,
}

impl MemoryCache {
    // == Constructor ==
    /// Creates a cache over `store` with no instance prefix.
    pub fn new(store: MemoryStore) -> Self {
        Self {
            store,
            instance: String::new(),
        }
    }

    /// Sets the prefix prepended to every key.
    pub fn with_instance_name(mut self, instance: impl Into<String>) -> Self {
        self.instance = instance.into();
        self
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    fn physical(&self, key: &str) -> String {
        format!("{}{}", self.instance, key)
    }

    /// Applies `delta` to a bucket whose value contains `field`.
    ///
    /// The read-modify-write happens under the map's entry lock.
    fn apply_delta(&self, hash_key: &str, field: &str, delta: i64) -> Result<i64> {
        require("hash_key", hash_key)?;
        require("field", field)?;

        let Some(mut slot) = self.store.entries.get_mut(&self.physical(hash_key)) else {
            return Ok(0);
        };

        let current = String::from_utf8_lossy(slot.value()).into_owned();
        if !current.contains(field) {
            return Ok(0);
        }

        let result = current
            .trim()
            .parse::<i64>()
            .unwrap_or(0)
            .checked_add(delta)
            .ok_or_else(|| CacheError::OutOfRange("hash increment overflows i64".to_string()))?;
        *slot = result.to_string().into_bytes();
        Ok(result)
    }

    fn bucket_contains(&self, hash_key: &str, field: &str) -> bool {
        self.store
            .entries
            .get(&self.physical(hash_key))
            .map(|value| String::from_utf8_lossy(value.value()).contains(field))
            .unwrap_or(false)
    }
}

#[async_trait]
impl DistributedCache for MemoryCache {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        require("key", key)?;
        Ok(self
            .store
            .entries
            .get(&self.physical(key))
            .map(|value| value.value().clone()))
    }

    async fn set(&self, key: &str, value: &[u8], options: &EntryOptions) -> Result<()> {
        require("key", key)?;
        // Validated for parity with Redis, then discarded
        expiration::absolute_expiration(Utc::now(), options)?;

        self.store.entries.insert(self.physical(key), value.to_vec());
        Ok(())
    }

    async fn refresh(&self, key: &str) -> Result<()> {
        require("key", key)
    }

    async fn remove(&self, key: &str) -> Result<()> {
        require("key", key)?;
        self.store.entries.remove(&self.physical(key));
        Ok(())
    }

    async fn find_keys(&self, pattern: &str) -> Result<Vec<String>> {
        require("pattern", pattern)?;
        let matcher = redis_glob(pattern)?;

        Ok(self
            .store
            .entries
            .iter()
            .filter_map(|item| item.key().strip_prefix(self.instance.as_str()).map(str::to_string))
            .filter(|key| matcher.matches(key))
            .collect())
    }

    async fn remove_range(&self, keys: &[String]) -> Result<u64> {
        let removed = keys
            .iter()
            .filter(|key| self.store.entries.remove(&self.physical(key)).is_some())
            .count() as u64;

        debug!("Memory cache removed {} of {} keys", removed, keys.len());
        Ok(removed)
    }

    async fn hash_get(&self, hash_key: &str, field: &str) -> Result<Option<String>> {
        require("hash_key", hash_key)?;
        require("field", field)?;

        Ok(self
            .store
            .entries
            .get(&self.physical(hash_key))
            .map(|value| String::from_utf8_lossy(value.value()).into_owned())
            .filter(|value| value.contains(field)))
    }

    /// Overwrites an existing bucket whose value contains `field`; returns
    /// true when it did. Absent buckets are not created.
    async fn hash_set(
        &self,
        hash_key: &str,
        field: &str,
        value: &str,
        _expiration: Option<Duration>,
    ) -> Result<bool> {
        require("hash_key", hash_key)?;
        require("field", field)?;

        let Some(mut slot) = self.store.entries.get_mut(&self.physical(hash_key)) else {
            return Ok(false);
        };
        if !String::from_utf8_lossy(slot.value()).contains(field) {
            return Ok(false);
        }
        *slot = value.as_bytes().to_vec();
        Ok(true)
    }

    async fn hash_increment(
        &self,
        hash_key: &str,
        field: &str,
        by: i64,
        _expiration: Option<Duration>,
    ) -> Result<i64> {
        self.apply_delta(hash_key, field, by)
    }

    async fn hash_decrement(
        &self,
        hash_key: &str,
        field: &str,
        by: i64,
        _expiration: Option<Duration>,
    ) -> Result<i64> {
        let delta = by
            .checked_neg()
            .ok_or_else(|| CacheError::OutOfRange("hash decrement overflows i64".to_string()))?;
        self.apply_delta(hash_key, field, delta)
    }

    async fn hash_get_all(&self, hash_key: &str) -> Result<HashMap<String, String>> {
        require("hash_key", hash_key)?;

        let mut result = HashMap::new();
        if let Some(value) = self.store.entries.get(&self.physical(hash_key)) {
            result.insert(
                hash_key.to_string(),
                String::from_utf8_lossy(value.value()).into_owned(),
            );
        }
        Ok(result)
    }

    /// Removes the whole bucket when its value contains `field`.
    async fn hash_remove(&self, hash_key: &str, field: &str) -> Result<bool> {
        require("hash_key", hash_key)?;
        require("field", field)?;

        Ok(self
            .store
            .entries
            .remove_if(&self.physical(hash_key), |_, value| {
                String::from_utf8_lossy(value).contains(field)
            })
            .is_some())
    }

    async fn hash_field_exists(&self, hash_key: &str, field: &str) -> Result<bool> {
        require("hash_key", hash_key)?;
        require("field", field)?;
        Ok(self.bucket_contains(hash_key, field))
    }

    async fn key_expire(&self, key: &str, _ttl: Duration) -> Result<bool> {
        require("key", key)?;
        Ok(self.store.entries.contains_key(&self.physical(key)))
    }

    async fn hash_fields_expire(
        &self,
        hash_key: &str,
        fields: &[String],
        _ttl: Duration,
    ) -> Result<bool> {
        require("hash_key", hash_key)?;
        if fields.is_empty() {
            return Err(CacheError::empty("fields"));
        }
        Ok(fields.iter().any(|field| self.bucket_contains(hash_key, field)))
    }

    async fn try_acquire_lock(
        &self,
        key: &str,
        ttl: Duration,
        value: Option<&str>,
    ) -> Result<bool> {
        require("key", key)?;
        lock_ttl_millis(ttl)?;

        match self.store.entries.entry(self.physical(key)) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                let owner = value.map(str::to_string).unwrap_or_else(lock_token);
                slot.insert(owner.into_bytes());
                Ok(true)
            }
        }
    }
}

// == Pattern Translation ==
/// Compiles a Redis `KEYS` pattern into a [`Pattern`].
///
/// Redis escapes with `\`, negates classes with `^` and treats runs of `*` as
/// one wildcard; `glob` has no escape, negates with `!` and gives `**` a
/// path meaning.
fn redis_glob(pattern: &str) -> Result<Pattern> {
    let mut translated = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' => {
                while chars.peek() == Some(&'*') {
                    chars.next();
                }
                translated.push('*');
            }
            '?' => translated.push('?'),
            '\\' => {
                if let Some(escaped) = chars.next() {
                    translated.push_str(&Pattern::escape(&escaped.to_string()));
                }
            }
            '[' => {
                let mut class = String::new();
                let mut negated = false;
                let mut closed = false;
                if chars.peek() == Some(&'^') {
                    chars.next();
                    negated = true;
                }
                while let Some(member) = chars.next() {
                    match member {
                        ']' => {
                            closed = true;
                            break;
                        }
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                class.push(escaped);
                            }
                        }
                        other => class.push(other),
                    }
                }
                if !closed || class.is_empty() {
                    return Err(CacheError::InvalidArgument(format!(
                        "invalid pattern: unterminated or empty class in '{}'",
                        pattern
                    )));
                }
                // A leading '!' is literal in Redis but negates in glob
                if class.starts_with('!') && class.len() > 1 {
                    class.remove(0);
                    class.push('!');
                }
                if class == "!" && !negated {
                    translated.push('!');
                } else {
                    translated.push('[');
                    if negated {
                        translated.push('!');
                    }
                    translated.push_str(&class);
                    translated.push(']');
                }
            }
            other => translated.push_str(&Pattern::escape(&other.to_string())),
        }
    }

    Pattern::new(&translated)
        .map_err(|e| CacheError::InvalidArgument(format!("invalid pattern: {}", e)))
}
