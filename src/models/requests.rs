//! Request DTOs for the cache server API
//!
//! Defines the structure of incoming HTTP request bodies and query strings.

use std::time::Duration;

use serde::Deserialize;

use crate::cache::EntryOptions;

/// Request body for the SET operation (PUT /cache/:key)
///
/// # Fields
/// - `value`: The value to store
/// - `absolute_secs`: Optional absolute lifetime in seconds from now
/// - `sliding_secs`: Optional sliding window in seconds
/// - `persist`: Store without expiration even if no window is given
///
/// With no window and `persist` unset, the server default applies.
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// The value to store
    pub value: String,
    #[serde(default)]
    pub absolute_secs: Option<u64>,
    #[serde(default)]
    pub sliding_secs: Option<u64>,
    #[serde(default)]
    pub persist: bool,
}

impl SetRequest {
    /// Builds entry options, falling back to `default` when no window is given.
    pub fn entry_options(&self, default: &EntryOptions) -> EntryOptions {
        if self.absolute_secs.is_none() && self.sliding_secs.is_none() {
            return if self.persist {
                EntryOptions::new()
            } else {
                default.clone()
            };
        }

        let mut options = EntryOptions::new();
        if let Some(secs) = self.absolute_secs {
            options = options.with_absolute_expiration_relative_to_now(Duration::from_secs(secs));
        }
        if let Some(secs) = self.sliding_secs {
            options = options.with_sliding_expiration(Duration::from_secs(secs));
        }
        options
    }
}

/// Query string for the key search endpoints (/keys?pattern=)
#[derive(Debug, Clone, Deserialize)]
pub struct PatternQuery {
    pub pattern: String,
}

/// Request body for PUT /hash/:key/:field
#[derive(Debug, Clone, Deserialize)]
pub struct HashSetRequest {
    pub value: String,
    /// Bucket lifetime armed when the field is created
    #[serde(default)]
    pub ttl_secs: Option<u64>,
}

/// Request body for POST /hash/:key/:field/incr
#[derive(Debug, Clone, Deserialize)]
pub struct IncrementRequest {
    /// Amount to add; negative values decrement
    #[serde(default = "default_increment")]
    pub by: i64,
    /// Per-field TTL, requires field expiration support
    #[serde(default)]
    pub ttl_secs: Option<u64>,
}

fn default_increment() -> i64 {
    1
}

/// Request body for POST /locks/:key
#[derive(Debug, Clone, Deserialize)]
pub struct LockRequest {
    pub ttl_secs: u64,
    /// Owner token, a timestamp token when omitted
    #[serde(default)]
    pub value: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_request_deserialize() {
        let json = r#"{"value": "hello"}"#;
        let req: SetRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.value, "hello");
        assert!(req.absolute_secs.is_none());
        assert!(req.sliding_secs.is_none());
        assert!(!req.persist);
    }

    #[test]
    fn test_set_request_uses_default_without_windows() {
        let req: SetRequest = serde_json::from_str(r#"{"value": "v"}"#).unwrap();
        let default = EntryOptions::new().with_sliding_expiration(Duration::from_secs(60));

        assert_eq!(req.entry_options(&default), default);
    }

    #[test]
    fn test_set_request_persist() {
        let req: SetRequest = serde_json::from_str(r#"{"value": "v", "persist": true}"#).unwrap();
        let default = EntryOptions::new().with_sliding_expiration(Duration::from_secs(60));

        assert!(req.entry_options(&default).is_persistent());
    }

    #[test]
    fn test_set_request_windows() {
        let json = r#"{"value": "v", "absolute_secs": 10, "sliding_secs": 3}"#;
        let req: SetRequest = serde_json::from_str(json).unwrap();
        let options = req.entry_options(&EntryOptions::new());

        assert_eq!(
            options.absolute_expiration_relative_to_now,
            Some(Duration::from_secs(10))
        );
        assert_eq!(options.sliding_expiration, Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_increment_request_default() {
        let req: IncrementRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.by, 1);
        assert!(req.ttl_secs.is_none());
    }
}
