//! Response DTOs for the cache server API
//!
//! Defines the structure of outgoing HTTP response bodies.

use std::collections::HashMap;

use serde::Serialize;

/// Response body for GET /cache/:key
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    /// The requested key
    pub key: String,
    /// The stored value, lossily decoded as UTF-8
    pub value: String,
}

impl GetResponse {
    /// Creates a new GetResponse
    pub fn new(key: impl Into<String>, payload: &[u8]) -> Self {
        Self {
            key: key.into(),
            value: String::from_utf8_lossy(payload).into_owned(),
        }
    }
}

/// Success message about a single key (set, delete, refresh)
#[derive(Debug, Clone, Serialize)]
pub struct KeyResponse {
    /// Success message
    pub message: String,
    /// The key that was acted on
    pub key: String,
}

impl KeyResponse {
    /// Creates a new KeyResponse, e.g. `KeyResponse::new("k", "set")`
    pub fn new(key: impl Into<String>, action: &str) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' {} successfully", key, action),
            key,
        }
    }
}

/// Response body for GET /keys
#[derive(Debug, Clone, Serialize)]
pub struct KeysResponse {
    pub pattern: String,
    pub keys: Vec<String>,
}

/// Response body for DELETE /keys
#[derive(Debug, Clone, Serialize)]
pub struct RemovedResponse {
    pub pattern: String,
    /// Number of keys removed
    pub removed: u64,
}

/// Response body for GET /hash/:key
#[derive(Debug, Clone, Serialize)]
pub struct HashResponse {
    pub key: String,
    pub fields: HashMap<String, String>,
}

/// Response body for GET /hash/:key/:field
#[derive(Debug, Clone, Serialize)]
pub struct HashFieldResponse {
    pub key: String,
    pub field: String,
    pub value: String,
}

/// Response body for hash mutations: set reports `created`, delete `removed`
#[derive(Debug, Clone, Serialize)]
pub struct HashMutationResponse {
    pub key: String,
    pub field: String,
    pub changed: bool,
}

/// Response body for POST /hash/:key/:field/incr
#[derive(Debug, Clone, Serialize)]
pub struct CounterResponse {
    pub key: String,
    pub field: String,
    pub value: i64,
}

/// Response body for POST /locks/:key
#[derive(Debug, Clone, Serialize)]
pub struct LockResponse {
    pub key: String,
    pub acquired: bool,
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Backend serving the cache
    pub backend: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy(backend: &str) -> Self {
        Self {
            status: "healthy".to_string(),
            backend: backend.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
