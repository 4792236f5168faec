//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint. Handlers only
//! translate between HTTP and the [`DistributedCache`] contract; every
//! backend behaves identically behind them.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use tracing::{debug, info};

use crate::cache::{DistributedCache, EntryOptions, MemoryCache, MemoryStore, RedisCache};
use crate::config::{BackendKind, Config};
use crate::error::{CacheError, Result};
use crate::models::{
    CounterResponse, GetResponse, HashFieldResponse, HashMutationResponse, HashResponse,
    HashSetRequest, HealthResponse, IncrementRequest, KeyResponse, KeysResponse, LockRequest,
    LockResponse, PatternQuery, RemovedResponse, SetRequest,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Backend serving every request
    pub cache: Arc<dyn DistributedCache>,
    /// Expiration for writes that do not specify one
    pub default_entry: EntryOptions,
}

impl AppState {
    /// Creates a new AppState over the given backend.
    pub fn new(cache: Arc<dyn DistributedCache>, default_entry: EntryOptions) -> Self {
        Self {
            cache,
            default_entry,
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// The Redis backend connects lazily on the first request.
    pub fn from_config(config: &Config) -> Result<Self> {
        let cache: Arc<dyn DistributedCache> = match config.backend {
            BackendKind::Memory => Arc::new(
                MemoryCache::new(MemoryStore::new())
                    .with_instance_name(config.redis.instance_name.clone()),
            ),
            BackendKind::Redis => Arc::new(RedisCache::new(config.redis.clone())?),
        };
        info!(backend = cache.backend_name(), "Cache backend initialized");

        Ok(Self::new(cache, config.default_entry.into()))
    }
}

fn seconds(secs: Option<u64>) -> Option<Duration> {
    secs.map(Duration::from_secs)
}

// == Entry Handlers ==
/// Handler for PUT /cache/:key
pub async fn set_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<SetRequest>,
) -> Result<Json<KeyResponse>> {
    let options = req.entry_options(&state.default_entry);
    state
        .cache
        .set(&key, req.value.as_bytes(), &options)
        .await?;

    debug!(key = %key, "Entry stored");
    Ok(Json(KeyResponse::new(key, "set")))
}

/// Handler for GET /cache/:key
///
/// A hit also re-arms the entry's sliding window.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    match state.cache.get(&key).await? {
        Some(payload) => Ok(Json(GetResponse::new(key, &payload))),
        None => Err(CacheError::NotFound(key)),
    }
}

/// Handler for DELETE /cache/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<KeyResponse>> {
    state.cache.remove(&key).await?;
    Ok(Json(KeyResponse::new(key, "deleted")))
}

/// Handler for POST /cache/:key/refresh
pub async fn refresh_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<KeyResponse>> {
    state.cache.refresh(&key).await?;
    Ok(Json(KeyResponse::new(key, "refreshed")))
}

// == Key Search Handlers ==
/// Handler for GET /keys?pattern=
pub async fn find_keys_handler(
    State(state): State<AppState>,
    Query(query): Query<PatternQuery>,
) -> Result<Json<KeysResponse>> {
    let keys = state.cache.find_keys(&query.pattern).await?;
    Ok(Json(KeysResponse {
        pattern: query.pattern,
        keys,
    }))
}

/// Handler for DELETE /keys?pattern=
pub async fn remove_pattern_handler(
    State(state): State<AppState>,
    Query(query): Query<PatternQuery>,
) -> Result<Json<RemovedResponse>> {
    let removed = state.cache.remove_pattern(&query.pattern).await?;
    info!(pattern = %query.pattern, removed, "Keys removed by pattern");

    Ok(Json(RemovedResponse {
        pattern: query.pattern,
        removed,
    }))
}

// == Hash Handlers ==
/// Handler for GET /hash/:key
pub async fn hash_get_all_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<HashResponse>> {
    let fields = state.cache.hash_get_all(&key).await?;
    Ok(Json(HashResponse { key, fields }))
}

/// Handler for GET /hash/:key/:field
pub async fn hash_get_handler(
    State(state): State<AppState>,
    Path((key, field)): Path<(String, String)>,
) -> Result<Json<HashFieldResponse>> {
    match state.cache.hash_get(&key, &field).await? {
        Some(value) => Ok(Json(HashFieldResponse { key, field, value })),
        None => Err(CacheError::NotFound(format!("{}/{}", key, field))),
    }
}

/// Handler for PUT /hash/:key/:field
///
/// `changed` reports whether the field was created.
pub async fn hash_set_handler(
    State(state): State<AppState>,
    Path((key, field)): Path<(String, String)>,
    Json(req): Json<HashSetRequest>,
) -> Result<Json<HashMutationResponse>> {
    let changed = state
        .cache
        .hash_set(&key, &field, &req.value, seconds(req.ttl_secs))
        .await?;
    Ok(Json(HashMutationResponse {
        key,
        field,
        changed,
    }))
}

/// Handler for DELETE /hash/:key/:field
pub async fn hash_remove_handler(
    State(state): State<AppState>,
    Path((key, field)): Path<(String, String)>,
) -> Result<Json<HashMutationResponse>> {
    let changed = state.cache.hash_remove(&key, &field).await?;
    Ok(Json(HashMutationResponse {
        key,
        field,
        changed,
    }))
}

/// Handler for POST /hash/:key/:field/incr
///
/// A negative `by` decrements.
pub async fn hash_increment_handler(
    State(state): State<AppState>,
    Path((key, field)): Path<(String, String)>,
    Json(req): Json<IncrementRequest>,
) -> Result<Json<CounterResponse>> {
    let ttl = seconds(req.ttl_secs);
    let value = match req.by.checked_neg() {
        Some(amount) if req.by < 0 => state.cache.hash_decrement(&key, &field, amount, ttl).await?,
        _ => state.cache.hash_increment(&key, &field, req.by, ttl).await?,
    };
    Ok(Json(CounterResponse { key, field, value }))
}

// == Lock Handler ==
/// Handler for POST /locks/:key
///
/// Answers 409 when another owner holds the lock.
pub async fn lock_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<LockRequest>,
) -> Result<Json<LockResponse>> {
    let acquired = state
        .cache
        .try_acquire_lock(&key, Duration::from_secs(req.ttl_secs), req.value.as_deref())
        .await?;

    if !acquired {
        return Err(CacheError::LockHeld(key));
    }
    Ok(Json(LockResponse { key, acquired }))
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.cache.backend_name()))
}
