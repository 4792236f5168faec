//! Advanced Cache - a cache abstraction over Redis and an in-process store
//!
//! Provides sliding and absolute expiration, hash buckets, pattern removal
//! and non-blocking locks behind one [`DistributedCache`] contract, plus an
//! HTTP server exposing it.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;

pub use api::AppState;
pub use cache::{
    BlockingCache, DistributedCache, EntryOptions, MemoryCache, MemoryStore, RedisCache,
    RedisCacheOptions,
};
pub use config::Config;
pub use error::{CacheError, Result};
