//! API Module
//!
//! HTTP handlers and routing for the cache server REST API.
//!
//! # Endpoints
//! - `/cache/:key` - Entry set, get, delete and refresh
//! - `/keys` - Pattern search and bulk removal
//! - `/hash/:key[/:field]` - Hash bucket operations
//! - `/locks/:key` - Non-blocking locks
//! - `/health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
