//! API Routes
//!
//! Configures the Axum router with all cache server endpoints.

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    delete_handler, find_keys_handler, get_handler, hash_get_all_handler, hash_get_handler,
    hash_increment_handler, hash_remove_handler, hash_set_handler, health_handler, lock_handler,
    refresh_handler, remove_pattern_handler, set_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `PUT|GET|DELETE /cache/:key` - Store, read or remove an entry
/// - `POST /cache/:key/refresh` - Re-arm an entry's sliding window
/// - `GET|DELETE /keys?pattern=` - Find or remove keys by glob pattern
/// - `GET /hash/:key` - Read a whole hash bucket
/// - `GET|PUT|DELETE /hash/:key/:field` - Hash field operations
/// - `POST /hash/:key/:field/incr` - Increment or decrement a counter field
/// - `POST /locks/:key` - Try to acquire a lock
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/cache/:key",
            put(set_handler).get(get_handler).delete(delete_handler),
        )
        .route("/cache/:key/refresh", post(refresh_handler))
        .route(
            "/keys",
            get(find_keys_handler).delete(remove_pattern_handler),
        )
        .route("/hash/:key", get(hash_get_all_handler))
        .route(
            "/hash/:key/:field",
            get(hash_get_handler)
                .put(hash_set_handler)
                .delete(hash_remove_handler),
        )
        .route("/hash/:key/:field/incr", post(hash_increment_handler))
        .route("/locks/:key", post(lock_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
