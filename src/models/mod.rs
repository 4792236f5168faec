//! Request and Response models for the cache server API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{HashSetRequest, IncrementRequest, LockRequest, PatternQuery, SetRequest};
pub use responses::{
    CounterResponse, GetResponse, HashFieldResponse, HashMutationResponse, HashResponse,
    HealthResponse, KeyResponse, KeysResponse, LockResponse, RemovedResponse,
};
