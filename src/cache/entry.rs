//! Cache Entry Module
//!
//! Defines a stored entry and the codec for its expiration metadata.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::cache::expiration::{
    self, duration_from_ticks, duration_to_ticks, from_ticks, to_ticks, NOT_PRESENT,
};

// == Field Names ==
/// Hash field holding the absolute expiration ticks
pub const ABSOLUTE_EXPIRATION_FIELD: &str = "absexp";
/// Hash field holding the sliding expiration ticks
pub const SLIDING_EXPIRATION_FIELD: &str = "sldexp";
/// Hash field holding the payload
pub const DATA_FIELD: &str = "data";

// == Cache Entry ==
/// Represents a single cache entry with its payload and expiration metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheEntry {
    /// The stored payload, `None` when only metadata was read
    pub payload: Option<Vec<u8>>,
    /// Fixed expiration point, None = no absolute expiration
    pub absolute_expiration: Option<DateTime<Utc>>,
    /// Sliding window, None = no sliding expiration
    pub sliding_expiration: Option<Duration>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry from a payload and already-resolved expirations.
    pub fn new(
        payload: Vec<u8>,
        absolute_expiration: Option<DateTime<Utc>>,
        sliding_expiration: Option<Duration>,
    ) -> Self {
        Self {
            payload: Some(payload),
            absolute_expiration,
            sliding_expiration,
        }
    }

    // == Decode ==
    /// Decodes the reply of `HMGET key absexp sldexp [data]`.
    ///
    /// Returns `None` when the key does not exist (every field is nil).
    /// Unparseable metadata decodes as absent.
    pub fn from_fields(fields: Vec<Option<Vec<u8>>>) -> Option<Self> {
        if fields.iter().all(Option::is_none) {
            return None;
        }

        let mut fields = fields.into_iter();
        let absolute = fields.next().flatten().and_then(|raw| parse_ticks(&raw));
        let sliding = fields.next().flatten().and_then(|raw| parse_ticks(&raw));
        let payload = fields.next().flatten();

        Some(Self {
            payload,
            absolute_expiration: absolute.and_then(from_ticks),
            sliding_expiration: sliding.and_then(duration_from_ticks),
        })
    }

    // == Encode ==
    /// Absolute expiration as ticks, or the sentinel.
    pub fn absolute_ticks(&self) -> i64 {
        self.absolute_expiration.map(to_ticks).unwrap_or(NOT_PRESENT)
    }

    /// Sliding expiration as ticks, or the sentinel.
    pub fn sliding_ticks(&self) -> i64 {
        self.sliding_expiration
            .map(duration_to_ticks)
            .unwrap_or(NOT_PRESENT)
    }

    // == Refresh ==
    /// TTL to re-arm on a read at `now`, see [`expiration::refresh_ttl`].
    pub fn refresh_ttl(&self, now: DateTime<Utc>) -> Option<Duration> {
        expiration::refresh_ttl(now, self.absolute_expiration, self.sliding_expiration)
    }

    // == Is Expired ==
    /// Checks whether the absolute deadline has passed at `now`.
    ///
    /// Boundary condition: an entry is expired once `now` reaches the deadline.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.absolute_expiration {
            Some(at) => now >= at,
            None => false,
        }
    }
}

fn parse_ticks(raw: &[u8]) -> Option<i64> {
    std::str::from_utf8(raw).ok()?.trim().parse().ok()
}
