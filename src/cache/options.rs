//! Entry Options Module
//!
//! Per-write expiration requests and the server-wide defaults they are built from.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// == Entry Options ==
/// Expiration requested for a single `set`.
///
/// `absolute_expiration_relative_to_now` wins over `absolute_expiration` when
/// both are given. An empty value means the entry never expires.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryOptions {
    /// Fixed point in time after which the entry is unreachable
    pub absolute_expiration: Option<DateTime<Utc>>,
    /// Absolute expiration expressed relative to the write time
    pub absolute_expiration_relative_to_now: Option<Duration>,
    /// Window that resets on every successful read
    pub sliding_expiration: Option<Duration>,
}

impl EntryOptions {
    /// Options for an entry that never expires.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_absolute_expiration(mut self, at: DateTime<Utc>) -> Self {
        self.absolute_expiration = Some(at);
        self
    }

    pub fn with_absolute_expiration_relative_to_now(mut self, after: Duration) -> Self {
        self.absolute_expiration_relative_to_now = Some(after);
        self
    }

    pub fn with_sliding_expiration(mut self, window: Duration) -> Self {
        self.sliding_expiration = Some(window);
        self
    }

    /// Returns true if no expiration of any kind was requested.
    pub fn is_persistent(&self) -> bool {
        self.absolute_expiration.is_none()
            && self.absolute_expiration_relative_to_now.is_none()
            && self.sliding_expiration.is_none()
    }
}

// == Cache Options ==
/// Default sliding/absolute windows applied when a caller has no opinion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheOptions {
    /// Sliding window in minutes
    pub sliding_window_minutes: u64,
    /// Absolute lifetime in hours
    pub absolute_expiration_hours: u64,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            sliding_window_minutes: 30,
            absolute_expiration_hours: 1,
        }
    }
}

/// Upper bound for configured default windows (about 10,000 years).
pub const MAX_DEFAULT_WINDOW: Duration = Duration::from_secs(10_000 * 365 * 24 * 3600);

fn bounded_window(count: u64, unit_secs: u64) -> Duration {
    Duration::from_secs(count.saturating_mul(unit_secs)).min(MAX_DEFAULT_WINDOW)
}

impl From<CacheOptions> for EntryOptions {
    fn from(options: CacheOptions) -> Self {
        EntryOptions::new()
            .with_sliding_expiration(bounded_window(options.sliding_window_minutes, 60))
            .with_absolute_expiration_relative_to_now(bounded_window(
                options.absolute_expiration_hours,
                3600,
            ))
    }
}
