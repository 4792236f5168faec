//! Expiration Engine
//!
//! Emulates sliding + absolute expiration on top of a store that only knows a
//! single per-key TTL. All functions take the reference time explicitly so the
//! arithmetic can be exercised without a clock.

use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use crate::cache::EntryOptions;
use crate::error::{CacheError, Result};

// == Tick Constants ==
/// Sentinel stored in a metadata field when the value is absent.
pub const NOT_PRESENT: i64 = -1;

/// Ticks (100ns units) per second.
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// Ticks between 0001-01-01T00:00:00Z and the Unix epoch.
pub const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;

/// Longest window whose tick count fits the metadata field.
pub const MAX_WINDOW: Duration = Duration::from_secs((i64::MAX / TICKS_PER_SECOND) as u64);

// == Absolute Expiration ==
/// Resolves the absolute expiration of a write made at `creation_time`.
///
/// Fails with `OutOfRange` if a fixed absolute expiration is not strictly after
/// `creation_time`, or if a relative or sliding window is zero.
pub fn absolute_expiration(
    creation_time: DateTime<Utc>,
    options: &EntryOptions,
) -> Result<Option<DateTime<Utc>>> {
    if let Some(absolute) = options.absolute_expiration {
        if absolute <= creation_time {
            return Err(CacheError::OutOfRange(format!(
                "absolute expiration {} must be in the future",
                absolute.to_rfc3339()
            )));
        }
    }

    if let Some(sliding) = options.sliding_expiration {
        if sliding.is_zero() {
            return Err(CacheError::OutOfRange(
                "sliding expiration must be positive".to_string(),
            ));
        }
        if sliding > MAX_WINDOW {
            return Err(CacheError::OutOfRange(format!(
                "sliding expiration exceeds {} seconds",
                MAX_WINDOW.as_secs()
            )));
        }
    }

    let resolved = match options.absolute_expiration_relative_to_now {
        Some(relative) if relative.is_zero() => {
            return Err(CacheError::OutOfRange(
                "relative expiration must be positive".to_string(),
            ))
        }
        Some(relative) => {
            let offset = ChronoDuration::from_std(relative)
                .map_err(|e| CacheError::OutOfRange(e.to_string()))?;
            let at = creation_time.checked_add_signed(offset).ok_or_else(|| {
                CacheError::OutOfRange("relative expiration overflows".to_string())
            })?;
            Some(at)
        }
        None => options.absolute_expiration,
    };

    if let Some(at) = resolved {
        if checked_to_ticks(at).is_none() {
            return Err(CacheError::OutOfRange(format!(
                "absolute expiration {} cannot be stored",
                at.to_rfc3339()
            )));
        }
    }
    Ok(resolved)
}

// == TTL Seconds ==
/// Physical TTL to arm when an entry is written, or `None` to persist.
///
/// With both expirations present the result is
/// `min(absolute - creation, sliding)`. Sub-second results round up to one
/// second so the write never deletes its own key.
pub fn ttl_seconds(
    creation_time: DateTime<Utc>,
    absolute: Option<DateTime<Utc>>,
    sliding: Option<Duration>,
) -> Option<i64> {
    let until_absolute = absolute.map(|at| (at - creation_time).num_seconds());
    let sliding = sliding.map(|window| i64::try_from(window.as_secs()).unwrap_or(i64::MAX));

    let seconds = match (until_absolute, sliding) {
        (Some(a), Some(s)) => a.min(s),
        (Some(a), None) => a,
        (None, Some(s)) => s,
        (None, None) => return None,
    };

    Some(seconds.max(1))
}

// == Refresh TTL ==
/// TTL to re-arm on a read at `now`, or `None` when the entry has no sliding
/// window and must be left alone.
///
/// An absolute expiration caps the window: the result is never longer than
/// the time remaining until `absolute`, floored at zero.
pub fn refresh_ttl(
    now: DateTime<Utc>,
    absolute: Option<DateTime<Utc>>,
    sliding: Option<Duration>,
) -> Option<Duration> {
    let sliding = sliding?;

    match absolute {
        Some(at) => {
            let remaining = (at - now).to_std().unwrap_or(Duration::ZERO);
            Some(remaining.min(sliding))
        }
        None => Some(sliding),
    }
}

// == Tick Conversions ==
/// Converts a timestamp to ticks since 0001-01-01 UTC.
///
/// Saturates for instants past the tick range; writes reject those up front.
pub fn to_ticks(at: DateTime<Utc>) -> i64 {
    checked_to_ticks(at).unwrap_or(i64::MAX)
}

fn checked_to_ticks(at: DateTime<Utc>) -> Option<i64> {
    at.timestamp()
        .checked_mul(TICKS_PER_SECOND)?
        .checked_add(UNIX_EPOCH_TICKS)?
        .checked_add(i64::from(at.timestamp_subsec_nanos() / 100))
}

/// Converts ticks back to a timestamp. The sentinel and out-of-range values
/// decode to `None`.
pub fn from_ticks(ticks: i64) -> Option<DateTime<Utc>> {
    if ticks == NOT_PRESENT {
        return None;
    }
    let since_epoch = ticks - UNIX_EPOCH_TICKS;
    let seconds = since_epoch.div_euclid(TICKS_PER_SECOND);
    let nanos = (since_epoch.rem_euclid(TICKS_PER_SECOND) * 100) as u32;
    DateTime::<Utc>::from_timestamp(seconds, nanos)
}

/// Converts a duration to ticks.
pub fn duration_to_ticks(duration: Duration) -> i64 {
    (duration.as_nanos() / 100).min(i64::MAX as u128) as i64
}

/// Converts ticks to a duration. Negative values (including the sentinel)
/// decode to `None`.
pub fn duration_from_ticks(ticks: i64) -> Option<Duration> {
    if ticks < 0 {
        return None;
    }
    let seconds = (ticks / TICKS_PER_SECOND) as u64;
    let nanos = (ticks % TICKS_PER_SECOND) as u64 * 100;
    Some(Duration::from_secs(seconds) + Duration::from_nanos(nanos))
}

/// Converts a TTL to whole milliseconds for `PEXPIRE`-style commands.
pub fn ttl_millis(ttl: Duration) -> Result<i64> {
    i64::try_from(ttl.as_millis())
        .map_err(|_| CacheError::OutOfRange(format!("ttl of {:?} is too long", ttl)))
}
