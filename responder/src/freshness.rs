//! Replay protection for Slack requests
//!
//! Slack sends the request time in `X-Slack-Request-Timestamp`. A request whose
//! timestamp is more than five minutes away from the local clock is rejected,
//! in either direction.

use crate::error::ReceiverError;

/// Maximum distance in seconds between the request timestamp and now
pub const MAX_TIMESTAMP_SKEW_SECS: u64 = 60 * 5;

/// Source of the current unix time in seconds
#[cfg_attr(test, mockall::automock)]
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

/// Wall clock backed by [`chrono::Utc`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Parses the raw timestamp header and checks it against `now`.
///
/// # Returns
/// * `Ok(timestamp)` when the header holds an integer within the allowed skew
/// * `Err(MissingTimestamp)` when the header is absent
/// * `Err(MalformedTimestamp)` when the header is not an integer
/// * `Err(StaleTimestamp)` when `|now - timestamp| > 300`
pub fn check_timestamp(header: Option<&str>, now: i64) -> Result<i64, ReceiverError> {
    let raw = header.ok_or(ReceiverError::MissingTimestamp)?;

    let timestamp: i64 = raw
        .trim()
        .parse()
        .map_err(|_| ReceiverError::MalformedTimestamp(raw.to_string()))?;

    if timestamp.abs_diff(now) > MAX_TIMESTAMP_SKEW_SECS {
        return Err(ReceiverError::StaleTimestamp { timestamp, now });
    }

    Ok(timestamp)
}
