//! Window resolution: mapping a timestamp onto the bucket that stores it.
//!
//! Buckets are fixed-width slices of a single minute. A timestamp's bucket
//! starts at `start_of_minute + floor(second / width) * width`, so a bucket
//! never spans a minute boundary even when the width does not divide 60.

use crate::config::ConfigError;
use chrono::{DateTime, TimeDelta, Timelike, Utc};
use std::time::Duration;

/// Ticks between `0001-01-01T00:00:00Z` and the Unix epoch.
const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;

/// Ticks per second (one tick is 100 ns).
const TICKS_PER_SECOND: i64 = 10_000_000;

/// Convert a timestamp into ticks: 100 ns intervals since `0001-01-01` UTC.
///
/// Ticks are used both as the bucket score and as the store-key suffix.
/// Values saturate outside the representable range (roughly ±29,000 years).
/// A leap second is held at the last tick of the second it extends.
pub fn ticks(time: DateTime<Utc>) -> i64 {
    let subsec_nanos = time.timestamp_subsec_nanos().min(999_999_999);
    time.timestamp()
        .saturating_mul(TICKS_PER_SECOND)
        .saturating_add(UNIX_EPOCH_TICKS)
        .saturating_add(i64::from(subsec_nanos / 100))
}

/// One bucket instance for one activity key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    start_time: DateTime<Utc>,
    store_key: String,
}

impl Window {
    /// Start of the bucket, truncated to a window boundary.
    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Key addressing this bucket in the store.
    pub fn store_key(&self) -> &str {
        &self.store_key
    }
}

/// Resolves `(activity key, time)` pairs into windows.
#[derive(Debug, Clone)]
pub struct WindowResolver {
    prefix: String,
    width_secs: u32,
}

impl WindowResolver {
    /// Create a resolver for the given store-key prefix and window width.
    ///
    /// The width must be a whole number of seconds between 1 and 60.
    pub fn new(prefix: impl Into<String>, width: Duration) -> Result<Self, ConfigError> {
        let secs = width.as_secs();
        if width.subsec_nanos() != 0 || !(1..=60).contains(&secs) {
            return Err(ConfigError::InvalidWidth(width));
        }

        Ok(Self {
            prefix: prefix.into(),
            width_secs: secs as u32,
        })
    }

    pub fn width_secs(&self) -> u32 {
        self.width_secs
    }

    /// Width of each window.
    pub fn width(&self) -> TimeDelta {
        TimeDelta::seconds(i64::from(self.width_secs))
    }

    /// Resolve the window containing `time` for `activity_key`.
    pub fn resolve(&self, activity_key: &str, time: DateTime<Utc>) -> Window {
        // Distance from the window start: the remainder within the bucket
        // plus any sub-second part.
        let into_window = TimeDelta::seconds(i64::from(time.second() % self.width_secs))
            + TimeDelta::nanoseconds(i64::from(time.nanosecond()));
        let start_time = time - into_window;

        Window {
            store_key: format!("{}/{}/{}", self.prefix, activity_key, ticks(start_time)),
            start_time,
        }
    }
}
