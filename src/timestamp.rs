// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Typed timestamp values.
//!
//! The wire format uses two resolutions: the designated (row-terminating)
//! timestamp is nanoseconds since the Unix epoch, while timestamp *columns*
//! carry microseconds. Wrapping both in newtypes keeps the two from being
//! mixed up at call sites.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Error, Result};

/// Nanoseconds since the Unix epoch; the designated row timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimestampNanos(i64);

impl TimestampNanos {
    /// Wrap a raw nanosecond count.
    pub fn new(nanos: i64) -> Self {
        TimestampNanos(nanos)
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        // In-range for SystemTime on every supported platform.
        Self::from_systemtime(SystemTime::now()).unwrap_or(TimestampNanos(0))
    }

    /// Convert a [`SystemTime`]; pre-epoch or out-of-range times are errors.
    pub fn from_systemtime(time: SystemTime) -> Result<Self> {
        let elapsed = time.duration_since(UNIX_EPOCH).map_err(|_| {
            Error::InvalidTimestamp("timestamp is before the Unix epoch".to_string())
        })?;
        let nanos = i64::try_from(elapsed.as_nanos()).map_err(|_| {
            Error::InvalidTimestamp("timestamp does not fit in 64-bit nanoseconds".to_string())
        })?;
        Ok(TimestampNanos(nanos))
    }

    /// Raw nanosecond count.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl TryFrom<SystemTime> for TimestampNanos {
    type Error = Error;

    fn try_from(time: SystemTime) -> Result<Self> {
        Self::from_systemtime(time)
    }
}

/// Microseconds since the Unix epoch; the resolution of timestamp columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimestampMicros(i64);

impl TimestampMicros {
    /// Wrap a raw microsecond count.
    pub fn new(micros: i64) -> Self {
        TimestampMicros(micros)
    }

    /// Convert a [`SystemTime`]; pre-epoch or out-of-range times are errors.
    pub fn from_systemtime(time: SystemTime) -> Result<Self> {
        let elapsed = time.duration_since(UNIX_EPOCH).map_err(|_| {
            Error::InvalidTimestamp("timestamp is before the Unix epoch".to_string())
        })?;
        let micros = i64::try_from(elapsed.as_micros()).map_err(|_| {
            Error::InvalidTimestamp("timestamp does not fit in 64-bit microseconds".to_string())
        })?;
        Ok(TimestampMicros(micros))
    }

    /// Raw microsecond count.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl TryFrom<SystemTime> for TimestampMicros {
    type Error = Error;

    fn try_from(time: SystemTime) -> Result<Self> {
        Self::from_systemtime(time)
    }
}

impl From<TimestampNanos> for TimestampMicros {
    fn from(nanos: TimestampNanos) -> Self {
        TimestampMicros(nanos.0 / 1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_systemtime_round_trip() {
        let time = UNIX_EPOCH + Duration::from_micros(1_700_000_000_123_456);
        let nanos = TimestampNanos::from_systemtime(time).unwrap();
        assert_eq!(nanos.as_i64(), 1_700_000_000_123_456_000);
        let micros = TimestampMicros::from_systemtime(time).unwrap();
        assert_eq!(micros.as_i64(), 1_700_000_000_123_456);
    }

    #[test]
    fn test_pre_epoch_rejected() {
        let time = UNIX_EPOCH - Duration::from_secs(1);
        assert!(matches!(
            TimestampNanos::from_systemtime(time),
            Err(Error::InvalidTimestamp(_))
        ));
        assert!(matches!(
            TimestampMicros::from_systemtime(time),
            Err(Error::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn test_nanos_to_micros_truncates() {
        let micros: TimestampMicros = TimestampNanos::new(1_999).into();
        assert_eq!(micros.as_i64(), 1);
    }
}
