//! Fixed-point time values used for timer samples and flush timestamps.
//!
//! Mirrors the host daemon's `cdtime_t`: a 64-bit fixed-point count of
//! 1/2^30 seconds. Representing timer samples this way, rather than as
//! floating-point milliseconds, keeps histogram bucketing exact and avoids
//! accumulating rounding error across a long-running node.

use std::time::{SystemTime, UNIX_EPOCH};

/// Fractional bits used by the fixed-point representation (matches the host
/// daemon's `cdtime_t`).
const FRACTIONAL_BITS: u32 = 30;

/// A non-negative fixed-point duration or timestamp, in units of 1/2^30
/// seconds.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct CdTime(u64);

impl CdTime {
    /// The zero duration.
    pub const ZERO: Self = Self(0);

    /// Builds a `CdTime` from a raw 1/2^30-second count.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw 1/2^30-second count.
    #[must_use]
    pub const fn as_raw(self) -> u64 {
        self.0
    }

    /// Converts a non-negative millisecond value into a `CdTime`.
    ///
    /// Negative or non-finite input clamps to zero; the wire parser already
    /// rejects such values before they reach this conversion.
    #[must_use]
    pub fn from_millis_f64(ms: f64) -> Self {
        Self::from_secs_f64(ms / 1000.0)
    }

    /// Converts a non-negative, finite second value into a `CdTime`.
    #[must_use]
    pub fn from_secs_f64(secs: f64) -> Self {
        if !secs.is_finite() || secs <= 0.0 {
            return Self::ZERO;
        }
        let raw = secs * f64::from(1u32 << FRACTIONAL_BITS);
        Self(raw as u64)
    }

    /// Converts this value to seconds as an `f64`.
    #[must_use]
    pub fn as_secs_f64(self) -> f64 {
        (self.0 as f64) / f64::from(1u32 << FRACTIONAL_BITS)
    }

    /// Converts this value to milliseconds as an `f64`.
    #[must_use]
    pub fn as_millis_f64(self) -> f64 {
        self.as_secs_f64() * 1000.0
    }

    /// The current wall-clock time as a `CdTime` since the Unix epoch.
    ///
    /// # Panics
    ///
    /// Panics if the system clock is set before the Unix epoch.
    #[must_use]
    pub fn now() -> Self {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self::from_secs_f64(since_epoch.as_secs_f64())
    }
}

impl Default for CdTime {
    fn default() -> Self {
        Self::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_millis() {
        let t = CdTime::from_millis_f64(1500.0);
        assert!((t.as_millis_f64() - 1500.0).abs() < 1.0);
    }

    #[test]
    fn negative_and_nonfinite_clamp_to_zero() {
        assert_eq!(CdTime::from_secs_f64(-1.0), CdTime::ZERO);
        assert_eq!(CdTime::from_secs_f64(f64::NAN), CdTime::ZERO);
        assert_eq!(CdTime::from_secs_f64(f64::INFINITY), CdTime::ZERO);
    }

    #[test]
    fn zero_round_trips() {
        assert_eq!(CdTime::ZERO.as_secs_f64(), 0.0);
    }
}
