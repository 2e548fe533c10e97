//! Bounded-memory latency histogram backing timer metrics.

use crate::duration::CdTime;
use crate::MetricsError;
use hdrhistogram::Histogram;
use std::cmp::{max, min};

/// Number of significant figures used when recording samples.
///
/// Higher values increase precision but also memory usage; three
/// significant figures is the default used throughout this crate.
const SIG_FIG: u8 = 3;

/// Lowest representable value, in raw `CdTime` units. `hdrhistogram`
/// requires a strictly positive lower bound.
const LOWEST_DISCERNIBLE: u64 = 1;

/// Highest representable value: roughly one hour in `CdTime` units, wide
/// enough for any timer a statsd client would plausibly report.
const HIGHEST_TRACKABLE: u64 = 1 << 42;

/// A bounded-memory accumulator of timer samples.
///
/// Supports count/min/max/sum/average/percentile queries in O(1) or
/// O(buckets) time, with memory bounded by the configured bucket count
/// rather than the number of samples observed.
pub struct LatencyHistogram {
    min: u64,
    max: u64,
    sum: u64,
    histogram: Histogram<u64>,
}

impl LatencyHistogram {
    /// Creates an empty histogram.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying `hdrhistogram::Histogram` cannot
    /// be constructed with the configured bounds.
    pub fn new() -> Result<Self, MetricsError> {
        let histogram = Histogram::new_with_bounds(LOWEST_DISCERNIBLE, HIGHEST_TRACKABLE, SIG_FIG)?;
        Ok(Self {
            min: u64::MAX,
            max: u64::MIN,
            sum: 0,
            histogram,
        })
    }

    /// Records one sample.
    ///
    /// # Errors
    ///
    /// Returns an error if the value falls outside the histogram's
    /// representable range.
    pub fn add(&mut self, value: CdTime) -> Result<(), MetricsError> {
        let raw = value.as_raw().clamp(LOWEST_DISCERNIBLE, HIGHEST_TRACKABLE);
        self.histogram.record(raw)?;
        self.min = min(self.min, raw);
        self.max = max(self.max, raw);
        self.sum = self.sum.saturating_add(raw);
        Ok(())
    }

    /// Number of samples recorded since creation or the last reset.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.histogram.len()
    }

    /// Minimum recorded sample.
    ///
    /// Caller must ensure `count() > 0`; behavior on an empty histogram is
    /// unspecified.
    #[must_use]
    pub fn min(&self) -> CdTime {
        CdTime::from_raw(self.min)
    }

    /// Maximum recorded sample.
    ///
    /// Caller must ensure `count() > 0`; behavior on an empty histogram is
    /// unspecified.
    #[must_use]
    pub fn max(&self) -> CdTime {
        CdTime::from_raw(self.max)
    }

    /// Sum of all recorded samples.
    ///
    /// Caller must ensure `count() > 0`; behavior on an empty histogram is
    /// unspecified.
    #[must_use]
    pub fn sum(&self) -> CdTime {
        CdTime::from_raw(self.sum)
    }

    /// Arithmetic mean of all recorded samples.
    ///
    /// Caller must ensure `count() > 0`; behavior on an empty histogram is
    /// unspecified.
    #[must_use]
    pub fn average(&self) -> CdTime {
        CdTime::from_raw(self.histogram.mean() as u64)
    }

    /// The value at or below which `p` percent of samples fall.
    ///
    /// `p` must lie in `(0, 100)`. Caller must ensure `count() > 0`;
    /// behavior on an empty histogram is unspecified.
    #[must_use]
    pub fn percentile(&self, p: f64) -> CdTime {
        CdTime::from_raw(self.histogram.value_at_percentile(p))
    }

    /// Restores the empty state without deallocating the underlying
    /// bucket storage.
    pub fn reset(&mut self) {
        self.min = u64::MAX;
        self.max = u64::MIN;
        self.sum = 0;
        self.histogram.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_min_max_count() {
        let mut h = LatencyHistogram::new().unwrap();
        h.add(CdTime::from_millis_f64(10.0)).unwrap();
        h.add(CdTime::from_millis_f64(20.0)).unwrap();
        h.add(CdTime::from_millis_f64(30.0)).unwrap();
        assert_eq!(h.count(), 3);
        assert!((h.min().as_millis_f64() - 10.0).abs() < 1.0);
        assert!((h.max().as_millis_f64() - 30.0).abs() < 1.0);
        assert!((h.average().as_millis_f64() - 20.0).abs() < 1.0);
    }

    #[test]
    fn reset_clears_state() {
        let mut h = LatencyHistogram::new().unwrap();
        h.add(CdTime::from_millis_f64(5.0)).unwrap();
        h.reset();
        assert_eq!(h.count(), 0);
    }

    #[test]
    fn percentile_is_monotonic() {
        let mut h = LatencyHistogram::new().unwrap();
        for ms in [10.0, 20.0, 30.0, 40.0, 50.0] {
            h.add(CdTime::from_millis_f64(ms)).unwrap();
        }
        assert!(h.percentile(50.0) <= h.percentile(90.0));
    }
}
