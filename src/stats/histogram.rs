//! Latency histogram using HdrHistogram
//!
//! A log-bucketed view of the latency matrix for the `--histogram` report.
//! Bucketing loses precision, so the nearest-rank summary stays the
//! authoritative set of figures.
//!
//! # Example
//!
//! ```
//! use netpulse::stats::histogram::LatencyHistogram;
//!
//! let hist = LatencyHistogram::from_samples(&[1_000, 2_000, 4_000])?;
//! assert_eq!(hist.len(), 3);
//! for bucket in hist.buckets() {
//!     println!("<= {}ns: {}", bucket.upper_ns, bucket.count);
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

use crate::Result;
use anyhow::Context;
use hdrhistogram::Histogram;

/// Largest trackable latency: one hour in nanoseconds
const MAX_TRACKABLE_NS: u64 = 3_600_000_000_000;

/// Significant digits kept per value (0.1% precision)
const SIGFIGS: u8 = 3;

/// First bucket boundary and growth factor of the printed buckets
const FIRST_BUCKET_NS: u64 = 1_000;
const BUCKET_GROWTH: f64 = 2.0;

/// One printed bucket
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bucket {
    /// Inclusive upper bound of the bucket
    pub upper_ns: u64,
    /// Samples in this bucket
    pub count: u64,
    /// Percentage of all samples at or below `upper_ns`
    pub percentile: f64,
}

#[derive(Debug)]
pub struct LatencyHistogram {
    histogram: Histogram<u64>,
}

impl LatencyHistogram {
    pub fn new() -> Result<Self> {
        let histogram = Histogram::new_with_bounds(1, MAX_TRACKABLE_NS, SIGFIGS)
            .context("Failed to create latency histogram")?;
        Ok(Self { histogram })
    }

    /// Build from raw nanosecond samples
    pub fn from_samples(samples: &[u64]) -> Result<Self> {
        let mut hist = Self::new()?;
        for &ns in samples {
            hist.record(ns);
        }
        Ok(hist)
    }

    /// Values outside 1ns..=1h are clamped
    #[inline]
    pub fn record(&mut self, ns: u64) {
        self.histogram.saturating_record(ns.clamp(1, MAX_TRACKABLE_NS));
    }

    pub fn len(&self) -> u64 {
        self.histogram.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histogram.len() == 0
    }

    pub fn value_at_percentile(&self, percentile: f64) -> Option<u64> {
        if self.is_empty() {
            return None;
        }
        Some(self.histogram.value_at_percentile(percentile))
    }

    pub fn stddev(&self) -> Option<f64> {
        if self.is_empty() {
            return None;
        }
        Some(self.histogram.stdev())
    }

    /// Power-of-two buckets starting at 1us, empty buckets skipped
    pub fn buckets(&self) -> Vec<Bucket> {
        if self.is_empty() {
            return Vec::new();
        }
        self.histogram
            .iter_log(FIRST_BUCKET_NS, BUCKET_GROWTH)
            .filter(|v| v.count_since_last_iteration() > 0)
            .map(|v| Bucket {
                upper_ns: v.value_iterated_to(),
                count: v.count_since_last_iteration(),
                percentile: v.percentile(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_histogram() {
        let hist = LatencyHistogram::new().unwrap();
        assert!(hist.is_empty());
        assert!(hist.value_at_percentile(50.0).is_none());
        assert!(hist.buckets().is_empty());
    }

    #[test]
    fn test_percentile_close_to_exact() {
        let samples: Vec<u64> = (1..=100).map(|i| i * 10_000).collect();
        let hist = LatencyHistogram::from_samples(&samples).unwrap();
        assert_eq!(hist.len(), 100);

        let p50 = hist.value_at_percentile(50.0).unwrap();
        assert!((495_000..=505_000).contains(&p50), "p50 = {}", p50);
    }

    #[test]
    fn test_buckets_account_for_every_sample() {
        let samples = [500, 1_500, 1_700, 3_000, 100_000, 2_000_000];
        let hist = LatencyHistogram::from_samples(&samples).unwrap();

        let buckets = hist.buckets();
        let total: u64 = buckets.iter().map(|b| b.count).sum();
        assert_eq!(total, samples.len() as u64);
        assert!(buckets.windows(2).all(|w| w[0].upper_ns < w[1].upper_ns));
    }

    #[test]
    fn test_out_of_range_clamped() {
        let hist = LatencyHistogram::from_samples(&[0, u64::MAX]).unwrap();
        assert_eq!(hist.len(), 2);
    }
}
