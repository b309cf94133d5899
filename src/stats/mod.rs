//! Statistics aggregation
//!
//! Turns the raw output of a run into reported figures:
//!
//! - **Latency matrix**: every measured request latency, sorted once in parallel
//! - **Nearest-rank summary**: mean, extremes, median, tail quantiles, best and
//!   worst samples, read by direct indexing into the sorted matrix
//! - **Throughput**: counted requests over the barrier-to-barrier window
//! - **HdrHistogram**: optional log-bucketed view of the same samples
//!
//! # Example
//!
//! ```
//! use netpulse::stats::LatencyMatrix;
//!
//! let matrix = LatencyMatrix::from_shards(vec![vec![30, 10], vec![20, 40]]);
//! let summary = matrix.into_sorted().summarize()?;
//!
//! assert_eq!(summary.min, 10);
//! assert_eq!(summary.max, 40);
//! assert_eq!(summary.median, 30);
//! # Ok::<(), netpulse::Fault>(())
//! ```

pub mod histogram;
pub mod latency;
pub mod throughput;

pub use histogram::LatencyHistogram;
pub use latency::LatencySummary;
pub use throughput::ThroughputSummary;

use crate::error::FaultResult;
use rayon::prelude::*;

/// Flat sequence of nanosecond latencies, one slot per measured request
///
/// Laid out worker by worker, connection by connection, in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LatencyMatrix {
    samples: Vec<u64>,
}

impl LatencyMatrix {
    pub fn new(samples: Vec<u64>) -> Self {
        Self { samples }
    }

    /// Concatenate per-worker shards in the order given
    pub fn from_shards<I>(shards: I) -> Self
    where
        I: IntoIterator<Item = Vec<u64>>,
    {
        let mut shards = shards.into_iter();
        // Reuse the first shard's allocation when there is only one
        let mut samples = shards.next().unwrap_or_default();
        for shard in shards {
            samples.extend_from_slice(&shard);
        }
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.samples
    }

    /// Sort ascending across all cores
    pub fn into_sorted(mut self) -> SortedLatencies {
        self.samples.par_sort_unstable();
        SortedLatencies {
            samples: self.samples,
        }
    }
}

/// Latency matrix in ascending order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortedLatencies {
    samples: Vec<u64>,
}

impl SortedLatencies {
    pub fn as_slice(&self) -> &[u64] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn summarize(&self) -> FaultResult<LatencySummary> {
        LatencySummary::from_sorted(&self.samples)
    }

    pub fn histogram(&self) -> crate::Result<LatencyHistogram> {
        LatencyHistogram::from_samples(&self.samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_shards_keeps_worker_order() {
        let matrix = LatencyMatrix::from_shards(vec![vec![5, 4], vec![], vec![3, 2, 1]]);
        assert_eq!(matrix.as_slice(), &[5, 4, 3, 2, 1]);
        assert_eq!(matrix.len(), 5);
    }

    #[test]
    fn test_from_no_shards() {
        let matrix = LatencyMatrix::from_shards(Vec::<Vec<u64>>::new());
        assert!(matrix.is_empty());
    }

    #[test]
    fn test_into_sorted() {
        let samples: Vec<u64> = (0..10_000u64).rev().map(|i| i * 7 % 1_009 + 1).collect();
        let sorted = LatencyMatrix::new(samples).into_sorted();
        assert_eq!(sorted.len(), 10_000);
        assert!(sorted.as_slice().windows(2).all(|w| w[0] <= w[1]));
    }
}
