//! Nearest-rank latency summary
//!
//! Every figure is read from the sorted samples by direct index; nothing is
//! interpolated. Quantile `num/den` is `sorted[count * num / den]`.

use crate::error::{Fault, FaultResult};
use serde::Serialize;

/// Size of the best and worst lists
pub const EXTREMES: usize = 10;

/// Reported tail quantiles as `(label, numerator, denominator)`
pub const QUANTILES: [(&str, u64, u64); 7] = [
    ("0.9", 9, 10),
    ("0.95", 95, 100),
    ("0.99", 99, 100),
    ("0.995", 995, 1_000),
    ("0.999", 999, 1_000),
    ("0.9995", 9_995, 10_000),
    ("0.9999", 9_999, 10_000),
];

/// Largest quantile numerator; bounds every `count * num` product
const MAX_NUMERATOR: u64 = 9_999;

/// One tail quantile
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quantile {
    pub label: &'static str,
    pub value: u64,
}

/// Reported latency figures, all in nanoseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LatencySummary {
    pub count: u64,
    pub mean: u64,
    pub min: u64,
    pub max: u64,
    pub median: u64,
    pub quantiles: Vec<Quantile>,
    /// Smallest samples, ascending
    pub best: Vec<u64>,
    /// Largest samples, largest first
    pub worst: Vec<u64>,
}

impl LatencySummary {
    /// Summarize samples already sorted ascending
    ///
    /// Fails on an empty input and on any overflow in the sum or in a
    /// quantile index; the index check happens before any multiplication.
    pub fn from_sorted(sorted: &[u64]) -> FaultResult<Self> {
        debug_assert!(sorted.windows(2).all(|w| w[0] <= w[1]));
        let n = sorted.len();
        if n == 0 {
            return Err(Fault::InvalidConfig("no latency samples to summarize"));
        }
        let count = n as u64;

        let sum = sorted
            .iter()
            .try_fold(0u64, |acc, &v| acc.checked_add(v))
            .ok_or(Fault::Overflow("mean"))?;

        if count > u64::MAX / MAX_NUMERATOR {
            return Err(Fault::Overflow("quantiles"));
        }
        let quantiles = QUANTILES
            .iter()
            .map(|&(label, num, den)| Quantile {
                label,
                value: sorted[(count * num / den) as usize],
            })
            .collect();

        let k = n.min(EXTREMES);
        Ok(Self {
            count,
            mean: sum / count,
            min: sorted[0],
            max: sorted[n - 1],
            median: sorted[n / 2],
            quantiles,
            best: sorted[..k].to_vec(),
            worst: sorted[n - k..].iter().rev().copied().collect(),
        })
    }

    pub fn quantile(&self, label: &str) -> Option<u64> {
        self.quantiles
            .iter()
            .find(|q| q.label == label)
            .map(|q| q.value)
    }
}
