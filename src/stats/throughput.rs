//! Throughput figures

use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThroughputSummary {
    pub total_requests: u64,
    pub elapsed_ns: u64,
    /// Requests per second
    pub rate: f64,
}

impl ThroughputSummary {
    pub fn new(total_requests: u64, elapsed_ns: u64) -> Self {
        let elapsed = Duration::from_nanos(elapsed_ns).as_secs_f64();
        // A zero-length window only happens with a coarse clock
        let rate = if elapsed > 0.0 {
            total_requests as f64 / elapsed
        } else {
            0.0
        };
        Self {
            total_requests,
            elapsed_ns,
            rate,
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        Duration::from_nanos(self.elapsed_ns).as_secs_f64()
    }
}
