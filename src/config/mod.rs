//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.

pub mod cli;
pub mod cli_convert;
pub mod toml;
pub mod validator;

use crate::error::{Fault, FaultResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::mem;
use std::net::{Ipv4Addr, SocketAddrV4};

/// Request sent on every connection unless overridden
pub const DEFAULT_REQUEST: &str = "Hello!!!";

/// Default pacing delay between a response and the next request (1ms)
pub const DEFAULT_DELAY_NS: u64 = 1_000_000;

/// What a run measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BenchMode {
    /// Paced requests, full latency distribution
    #[default]
    Latency,
    /// Back-to-back requests, aggregate request rate
    Throughput,
}

/// Complete run configuration
///
/// Built once from CLI and optional TOML file, validated, then shared
/// read-only by every worker.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Target server IPv4 address
    pub host: Ipv4Addr,
    /// Target server port
    pub port: u16,
    /// Measurement mode
    pub mode: BenchMode,
    /// Number of worker threads (W)
    pub workers: u32,
    /// Connections per worker (C)
    pub connections_per_worker: u32,
    /// Measured requests per connection (R)
    pub requests_per_connection: u32,
    /// Pacing delay in nanoseconds (latency mode only)
    pub delay_ns: u64,
    /// Request payload, identical for every request
    pub request: String,
    /// CPU cores to pin workers to, round-robin
    pub cpu_cores: Option<Vec<usize>>,
}

fn default_request() -> String {
    DEFAULT_REQUEST.to_string()
}

impl RunConfig {
    /// Configuration with defaults for everything but the target
    pub fn new(host: Ipv4Addr, port: u16) -> Self {
        Self {
            host,
            port,
            mode: BenchMode::default(),
            workers: 1,
            connections_per_worker: 1,
            requests_per_connection: 1,
            delay_ns: DEFAULT_DELAY_NS,
            request: default_request(),
            cpu_cores: None,
        }
    }

    pub fn addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.host, self.port)
    }

    /// Latency slots owned by one worker (C * R)
    pub fn shard_len(&self) -> FaultResult<usize> {
        (self.connections_per_worker as usize)
            .checked_mul(self.requests_per_connection as usize)
            .ok_or(Fault::Overflow("latency matrix size"))
    }

    /// Total latency slots (W * C * R)
    ///
    /// Rejects any configuration whose matrix byte size is not representable
    /// as an allocation size, before anything is allocated.
    pub fn matrix_len(&self) -> FaultResult<usize> {
        let len = self
            .shard_len()?
            .checked_mul(self.workers as usize)
            .ok_or(Fault::Overflow("latency matrix size"))?;
        match len.checked_mul(mem::size_of::<u64>()) {
            Some(bytes) if bytes <= isize::MAX as usize => Ok(len),
            _ => Err(Fault::Overflow("latency matrix size")),
        }
    }

    /// Total measured requests (W * C * R)
    pub fn total_requests(&self) -> FaultResult<u64> {
        (self.requests_per_connection as u64)
            .checked_mul(self.connections_per_worker as u64)
            .and_then(|n| n.checked_mul(self.workers as u64))
            .ok_or(Fault::Overflow("total requests"))
    }

    /// CPU core for a worker, if pinning is enabled
    pub fn core_for_worker(&self, worker_id: usize) -> Option<usize> {
        self.cpu_cores
            .as_ref()
            .filter(|cores| !cores.is_empty())
            .map(|cores| cores[worker_id % cores.len()])
    }
}

impl fmt::Display for BenchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BenchMode::Latency => write!(f, "latency"),
            BenchMode::Throughput => write!(f, "throughput"),
        }
    }
}

impl fmt::Display for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Target: {}", self.addr())?;
        writeln!(f, "Mode: {}", self.mode)?;
        writeln!(f, "Workers: {}", self.workers)?;
        writeln!(f, "Connections per worker: {}", self.connections_per_worker)?;
        writeln!(f, "Requests per connection: {}", self.requests_per_connection)?;
        if self.mode == BenchMode::Latency {
            writeln!(f, "Delay: {}ns", self.delay_ns)?;
        }
        if let Some(ref cores) = self.cpu_cores {
            writeln!(f, "CPU cores: {:?}", cores)?;
        }
        write!(f, "Request: {:?} ({} bytes)", self.request, self.request.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(w: u32, c: u32, r: u32) -> RunConfig {
        RunConfig {
            workers: w,
            connections_per_worker: c,
            requests_per_connection: r,
            ..RunConfig::new(Ipv4Addr::LOCALHOST, 8080)
        }
    }

    #[test]
    fn test_defaults() {
        let config = RunConfig::new(Ipv4Addr::LOCALHOST, 8080);
        assert_eq!(config.mode, BenchMode::Latency);
        assert_eq!(config.workers, 1);
        assert_eq!(config.delay_ns, 1_000_000);
        assert_eq!(config.request, "Hello!!!");
        assert_eq!(config.addr().to_string(), "127.0.0.1:8080");
    }

    #[test]
    fn test_matrix_len() {
        assert_eq!(config(2, 3, 5).matrix_len().unwrap(), 30);
        assert_eq!(config(2, 3, 5).shard_len().unwrap(), 15);
        assert_eq!(config(4, 10, 100).total_requests().unwrap(), 4000);
    }

    #[test]
    fn test_matrix_len_overflow_rejected() {
        let config = config(u32::MAX, u32::MAX, u32::MAX);
        assert!(matches!(config.matrix_len(), Err(Fault::Overflow(_))));
        // u32^3 does not fit u64 either
        assert!(matches!(config.total_requests(), Err(Fault::Overflow(_))));
    }

    #[test]
    fn test_core_for_worker() {
        let mut config = config(4, 1, 1);
        assert_eq!(config.core_for_worker(0), None);

        config.cpu_cores = Some(vec![2, 5]);
        assert_eq!(config.core_for_worker(0), Some(2));
        assert_eq!(config.core_for_worker(1), Some(5));
        assert_eq!(config.core_for_worker(2), Some(2));
    }
}
