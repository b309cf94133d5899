//! netpulse - latency and throughput load generator
//!
//! netpulse opens many non-blocking TCP connections to a request/response
//! service and drives a fixed request stream over each of them from a pool of
//! worker threads, one edge-triggered epoll reactor per worker.
//!
//! # Architecture
//!
//! - **Reactor**: epoll wait set shared by socket and pacing-timer sources
//! - **Connection**: per-socket state machine with its own latency slots
//! - **Worker**: connect → prime → synchronized run → drain
//! - **Coordinator**: spawns workers and aligns them on start/end barriers
//! - **Stats**: exact nearest-rank quantiles or aggregate request rate

pub mod config;
pub mod connection;
pub mod coordinator;
pub mod error;
pub mod output;
pub mod reactor;
pub mod stats;
pub mod target;
pub mod util;
pub mod worker;

// Re-export commonly used types
pub use config::{BenchMode, RunConfig};
pub use coordinator::{run, RunOutcome};
pub use error::Fault;

/// Result type used throughout netpulse
pub type Result<T> = anyhow::Result<T>;
