//! Run coordinator
//!
//! Owns the lifecycle of one measurement: allocates the latency shards,
//! spawns one worker thread per shard, and collects their reports. Workers
//! talk back over a channel so the first fault ends the run immediately,
//! without joining peers that may be blocked on a barrier or a dead socket.

pub mod barrier;

pub use barrier::{BarrierWaitResult, PhaseBarrier};

use crate::config::{BenchMode, RunConfig};
use crate::error::{Fault, FaultResult};
use crate::stats::LatencyMatrix;
use crate::target::TargetDescriptor;
use crate::util::fast_time::FastInstant;
use crate::util::time::format_duration;
use crate::worker::{Worker, WorkerReport};
use crossbeam::channel;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

/// Read-only state shared by every worker of a run
#[derive(Debug)]
pub struct RunContext {
    pub config: RunConfig,
    pub target: TargetDescriptor,
    /// Released once every worker has connected (and primed, in latency mode)
    pub start: PhaseBarrier,
    /// Released once every worker drained its shard (throughput mode)
    pub end: PhaseBarrier,
}

impl RunContext {
    pub fn new(config: RunConfig) -> Self {
        let workers = config.workers as usize;
        Self {
            target: TargetDescriptor::from_config(&config),
            config,
            start: PhaseBarrier::new(workers),
            end: PhaseBarrier::new(workers),
        }
    }

    /// Release every worker blocked on either barrier
    pub fn abort(&self) {
        self.start.abort();
        self.end.abort();
    }
}

/// Raw result of a completed run
#[derive(Debug)]
pub enum RunOutcome {
    /// Every measured latency, shards concatenated in worker order
    Latency(LatencyMatrix),
    /// Counted requests and the wall time between the two barriers
    Throughput { total_requests: u64, elapsed_ns: u64 },
}

/// Execute one measurement run
///
/// Blocks until every worker has finished or any of them faults. A fault
/// is returned as soon as it is reported; workers still running are left
/// detached.
pub fn run(config: RunConfig) -> FaultResult<RunOutcome> {
    check_shape(&config)?;
    let total_requests = config.total_requests()?;
    let shards = allocate_shards(&config)?;

    let started = FastInstant::now();
    let ctx = Arc::new(RunContext::new(config));
    let workers = ctx.config.workers as usize;
    info!(
        server = %ctx.target.addr(),
        mode = %ctx.config.mode,
        workers,
        total_requests,
        "starting run"
    );

    let (tx, rx) = channel::unbounded::<(usize, FaultResult<WorkerReport>)>();
    let mut handles = Vec::with_capacity(workers);

    for (id, shard) in shards.into_iter().enumerate() {
        let worker = Worker::new(id, Arc::clone(&ctx), shard);
        let worker_ctx = Arc::clone(&ctx);
        let tx = tx.clone();

        let spawned = thread::Builder::new()
            .name(format!("netpulse-worker-{}", id))
            .spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| worker.run()))
                    .unwrap_or(Err(Fault::WorkerPanic(id)));
                if result.is_err() {
                    worker_ctx.abort();
                }
                // The receiver is gone only if the run already failed
                let _ = tx.send((id, result));
            });

        match spawned {
            Ok(handle) => handles.push(handle),
            Err(source) => {
                ctx.abort();
                return Err(Fault::Setup {
                    what: "Creating worker thread failed",
                    source,
                });
            }
        }
    }
    drop(tx);

    let mut reports = collect_reports(&rx, workers)?;
    for handle in handles {
        // Every worker has already reported, so this cannot block for long
        if handle.join().is_err() {
            warn!("worker thread panicked after reporting");
        }
    }
    reports.sort_by_key(|r| r.id);
    info!(elapsed = %format_duration(started.elapsed()), "all workers finished");

    match ctx.config.mode {
        BenchMode::Latency => {
            let matrix = LatencyMatrix::from_shards(reports.into_iter().map(|r| r.latencies));
            debug!(samples = matrix.len(), "latency matrix collected");
            Ok(RunOutcome::Latency(matrix))
        }
        BenchMode::Throughput => {
            let completed: u64 = reports.iter().map(|r| r.requests_completed).sum();
            debug_assert_eq!(completed, total_requests);
            let elapsed_ns = throughput_window(&reports)?;
            Ok(RunOutcome::Throughput {
                total_requests,
                elapsed_ns,
            })
        }
    }
}

fn check_shape(config: &RunConfig) -> FaultResult<()> {
    if config.workers == 0 {
        return Err(Fault::InvalidConfig("at least one worker is required"));
    }
    if config.connections_per_worker == 0 {
        return Err(Fault::InvalidConfig("at least one connection per worker is required"));
    }
    if config.requests_per_connection == 0 {
        return Err(Fault::InvalidConfig("at least one request per connection is required"));
    }
    if config.request.is_empty() {
        return Err(Fault::InvalidConfig("request payload is empty"));
    }
    Ok(())
}

/// One zeroed shard of `C * R` slots per worker (empty in throughput mode)
///
/// The full matrix size is checked before the first byte is allocated.
fn allocate_shards(config: &RunConfig) -> FaultResult<Vec<Vec<u64>>> {
    let matrix_len = config.matrix_len()?;
    let workers = config.workers as usize;

    if config.mode == BenchMode::Throughput {
        return Ok(vec![Vec::new(); workers]);
    }

    let shard_len = config.shard_len()?;
    debug!(matrix_len, shard_len, "allocating latency matrix");
    (0..workers)
        .map(|_| {
            let mut shard = Vec::new();
            shard
                .try_reserve_exact(shard_len)
                .map_err(|_| Fault::Setup {
                    what: "Allocating latency matrix failed",
                    source: io::Error::from(io::ErrorKind::OutOfMemory),
                })?;
            shard.resize(shard_len, 0);
            Ok(shard)
        })
        .collect()
}

/// Wait for one report per worker, returning the first real fault
///
/// `Aborted` only means some other party gave up first; the fault that
/// caused it is sent right after, so keep reading until it shows up.
fn collect_reports(
    rx: &channel::Receiver<(usize, FaultResult<WorkerReport>)>,
    workers: usize,
) -> FaultResult<Vec<WorkerReport>> {
    let mut reports = Vec::with_capacity(workers);

    while reports.len() < workers {
        let Ok((id, result)) = rx.recv() else {
            // Every sender is gone without a real fault being reported
            return Err(Fault::Aborted);
        };
        match result {
            Ok(report) => {
                debug!(worker = id, requests = report.requests_completed, "worker finished");
                reports.push(report);
            }
            Err(Fault::Aborted) => debug!(worker = id, "worker released by abort"),
            Err(fault) => {
                warn!(worker = id, error = %fault, "worker failed");
                return Err(fault);
            }
        }
    }
    Ok(reports)
}

/// Elapsed time sampled by the timing owner (worker 0)
fn throughput_window(reports: &[WorkerReport]) -> FaultResult<u64> {
    let owner = reports
        .iter()
        .find(|r| r.id == 0)
        .ok_or(Fault::Aborted)?;
    match (owner.start_ns, owner.end_ns) {
        (Some(start), Some(end)) => Ok(end.saturating_sub(start)),
        _ => Err(Fault::protocol(0, "timing owner did not sample the run window")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn report(id: usize, start: Option<u64>, end: Option<u64>) -> WorkerReport {
        WorkerReport {
            id,
            latencies: Vec::new(),
            requests_completed: 1,
            start_ns: start,
            end_ns: end,
        }
    }

    #[test]
    fn test_zero_shape_rejected() {
        let mut config = RunConfig::new(Ipv4Addr::LOCALHOST, 9);
        config.workers = 0;
        assert!(matches!(run(config), Err(Fault::InvalidConfig(_))));

        let mut config = RunConfig::new(Ipv4Addr::LOCALHOST, 9);
        config.requests_per_connection = 0;
        assert!(matches!(run(config), Err(Fault::InvalidConfig(_))));
    }

    #[test]
    fn test_oversized_matrix_rejected_before_connecting() {
        let mut config = RunConfig::new(Ipv4Addr::LOCALHOST, 9);
        config.workers = u32::MAX;
        config.connections_per_worker = u32::MAX;
        config.requests_per_connection = u32::MAX;
        assert!(matches!(run(config), Err(Fault::Overflow(_))));
    }

    #[test]
    fn test_allocate_shards() {
        let mut config = RunConfig::new(Ipv4Addr::LOCALHOST, 9);
        config.workers = 3;
        config.connections_per_worker = 2;
        config.requests_per_connection = 4;

        let shards = allocate_shards(&config).unwrap();
        assert_eq!(shards.len(), 3);
        assert!(shards.iter().all(|s| s.len() == 8 && s.iter().all(|&v| v == 0)));

        config.mode = BenchMode::Throughput;
        let shards = allocate_shards(&config).unwrap();
        assert_eq!(shards.len(), 3);
        assert!(shards.iter().all(Vec::is_empty));
    }

    #[test]
    fn test_collect_returns_real_fault_after_abort() {
        let (tx, rx) = channel::unbounded();
        tx.send((1, Err(Fault::Aborted))).unwrap();
        tx.send((0, Err(Fault::protocol(3, "server closed the connection")))).unwrap();

        let err = collect_reports(&rx, 2).unwrap_err();
        assert!(matches!(err, Fault::Protocol { conn: 3, .. }));
    }

    #[test]
    fn test_collect_all_reports() {
        let (tx, rx) = channel::unbounded();
        tx.send((1, Ok(report(1, None, None)))).unwrap();
        tx.send((0, Ok(report(0, None, None)))).unwrap();
        assert_eq!(collect_reports(&rx, 2).unwrap().len(), 2);
    }

    #[test]
    fn test_collect_with_all_senders_gone() {
        let (tx, rx) = channel::unbounded::<(usize, FaultResult<WorkerReport>)>();
        drop(tx);
        assert!(matches!(collect_reports(&rx, 1), Err(Fault::Aborted)));
    }

    #[test]
    fn test_throughput_window_from_owner() {
        let reports = [report(1, None, None), report(0, Some(100), Some(350))];
        assert_eq!(throughput_window(&reports).unwrap(), 250);

        let reports = [report(0, Some(100), None)];
        assert!(throughput_window(&reports).is_err());
    }
}
