//! Worker thread implementation
//!
//! A Worker owns one shard of the run: `C` connections, one reactor and a
//! contiguous slice of the latency matrix. Nothing it touches during the
//! measurement is shared with another thread except the two phase barriers.
//!
//! # Architecture
//!
//! A run proceeds in fixed phases:
//! - **Setup**: pin to a core (optional), create the reactor, connect every
//!   connection and register its sources
//! - **Prime** (latency mode): one unmeasured exchange per connection
//! - **Start barrier**: all workers rendezvous; worker 0 samples the start
//!   time in throughput mode, then each worker sends its first counted
//!   requests
//! - **Drive**: react to readiness events until every connection retired
//! - **End barrier** (throughput mode): worker 0 samples the end time
//!
//! # Example
//!
//! ```no_run
//! use netpulse::coordinator::RunContext;
//! use netpulse::config::RunConfig;
//! use netpulse::worker::Worker;
//! use std::net::Ipv4Addr;
//! use std::sync::Arc;
//!
//! let mut config = RunConfig::new(Ipv4Addr::LOCALHOST, 8080);
//! config.requests_per_connection = 100;
//! let shard = vec![0u64; 100];
//!
//! let ctx = Arc::new(RunContext::new(config));
//! let report = Worker::new(0, ctx, shard).run()?;
//! println!("Completed {} requests", report.requests_completed);
//! # Ok::<(), netpulse::Fault>(())
//! ```

pub mod affinity;

use crate::config::BenchMode;
use crate::connection::{Connection, Pacing, SendPolicy};
use crate::coordinator::RunContext;
use crate::error::{Fault, FaultResult};
use crate::reactor::{EventToken, Events, Reactor, MAX_EVENTS};
use crate::util::fast_time::now_ns;
use crossbeam::utils::CachePadded;
use std::mem;
use std::sync::Arc;
use tracing::debug;

/// Worker 0 samples the throughput window
const TIMING_OWNER: usize = 0;

/// What a worker hands back to the coordinator
#[derive(Debug)]
pub struct WorkerReport {
    pub id: usize,
    /// The worker's shard, filled in latency mode and empty in throughput mode
    pub latencies: Vec<u64>,
    /// Requests counted across all of the worker's connections
    pub requests_completed: u64,
    /// Set by the timing owner in throughput mode
    pub start_ns: Option<u64>,
    pub end_ns: Option<u64>,
}

/// Worker thread that drives one shard of connections
pub struct Worker {
    id: usize,
    ctx: Arc<RunContext>,
    shard: Vec<u64>,
}

impl Worker {
    /// `shard` must hold `C * R` slots in latency mode; it is ignored and
    /// may be empty in throughput mode.
    pub fn new(id: usize, ctx: Arc<RunContext>, shard: Vec<u64>) -> Self {
        Self { id, ctx, shard }
    }

    /// Send policy implied by mode and delay
    pub fn pacing(&self) -> Pacing {
        let config = &self.ctx.config;
        let policy = match config.mode {
            BenchMode::Throughput => SendPolicy::Unmeasured,
            BenchMode::Latency if config.delay_ns == 0 => SendPolicy::Immediate,
            BenchMode::Latency => SendPolicy::Paced,
        };
        Pacing {
            policy,
            delay_ns: config.delay_ns,
            target_requests: config.requests_per_connection,
        }
    }

    /// Run all phases to completion
    ///
    /// On any fault the caller must abort the run context so peers blocked on
    /// a barrier are released.
    pub fn run(mut self) -> FaultResult<WorkerReport> {
        if let Some(core) = self.ctx.config.core_for_worker(self.id) {
            affinity::set_cpu_affinity(core)?;
            debug!(worker = self.id, core, "pinned to core");
        }

        let mut shard = mem::take(&mut self.shard);
        let mut report = WorkerReport {
            id: self.id,
            latencies: Vec::new(),
            requests_completed: 0,
            start_ns: None,
            end_ns: None,
        };
        self.execute(&mut shard, &mut report)?;
        report.latencies = shard;
        Ok(report)
    }

    fn execute(&self, shard: &mut [u64], report: &mut WorkerReport) -> FaultResult<()> {
        let ctx = &*self.ctx;
        let pacing = self.pacing();
        let throughput = pacing.policy == SendPolicy::Unmeasured;

        let reactor = Reactor::new()?;
        let mut conns = self.connect_all(&reactor, pacing, shard)?;
        debug!(worker = self.id, connections = conns.len(), "connected");

        if !throughput {
            for conn in conns.iter_mut() {
                conn.prime(&reactor)?;
            }
            debug!(worker = self.id, "primed");
        }

        let released = ctx.start.wait()?;
        if released.is_leader {
            debug!(worker = self.id, "start barrier released");
        }
        if throughput {
            if self.id == TIMING_OWNER {
                report.start_ns = Some(now_ns());
            }
            for conn in conns.iter_mut() {
                conn.start(&reactor)?;
            }
        }

        drive(self.id, &reactor, &mut conns)?;
        report.requests_completed = conns
            .iter()
            .map(|c| u64::from(c.requests_completed()))
            .sum();

        if throughput {
            ctx.end.wait()?;
            if self.id == TIMING_OWNER {
                report.end_ns = Some(now_ns());
            }
        }
        debug!(worker = self.id, requests = report.requests_completed, "finished");
        Ok(())
    }

    /// Open, configure and register every connection of this shard
    fn connect_all<'a>(
        &'a self,
        reactor: &Reactor,
        pacing: Pacing,
        shard: &'a mut [u64],
    ) -> FaultResult<Vec<CachePadded<Connection<'a>>>> {
        let connections = self.ctx.config.connections_per_worker as usize;
        let request = self.ctx.target.request();
        let measured = pacing.policy != SendPolicy::Unmeasured;

        if measured && shard.len() != connections * pacing.target_requests as usize {
            return Err(Fault::InvalidConfig("latency shard does not match the run shape"));
        }
        let mut slots = shard.chunks_mut(pacing.target_requests.max(1) as usize);

        let mut conns = Vec::with_capacity(connections);
        for id in 0..connections {
            let latency_slots: &'a mut [u64] = if measured {
                slots.next().unwrap_or_default()
            } else {
                Default::default()
            };
            let socket = self.ctx.target.connect()?;
            let conn = Connection::establish(id, socket, reactor, request, pacing, latency_slots)?;
            conns.push(CachePadded::new(conn));
        }
        Ok(conns)
    }
}

/// React to readiness events until every connection has retired
fn drive(
    worker: usize,
    reactor: &Reactor,
    conns: &mut [CachePadded<Connection<'_>>],
) -> FaultResult<()> {
    let mut events = Events::with_capacity(MAX_EVENTS);
    let mut alive = conns.iter().filter(|c| !c.is_done()).count();

    while alive > 0 {
        reactor.wait(&mut events)?;
        for event in events.iter() {
            let token = event.token()?;
            let id = token.connection();
            let conn = conns.get_mut(id).ok_or_else(|| {
                Fault::protocol(id, format!("no such connection on worker {}", worker))
            })?;

            if event.is_fault() {
                return Err(Fault::Hangup {
                    conn: id,
                    events: event.flags(),
                });
            }
            match token {
                EventToken::Socket(_) => {
                    if conn.on_readable(reactor)? {
                        alive -= 1;
                    }
                }
                EventToken::Timer(_) => conn.on_timer(reactor)?,
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use std::io::{Read, Write};
    use std::net::{Ipv4Addr, TcpListener};
    use std::thread;

    /// Echo server answering every read with a fixed reply
    fn echo_server() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let mut stream = stream.unwrap();
                thread::spawn(move || {
                    let mut buf = [0u8; 64];
                    while let Ok(n) = stream.read(&mut buf) {
                        if n == 0 || stream.write_all(b"OK").is_err() {
                            break;
                        }
                    }
                });
            }
        });
        port
    }

    fn context(port: u16, mode: BenchMode, c: u32, r: u32, delay_ns: u64) -> Arc<RunContext> {
        let config = RunConfig {
            mode,
            connections_per_worker: c,
            requests_per_connection: r,
            delay_ns,
            ..RunConfig::new(Ipv4Addr::LOCALHOST, port)
        };
        Arc::new(RunContext::new(config))
    }

    #[test]
    fn test_pacing_policy() {
        let worker = Worker::new(0, context(9, BenchMode::Latency, 1, 1, 1_000), Vec::new());
        assert_eq!(worker.pacing().policy, SendPolicy::Paced);

        let worker = Worker::new(0, context(9, BenchMode::Latency, 1, 1, 0), Vec::new());
        assert_eq!(worker.pacing().policy, SendPolicy::Immediate);

        let worker = Worker::new(0, context(9, BenchMode::Throughput, 1, 1, 1_000), Vec::new());
        assert_eq!(worker.pacing().policy, SendPolicy::Unmeasured);
    }

    #[test]
    fn test_latency_worker_fills_shard() {
        let port = echo_server();
        let ctx = context(port, BenchMode::Latency, 2, 5, 10_000);

        let report = Worker::new(0, ctx, vec![0; 10]).run().unwrap();
        assert_eq!(report.requests_completed, 10);
        assert_eq!(report.latencies.len(), 10);
        assert!(report.latencies.iter().all(|&ns| ns > 0));
        assert_eq!(report.start_ns, None);
    }

    #[test]
    fn test_throughput_worker_samples_window() {
        let port = echo_server();
        let ctx = context(port, BenchMode::Throughput, 3, 4, 0);

        let report = Worker::new(0, ctx, Vec::new()).run().unwrap();
        assert_eq!(report.requests_completed, 12);
        assert!(report.latencies.is_empty());
        let (start, end) = (report.start_ns.unwrap(), report.end_ns.unwrap());
        assert!(end >= start);
    }

    #[test]
    fn test_mismatched_shard_rejected() {
        let port = echo_server();
        let ctx = context(port, BenchMode::Latency, 2, 5, 0);
        let err = Worker::new(0, ctx, vec![0; 3]).run().unwrap_err();
        assert!(matches!(err, Fault::InvalidConfig(_)));
    }

    #[test]
    fn test_aborted_start_barrier() {
        let port = echo_server();
        let mut config = RunConfig::new(Ipv4Addr::LOCALHOST, port);
        config.workers = 2;
        let ctx = Arc::new(RunContext::new(config));
        ctx.abort();

        let err = Worker::new(0, ctx, vec![0; 1]).run().unwrap_err();
        assert!(matches!(err, Fault::Aborted));
    }
}
