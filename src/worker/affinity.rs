//! CPU affinity binding for worker threads
//!
//! Pinning each worker to its own core keeps its reactor, connection array and
//! latency shard on one cache hierarchy for the whole run, which lowers
//! measurement noise.
//!
//! # Example
//!
//! ```no_run
//! use netpulse::worker::affinity::{set_cpu_affinity, parse_cpu_list};
//!
//! let cores = parse_cpu_list("0,2-3").unwrap();
//! set_cpu_affinity(cores[0]).unwrap();
//! ```

use crate::error::{Fault, FaultResult};
use crate::Result;
use anyhow::Context;

/// Bind the current thread to a single CPU core
#[cfg(target_os = "linux")]
pub fn set_cpu_affinity(core: usize) -> FaultResult<()> {
    use libc::{cpu_set_t, sched_setaffinity, CPU_SET, CPU_SETSIZE, CPU_ZERO};
    use std::mem;

    if core >= CPU_SETSIZE as usize {
        return Err(Fault::Setup {
            what: "Setting CPU affinity failed",
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("CPU core ID {} is too large", core),
            ),
        });
    }

    // SAFETY: cpu_set_t is plain data and the mask outlives the call.
    let result = unsafe {
        let mut cpu_set: cpu_set_t = mem::zeroed();
        CPU_ZERO(&mut cpu_set);
        CPU_SET(core, &mut cpu_set);
        sched_setaffinity(0, mem::size_of::<cpu_set_t>(), &cpu_set)
    };

    if result != 0 {
        return Err(Fault::last_os("Setting CPU affinity failed"));
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn set_cpu_affinity(_core: usize) -> FaultResult<()> {
    Err(Fault::Setup {
        what: "Setting CPU affinity failed",
        source: std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "CPU affinity is only supported on Linux",
        ),
    })
}

/// Parse a comma-separated list of CPU cores or ranges
///
/// Accepts `"0,1,2"`, `"0-3"` and mixtures such as `"0,2-4,7"`. The result
/// is sorted and deduplicated.
///
/// ```
/// use netpulse::worker::affinity::parse_cpu_list;
///
/// let cores = parse_cpu_list("0,2-4,7").unwrap();
/// assert_eq!(cores, vec![0, 2, 3, 4, 7]);
/// ```
pub fn parse_cpu_list(spec: &str) -> Result<Vec<usize>> {
    let mut cores = Vec::new();

    for part in spec.split(',') {
        let part = part.trim();

        if let Some((start, end)) = part.split_once('-') {
            let start: usize = start
                .trim()
                .parse()
                .with_context(|| format!("Invalid CPU core number: {}", start))?;
            let end: usize = end
                .trim()
                .parse()
                .with_context(|| format!("Invalid CPU range format: {}", part))?;

            if start > end {
                anyhow::bail!("Invalid CPU range: start ({}) > end ({})", start, end);
            }
            cores.extend(start..=end);
        } else {
            let core: usize = part
                .parse()
                .with_context(|| format!("Invalid CPU core number: {}", part))?;
            cores.push(core);
        }
    }

    if cores.is_empty() {
        anyhow::bail!("CPU core list cannot be empty");
    }

    cores.sort_unstable();
    cores.dedup();

    Ok(cores)
}

/// Number of logical CPU cores on the system
pub fn num_cpus() -> usize {
    num_cpus::get()
}

/// Warn when more workers than pinned cores share them
///
/// Returns true if some cores will host more than one worker.
pub fn check_thread_count(workers: usize, cores: usize) -> bool {
    if workers > cores {
        tracing::warn!(
            workers,
            cores,
            "more workers than CPU cores in the pin list; workers will share cores"
        );
        true
    } else {
        false
    }
}
