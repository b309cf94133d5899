//! Configuration validation

use super::*;
use anyhow::{Context, Result};

/// Upper bound applied to the pacing delay (one hour)
const MAX_DELAY_NS: u64 = 3_600_000_000_000;

/// Validate complete configuration
pub fn validate_config(config: &RunConfig) -> Result<()> {
    validate_shape(config)?;
    validate_request(&config.request)?;
    validate_delay(config)?;
    validate_cpu_cores(config)?;

    // Size guard on the latency matrix comes last so the messages above win
    config
        .matrix_len()
        .context("num_workers * num_conns * num_reqs * 8 bytes overflows the address space")?;

    Ok(())
}

/// Validate worker, connection and request counts
fn validate_shape(config: &RunConfig) -> Result<()> {
    if config.workers < 1 {
        anyhow::bail!("number of workers must be at least 1");
    }
    if config.connections_per_worker < 1 {
        anyhow::bail!("number of connections must be at least 1");
    }
    if config.requests_per_connection < 1 {
        anyhow::bail!("number of requests must be at least 1");
    }
    if config.port == 0 {
        anyhow::bail!("port must be non-zero");
    }
    Ok(())
}

fn validate_request(request: &str) -> Result<()> {
    if request.is_empty() {
        anyhow::bail!("request payload cannot be empty");
    }
    Ok(())
}

fn validate_delay(config: &RunConfig) -> Result<()> {
    if config.delay_ns > MAX_DELAY_NS {
        anyhow::bail!(
            "delay must be at most {}ns, got {}ns",
            MAX_DELAY_NS,
            config.delay_ns
        );
    }
    if config.mode == BenchMode::Throughput && config.delay_ns != DEFAULT_DELAY_NS {
        tracing::warn!("delay is ignored in throughput mode");
    }
    Ok(())
}

fn validate_cpu_cores(config: &RunConfig) -> Result<()> {
    let Some(ref cores) = config.cpu_cores else {
        return Ok(());
    };
    if cores.is_empty() {
        anyhow::bail!("CPU core list cannot be empty");
    }
    let available = crate::worker::affinity::num_cpus();
    if let Some(&core) = cores.iter().find(|&&c| c >= available) {
        anyhow::bail!(
            "CPU core {} does not exist ({} cores available)",
            core,
            available
        );
    }
    crate::worker::affinity::check_thread_count(config.workers as usize, cores.len());
    Ok(())
}
