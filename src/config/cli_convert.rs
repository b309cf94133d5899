//! CLI to RunConfig conversion utilities

use crate::config::cli::{self, Cli};
use crate::config::toml::FileConfig;
use crate::config::{BenchMode, RunConfig};
use crate::worker::affinity::parse_cpu_list;
use anyhow::{Context, Result};
use std::net::Ipv4Addr;

/// Parse a delay string (e.g. "1000000", "250ns", "100us", "1ms", "2s") to nanoseconds
///
/// A bare number is taken as nanoseconds.
pub fn parse_delay_ns(s: &str) -> Result<u64> {
    let s = s.trim().to_lowercase();

    if s.starts_with('-') {
        anyhow::bail!("Delay cannot be negative: {}", s);
    }

    let (num_str, multiplier) = if s.ends_with("ns") {
        (s.trim_end_matches("ns"), 1u64)
    } else if s.ends_with("us") {
        (s.trim_end_matches("us"), 1_000)
    } else if s.ends_with("ms") {
        (s.trim_end_matches("ms"), 1_000_000)
    } else if s.ends_with('s') {
        (s.trim_end_matches('s'), 1_000_000_000)
    } else {
        (s.as_str(), 1)
    };

    let num: u64 = num_str
        .parse()
        .with_context(|| format!("Parsing delay failed: {}", s))?;

    num.checked_mul(multiplier)
        .with_context(|| format!("Delay out of range: {}", s))
}

/// Parse a dotted-quad IPv4 address
pub fn parse_host(s: &str) -> Result<Ipv4Addr> {
    s.parse()
        .with_context(|| format!("Converting host IPv4 '{}' failed", s))
}

pub fn convert_mode(mode: cli::Mode) -> BenchMode {
    match mode {
        cli::Mode::Latency => BenchMode::Latency,
        cli::Mode::Throughput => BenchMode::Throughput,
    }
}

/// Build the run configuration from CLI arguments and an optional file
///
/// Every CLI value that was given overrides the file; anything given in
/// neither place takes its default.
pub fn build_config(cli: &Cli, file: Option<FileConfig>) -> Result<RunConfig> {
    let file = file.unwrap_or_default();

    let host = match (&cli.host, &file.host) {
        (Some(h), _) => parse_host(h)?,
        (None, Some(h)) => parse_host(h)?,
        (None, None) => {
            anyhow::bail!("Target host is required (HOST-IPV4 or `host` in config file)")
        }
    };
    let port = cli
        .port
        .or(file.port)
        .context("Target port is required (PORT or `port` in config file)")?;

    let mut config = RunConfig::new(host, port);

    if let Some(mode) = cli.mode.map(convert_mode).or(file.mode) {
        config.mode = mode;
    }
    if let Some(n) = cli.num_workers.or(file.workers) {
        config.workers = n;
    }
    if let Some(n) = cli.num_conns.or(file.connections_per_worker) {
        config.connections_per_worker = n;
    }
    if let Some(n) = cli.num_reqs.or(file.requests_per_connection) {
        config.requests_per_connection = n;
    }

    if let Some(ref delay) = cli.delay {
        config.delay_ns = parse_delay_ns(delay)?;
    } else if let Some(ref delay) = file.delay {
        config.delay_ns = parse_delay_ns(delay).context("Invalid delay in config file")?;
    }

    if let Some(request) = cli.request.clone().or(file.request) {
        config.request = request;
    }

    if let Some(ref cores) = cli.cpu_cores {
        config.cpu_cores = Some(parse_cpu_list(cores)?);
    } else if let Some(cores) = file.cpu_cores {
        config.cpu_cores = Some(cores);
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_parse_delay_plain_ns() {
        assert_eq!(parse_delay_ns("1000000").unwrap(), 1_000_000);
        assert_eq!(parse_delay_ns("0").unwrap(), 0);
        assert_eq!(parse_delay_ns("250ns").unwrap(), 250);
    }

    #[test]
    fn test_parse_delay_units() {
        assert_eq!(parse_delay_ns("100us").unwrap(), 100_000);
        assert_eq!(parse_delay_ns("1ms").unwrap(), 1_000_000);
        assert_eq!(parse_delay_ns("2s").unwrap(), 2_000_000_000);
        assert_eq!(parse_delay_ns("5MS").unwrap(), 5_000_000);
    }

    #[test]
    fn test_parse_delay_rejects_garbage() {
        assert!(parse_delay_ns("-5").is_err());
        assert!(parse_delay_ns("fast").is_err());
        assert!(parse_delay_ns("99999999999999999999s").is_err());
    }

    #[test]
    fn test_build_config_cli_only() {
        let cli =
            Cli::try_parse_from(["netpulse", "-w", "2", "-d", "0", "127.0.0.1", "9000"]).unwrap();
        let config = build_config(&cli, None).unwrap();
        assert_eq!(config.workers, 2);
        assert_eq!(config.connections_per_worker, 1);
        assert_eq!(config.delay_ns, 0);
        assert_eq!(config.port, 9000);
    }

    #[test]
    fn test_build_config_cli_overrides_file() {
        let file = FileConfig {
            host: Some("10.1.1.1".to_string()),
            port: Some(80),
            workers: Some(8),
            connections_per_worker: Some(16),
            mode: Some(BenchMode::Throughput),
            ..FileConfig::default()
        };
        let cli = Cli::try_parse_from(["netpulse", "-w", "2"]).unwrap();
        let config = build_config(&cli, Some(file)).unwrap();
        assert_eq!(config.host, Ipv4Addr::new(10, 1, 1, 1));
        assert_eq!(config.workers, 2);
        assert_eq!(config.connections_per_worker, 16);
        assert_eq!(config.mode, BenchMode::Throughput);
    }

    #[test]
    fn test_build_config_requires_target() {
        let cli = Cli::try_parse_from(["netpulse"]).unwrap();
        assert!(build_config(&cli, None).is_err());

        let cli = Cli::try_parse_from(["netpulse", "not-an-ip", "80"]).unwrap();
        assert!(build_config(&cli, None).is_err());
    }
}
