//! CLI argument parsing using clap

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Measurement mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Paced requests, report the latency distribution
    Latency,
    /// Back-to-back requests, report the aggregate request rate
    Throughput,
}

/// netpulse - TCP request/response load generator
#[derive(Parser, Debug)]
#[command(name = "netpulse")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Target server IPv4 address
    #[arg(value_name = "HOST-IPV4")]
    pub host: Option<String>,

    /// Target server port
    #[arg(value_name = "PORT")]
    pub port: Option<u16>,

    /// Measurement mode: latency or throughput
    #[arg(short = 'm', long, value_enum)]
    pub mode: Option<Mode>,

    /// Number of worker threads (default 1)
    #[arg(short = 'w', long)]
    pub num_workers: Option<u32>,

    /// Number of connections per worker (default 1)
    #[arg(short = 'c', long)]
    pub num_conns: Option<u32>,

    /// Number of requests per connection (default 1)
    #[arg(short = 'r', long)]
    pub num_reqs: Option<u32>,

    /// Delay before sending each request, latency mode only (e.g. 1000000, 250us, 1ms)
    #[arg(short = 'd', long)]
    pub delay: Option<String>,

    /// Request payload sent on every request (default "Hello!!!")
    #[arg(long)]
    pub request: Option<String>,

    /// CPU cores to pin workers to, round-robin (e.g. "0,2-4")
    #[arg(long)]
    pub cpu_cores: Option<String>,

    /// TOML configuration file (CLI options take precedence)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write a JSON report to this file
    #[arg(long, value_name = "FILE")]
    pub json: Option<PathBuf>,

    /// Also print a log-bucketed latency histogram
    #[arg(long)]
    pub histogram: bool,

    /// Validate configuration and exit without connecting
    #[arg(long)]
    pub dry_run: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Default log filter derived from `-v`
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_command_line() {
        let cli = Cli::try_parse_from([
            "netpulse", "-w", "4", "-c", "8", "-r", "1000", "-d", "500us", "--mode", "throughput",
            "127.0.0.1", "8080",
        ])
        .unwrap();
        assert_eq!(cli.host.as_deref(), Some("127.0.0.1"));
        assert_eq!(cli.port, Some(8080));
        assert_eq!(cli.num_workers, Some(4));
        assert_eq!(cli.num_conns, Some(8));
        assert_eq!(cli.num_reqs, Some(1000));
        assert_eq!(cli.delay.as_deref(), Some("500us"));
        assert_eq!(cli.mode, Some(Mode::Throughput));
    }

    #[test]
    fn test_long_option_names() {
        let cli = Cli::try_parse_from([
            "netpulse",
            "--num-workers",
            "2",
            "--num-conns",
            "3",
            "--num-reqs",
            "4",
            "10.0.0.1",
            "80",
        ])
        .unwrap();
        assert_eq!(cli.num_workers, Some(2));
        assert_eq!(cli.num_conns, Some(3));
        assert_eq!(cli.num_reqs, Some(4));
        assert_eq!(cli.mode, None);
    }

    #[test]
    fn test_verbosity() {
        let cli = Cli::try_parse_from(["netpulse", "-vv", "127.0.0.1", "80"]).unwrap();
        assert_eq!(cli.log_filter(), "trace");
    }

    #[test]
    fn test_rejects_bad_port() {
        assert!(Cli::try_parse_from(["netpulse", "127.0.0.1", "70000"]).is_err());
    }
}
