//! netpulse CLI entry point

use anyhow::{Context, Result};
use netpulse::config::cli::Cli;
use netpulse::config::{cli_convert, toml, validator, RunConfig};
use netpulse::output::json::{self, JsonSummary};
use netpulse::output::text;
use netpulse::stats::ThroughputSummary;
use netpulse::RunOutcome;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Any error is printed with its cause chain and exits with status 1
fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_logging(&cli);
    run(cli)
}

/// Logs go to stderr so stdout carries only the report
fn init_logging(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let file = match cli.config {
        Some(ref path) => Some(toml::parse_toml_file(path)?),
        None => None,
    };
    let config = cli_convert::build_config(&cli, file)?;
    validator::validate_config(&config).context("Configuration validation failed")?;

    println!("netpulse v{}", env!("CARGO_PKG_VERSION"));
    println!("{}", config);
    println!();

    if cli.dry_run {
        println!("Dry run mode - configuration validated successfully");
        return Ok(());
    }

    let outcome = netpulse::run(config.clone()).context("Measurement failed")?;
    report(&cli, &config, outcome)
}

fn report(cli: &Cli, config: &RunConfig, outcome: RunOutcome) -> Result<()> {
    let summary = match outcome {
        RunOutcome::Latency(matrix) => {
            let sorted = matrix.into_sorted();
            let summary = sorted.summarize()?;
            text::print_latency(&summary)?;
            if cli.histogram {
                text::print_histogram(&sorted.histogram()?)?;
            }
            info!(samples = summary.count, median_ns = summary.median, "latency run complete");
            JsonSummary::Latency(summary)
        }
        RunOutcome::Throughput {
            total_requests,
            elapsed_ns,
        } => {
            let summary = ThroughputSummary::new(total_requests, elapsed_ns);
            text::print_throughput(&summary)?;
            info!(rate = %text::throughput_headline(&summary), "throughput run complete");
            JsonSummary::Throughput(summary)
        }
    };

    if let Some(ref path) = cli.json {
        let report = json::build_report(config, summary);
        json::write_json_output(path, &report, true)?;
        info!(path = %path.display(), "JSON report written");
    }
    Ok(())
}
