//! JSON output formatting
//!
//! One report per run: test information (host, timestamp, configuration)
//! plus the mode-specific summary.

use crate::config::{BenchMode, RunConfig};
use crate::stats::{LatencySummary, ThroughputSummary};
use crate::Result;
use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Run configuration as reported
#[derive(Debug, Clone, Serialize)]
pub struct JsonTestConfig {
    pub target: String,
    pub mode: BenchMode,
    pub workers: u32,
    pub connections_per_worker: u32,
    pub requests_per_connection: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_ns: Option<u64>,
    pub request_bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_cores: Option<Vec<usize>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonTestInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// RFC 3339, UTC
    pub timestamp: String,
    pub config: JsonTestConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum JsonSummary {
    Latency(LatencySummary),
    Throughput(ThroughputSummary),
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonReport {
    pub test_info: JsonTestInfo,
    pub results: JsonSummary,
}

pub fn build_test_config(config: &RunConfig) -> JsonTestConfig {
    JsonTestConfig {
        target: config.addr().to_string(),
        mode: config.mode,
        workers: config.workers,
        connections_per_worker: config.connections_per_worker,
        requests_per_connection: config.requests_per_connection,
        delay_ns: (config.mode == BenchMode::Latency).then_some(config.delay_ns),
        request_bytes: config.request.len(),
        cpu_cores: config.cpu_cores.clone(),
    }
}

pub fn build_report(config: &RunConfig, results: JsonSummary) -> JsonReport {
    JsonReport {
        test_info: JsonTestInfo {
            hostname: local_hostname(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            config: build_test_config(config),
        },
        results,
    }
}

/// Write JSON output to file
pub fn write_json_output(output_path: &Path, report: &JsonReport, pretty: bool) -> Result<()> {
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create JSON output file: {}", output_path.display()))?;
    let mut writer = BufWriter::new(file);

    if pretty {
        serde_json::to_writer_pretty(&mut writer, report)?;
    } else {
        serde_json::to_writer(&mut writer, report)?;
    }
    writer.flush()?;

    Ok(())
}

fn local_hostname() -> Option<String> {
    hostname::get().ok().and_then(|h| h.into_string().ok())
}
