//! TOML configuration file parsing
//!
//! Every key is optional so a file can hold just the parts of a run that
//! stay fixed (say, the target and shard shape) while the CLI varies the rest.
//!
//! ```toml
//! host = "127.0.0.1"
//! port = 8080
//! mode = "latency"
//! workers = 4
//! connections_per_worker = 32
//! requests_per_connection = 10000
//! delay = "1ms"
//! request = "Hello!!!"
//! cpu_cores = [0, 1, 2, 3]
//! ```

use super::BenchMode;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Partial run configuration as read from a file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub mode: Option<BenchMode>,
    pub workers: Option<u32>,
    pub connections_per_worker: Option<u32>,
    pub requests_per_connection: Option<u32>,
    /// Same syntax as `--delay`
    pub delay: Option<String>,
    pub request: Option<String>,
    pub cpu_cores: Option<Vec<usize>>,
}

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<FileConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<FileConfig> {
    let config: FileConfig = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_full_file() {
        let toml = r#"
host = "127.0.0.1"
port = 8080
mode = "throughput"
workers = 4
connections_per_worker = 32
requests_per_connection = 10000
delay = "1ms"
cpu_cores = [0, 2]
"#;
        let config = parse_toml_string(toml).unwrap();
        assert_eq!(config.host.as_deref(), Some("127.0.0.1"));
        assert_eq!(config.port, Some(8080));
        assert_eq!(config.mode, Some(BenchMode::Throughput));
        assert_eq!(config.workers, Some(4));
        assert_eq!(config.connections_per_worker, Some(32));
        assert_eq!(config.requests_per_connection, Some(10000));
        assert_eq!(config.delay.as_deref(), Some("1ms"));
        assert_eq!(config.cpu_cores, Some(vec![0, 2]));
        assert!(config.request.is_none());
    }

    #[test]
    fn test_parse_empty_file() {
        let config = parse_toml_string("").unwrap();
        assert!(config.host.is_none());
        assert!(config.workers.is_none());
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(parse_toml_string("threads = 4").is_err());
    }

    #[test]
    fn test_parse_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 9000\nworkers = 2").unwrap();

        let config = parse_toml_file(file.path()).unwrap();
        assert_eq!(config.port, Some(9000));
        assert_eq!(config.workers, Some(2));
    }

    #[test]
    fn test_missing_file() {
        let err = parse_toml_file(Path::new("/nonexistent/netpulse.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
