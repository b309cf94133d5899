//! Human-readable text output

use crate::stats::histogram::LatencyHistogram;
use crate::stats::{LatencySummary, ThroughputSummary};
use crate::util::time::{format_nanos, format_rate};
use std::io::{self, Write};

/// Print the latency report to stdout
pub fn print_latency(summary: &LatencySummary) -> io::Result<()> {
    write_latency(&mut io::stdout().lock(), summary)
}

/// Print the throughput line to stdout
pub fn print_throughput(summary: &ThroughputSummary) -> io::Result<()> {
    write_throughput(&mut io::stdout().lock(), summary)
}

pub fn print_histogram(hist: &LatencyHistogram) -> io::Result<()> {
    write_histogram(&mut io::stdout().lock(), hist)
}

/// Latency figures, then the best and worst samples
///
/// Values are raw nanoseconds so the output can be compared across runs
/// with plain text tools.
pub fn write_latency<W: Write>(out: &mut W, summary: &LatencySummary) -> io::Result<()> {
    writeln!(out, "Latency [ns]:")?;
    writeln!(out, "  {:<10}{}", "mean:", summary.mean)?;
    writeln!(out, "  {:<10}{}", "min:", summary.min)?;
    writeln!(out, "  {:<10}{}", "max:", summary.max)?;
    writeln!(out, "  {:<10}{}", "median:", summary.median)?;
    for q in &summary.quantiles {
        let label = format!("q {}:", q.label);
        writeln!(out, "  {:<10}{}", label, q.value)?;
    }
    writeln!(out)?;

    writeln!(out, "Best {}:", summary.best.len())?;
    for (i, ns) in summary.best.iter().enumerate() {
        writeln!(out, "  {:2}. {}", i + 1, ns)?;
    }
    writeln!(out)?;
    writeln!(out, "Worst {}:", summary.worst.len())?;
    for (i, ns) in summary.worst.iter().enumerate() {
        writeln!(out, "  {:2}. {}", i + 1, ns)?;
    }
    Ok(())
}

pub fn write_throughput<W: Write>(out: &mut W, summary: &ThroughputSummary) -> io::Result<()> {
    writeln!(
        out,
        "{} requests in {:.2}s, rate: {:.2} req/s",
        summary.total_requests,
        summary.elapsed_secs(),
        summary.rate
    )
}

/// Log-bucketed distribution with a proportional bar per bucket
pub fn write_histogram<W: Write>(out: &mut W, hist: &LatencyHistogram) -> io::Result<()> {
    const BAR_WIDTH: u64 = 40;

    let buckets = hist.buckets();
    let peak = buckets.iter().map(|b| b.count).max().unwrap_or(0);

    writeln!(out)?;
    writeln!(out, "Histogram ({} samples):", hist.len())?;
    if let Some(stddev) = hist.stddev() {
        writeln!(out, "  stddev: {}", format_nanos(stddev as u64))?;
    }
    for (label, percentile) in [("p50", 50.0), ("p99", 99.0)] {
        if let Some(ns) = hist.value_at_percentile(percentile) {
            writeln!(out, "  {}: {}", label, format_nanos(ns))?;
        }
    }
    for bucket in &buckets {
        let bar = if peak == 0 {
            0
        } else {
            (bucket.count * BAR_WIDTH).div_ceil(peak)
        };
        writeln!(
            out,
            "  <= {:>9} {:>10} {:>7.3}% {}",
            format_nanos(bucket.upper_ns),
            bucket.count,
            bucket.percentile,
            "#".repeat(bar as usize)
        )?;
    }
    Ok(())
}

/// One-line summary for log output
pub fn throughput_headline(summary: &ThroughputSummary) -> String {
    format!("{} req/s", format_rate(summary.rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render<F: FnOnce(&mut Vec<u8>) -> io::Result<()>>(f: F) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_latency_layout() {
        let summary = LatencySummary::from_sorted(&[100, 200, 300]).unwrap();
        let text = render(|out| write_latency(out, &summary));
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Latency [ns]:");
        assert_eq!(lines[1], "  mean:     200");
        assert_eq!(lines[2], "  min:      100");
        assert_eq!(lines[3], "  max:      300");
        assert_eq!(lines[4], "  median:   200");
        assert_eq!(lines[5], "  q 0.9:    300");
        assert_eq!(lines[11], "  q 0.9999: 300");
        assert_eq!(lines[12], "");
        assert_eq!(lines[13], "Best 3:");
        assert_eq!(lines[14], "   1. 100");
        assert!(text.contains("Worst 3:\n   1. 300\n   2. 200\n   3. 100\n"));
    }

    #[test]
    fn test_throughput_line() {
        let summary = ThroughputSummary::new(1_000, 2_000_000_000);
        let text = render(|out| write_throughput(out, &summary));
        assert_eq!(text, "1000 requests in 2.00s, rate: 500.00 req/s\n");
        assert_eq!(throughput_headline(&summary), "500 req/s");
    }

    #[test]
    fn test_histogram_lists_buckets() {
        let hist = LatencyHistogram::from_samples(&[1_000, 1_000, 50_000]).unwrap();
        let text = render(|out| write_histogram(out, &hist));
        assert!(text.contains("Histogram (3 samples):"));
        assert!(text.contains(&"#".repeat(40)));
    }

    #[test]
    fn test_histogram_reports_percentiles() {
        let hist = LatencyHistogram::from_samples(&[1_000, 1_000, 50_000]).unwrap();
        let text = render(|out| write_histogram(out, &hist));
        assert!(text.contains("  p50: 1.00us\n"), "{}", text);
        assert!(text.contains("  p99: "));
    }

    #[test]
    fn test_empty_histogram_has_no_percentiles() {
        let hist = LatencyHistogram::new().unwrap();
        let text = render(|out| write_histogram(out, &hist));
        assert!(text.contains("Histogram (0 samples):"));
        assert!(!text.contains("p50"));
    }
}
