//! Human-readable formatting of latencies and rates

use std::time::Duration;

/// Format a nanosecond latency in human-readable form
///
/// # Examples
///
/// ```
/// use netpulse::util::time::format_nanos;
///
/// assert_eq!(format_nanos(500), "500ns");
/// assert_eq!(format_nanos(1500), "1.50us");
/// assert_eq!(format_nanos(2_500_000), "2.50ms");
/// assert_eq!(format_nanos(5_000_000_000), "5.00s");
/// ```
pub fn format_nanos(nanos: u64) -> String {
    if nanos < 1_000 {
        format!("{}ns", nanos)
    } else if nanos < 1_000_000 {
        format!("{:.2}us", nanos as f64 / 1_000.0)
    } else if nanos < 1_000_000_000 {
        format!("{:.2}ms", nanos as f64 / 1_000_000.0)
    } else {
        format!("{:.2}s", nanos as f64 / 1_000_000_000.0)
    }
}

pub fn format_duration(duration: Duration) -> String {
    format_nanos(u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX))
}

/// Format a rate (requests per second)
///
/// # Examples
///
/// ```
/// use netpulse::util::time::format_rate;
///
/// assert_eq!(format_rate(500.0), "500");
/// assert_eq!(format_rate(1500.0), "1.50K");
/// assert_eq!(format_rate(2_500_000.0), "2.50M");
/// ```
pub fn format_rate(rate: f64) -> String {
    if rate < 1_000.0 {
        format!("{:.0}", rate)
    } else if rate < 1_000_000.0 {
        format!("{:.2}K", rate / 1_000.0)
    } else if rate < 1_000_000_000.0 {
        format!("{:.2}M", rate / 1_000_000.0)
    } else {
        format!("{:.2}G", rate / 1_000_000_000.0)
    }
}
