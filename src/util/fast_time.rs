//! Fast timing utilities using direct clock_gettime calls
//!
//! Latency samples are raw `u64` nanosecond differences between two reads of
//! `CLOCK_MONOTONIC`, so the hot path never touches `Instant` or `Duration`.

use std::time::Duration;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Current `CLOCK_MONOTONIC` time in nanoseconds
///
/// The monotonic clock starts at boot, so a reading of 0 does not occur in
/// practice; callers use 0 as a "no timestamp" sentinel.
#[inline(always)]
pub fn now_ns() -> u64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };

    // SAFETY: ts is a valid, writable timespec.
    unsafe {
        libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts);
    }

    (ts.tv_sec as u64) * NANOS_PER_SEC + (ts.tv_nsec as u64)
}

/// Fast timestamp using direct clock_gettime with CLOCK_MONOTONIC
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct FastInstant {
    nanos: u64,
}

impl FastInstant {
    #[inline(always)]
    pub fn now() -> Self {
        Self { nanos: now_ns() }
    }

    pub fn from_nanos(nanos: u64) -> Self {
        Self { nanos }
    }

    pub fn as_nanos(&self) -> u64 {
        self.nanos
    }

    /// Calculate duration since another FastInstant
    #[inline(always)]
    pub fn duration_since(&self, earlier: FastInstant) -> Duration {
        Duration::from_nanos(self.nanos.saturating_sub(earlier.nanos))
    }

    #[inline(always)]
    pub fn elapsed(&self) -> Duration {
        Self::now().duration_since(*self)
    }
}

/// Split a nanosecond count into a `timespec`
pub fn timespec_from_ns(ns: u64) -> libc::timespec {
    libc::timespec {
        tv_sec: (ns / NANOS_PER_SEC) as libc::time_t,
        tv_nsec: (ns % NANOS_PER_SEC) as libc::c_long,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_now_ns_non_zero_and_monotonic() {
        let t1 = now_ns();
        let t2 = now_ns();
        assert!(t1 > 0);
        assert!(t2 >= t1);
    }

    #[test]
    fn test_fast_instant_elapsed() {
        let start = FastInstant::now();
        thread::sleep(Duration::from_millis(10));

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(10));
        assert!(elapsed < Duration::from_secs(1));
    }

    #[test]
    fn test_duration_since_saturates() {
        let early = FastInstant::from_nanos(100);
        let late = FastInstant::from_nanos(350);
        assert_eq!(late.duration_since(early), Duration::from_nanos(250));
        assert_eq!(early.duration_since(late), Duration::ZERO);
    }

    #[test]
    fn test_timespec_from_ns() {
        let ts = timespec_from_ns(2_500_000_001);
        assert_eq!(ts.tv_sec, 2);
        assert_eq!(ts.tv_nsec, 500_000_001);

        let ts = timespec_from_ns(1_000_000);
        assert_eq!(ts.tv_sec, 0);
        assert_eq!(ts.tv_nsec, 1_000_000);
    }
}
