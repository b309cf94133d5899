//! One-shot pacing timer backed by timerfd

use crate::error::{Fault, FaultResult};
use crate::util::fast_time::timespec_from_ns;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

/// Non-blocking `CLOCK_MONOTONIC` timerfd armed with a fixed one-shot delay
///
/// The descriptor is closed on drop, which also removes it from any epoll set.
#[derive(Debug)]
pub struct PacingTimer {
    fd: OwnedFd,
    delay: libc::itimerspec,
}

impl PacingTimer {
    /// Create a disarmed timer that fires `delay_ns` after each `arm()`
    ///
    /// A zero delay would disarm a timerfd, so callers send immediately
    /// instead of creating a timer for it.
    pub fn new(delay_ns: u64) -> FaultResult<Self> {
        debug_assert!(delay_ns > 0);

        // SAFETY: plain syscall, result checked below.
        let fd = unsafe {
            libc::timerfd_create(libc::CLOCK_MONOTONIC, libc::TFD_NONBLOCK | libc::TFD_CLOEXEC)
        };
        if fd < 0 {
            return Err(Fault::last_os("Creating timer failed"));
        }

        // SAFETY: fd is a freshly created descriptor we exclusively own.
        let fd = unsafe { OwnedFd::from_raw_fd(fd) };

        Ok(Self {
            fd,
            delay: libc::itimerspec {
                it_interval: timespec_from_ns(0),
                it_value: timespec_from_ns(delay_ns),
            },
        })
    }

    /// Schedule one expiry `delay` from now, replacing any pending one
    #[inline]
    pub fn arm(&self) -> io::Result<()> {
        // SAFETY: self.delay is a valid itimerspec; old value is not requested.
        let ret = unsafe {
            libc::timerfd_settime(self.fd.as_raw_fd(), 0, &self.delay, std::ptr::null_mut())
        };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Consume pending expirations, returning how many there were
    ///
    /// Returns 0 if the timer has not fired since the last drain.
    #[inline]
    pub fn drain(&self) -> io::Result<u64> {
        let mut expirations: u64 = 0;
        loop {
            // SAFETY: reading exactly 8 bytes into a u64 on the stack.
            let n = unsafe {
                libc::read(
                    self.fd.as_raw_fd(),
                    &mut expirations as *mut u64 as *mut libc::c_void,
                    std::mem::size_of::<u64>(),
                )
            };
            if n >= 0 {
                return Ok(expirations);
            }
            let err = io::Error::last_os_error();
            match err.kind() {
                io::ErrorKind::WouldBlock => return Ok(0),
                io::ErrorKind::Interrupted => continue,
                _ => return Err(err),
            }
        }
    }
}

impl AsRawFd for PacingTimer {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}
