//! Per-worker event multiplexer
//!
//! A `Reactor` wraps one epoll instance. Every source is registered
//! edge-triggered: an event is delivered once per not-ready → ready
//! transition, so whoever handles it must drain the source until it reports
//! "would block" before the next `wait`.
//!
//! Socket readability and pacing-timer expiry share the same wait set; each
//! registration carries an [`EventToken`] naming the owning connection and
//! the kind of source.
//!
//! # Example
//!
//! ```no_run
//! use netpulse::reactor::{EventToken, Events, Interest, Reactor};
//! use std::net::TcpStream;
//!
//! let stream = TcpStream::connect("127.0.0.1:8080")?;
//! stream.set_nonblocking(true)?;
//!
//! let reactor = Reactor::new()?;
//! reactor.register(&stream, EventToken::Socket(0), Interest::SOCKET)?;
//!
//! let mut events = Events::with_capacity(64);
//! reactor.wait(&mut events)?;
//! for event in events.iter() {
//!     println!("{:?}", event.token()?);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod timer;
pub mod token;

pub use timer::PacingTimer;
pub use token::{ConnectionId, EventToken};

use crate::error::{Fault, FaultResult};
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

/// Number of events fetched per `epoll_wait`
pub const MAX_EVENTS: usize = 64;

/// Hang-up or error conditions; any of these aborts the run
const FAULT_FLAGS: u32 = (libc::EPOLLRDHUP | libc::EPOLLERR | libc::EPOLLHUP) as u32;

/// Readiness a source is registered for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interest(u32);

impl Interest {
    /// Socket readable, plus peer half-close so a closing server is noticed
    pub const SOCKET: Interest =
        Interest((libc::EPOLLIN | libc::EPOLLRDHUP | libc::EPOLLET) as u32);

    /// Timer expired
    pub const TIMER: Interest = Interest((libc::EPOLLIN | libc::EPOLLET) as u32);

    pub fn bits(&self) -> u32 {
        self.0
    }
}

/// One readiness notification
#[derive(Debug, Clone, Copy)]
pub struct ReadyEvent {
    flags: u32,
    data: u64,
}

impl ReadyEvent {
    pub fn token(&self) -> FaultResult<EventToken> {
        EventToken::decode(self.data)
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// True if the source reported hang-up or an error condition
    #[inline]
    pub fn is_fault(&self) -> bool {
        self.flags & FAULT_FLAGS != 0
    }
}

/// Reusable buffer the kernel fills on each `wait`
pub struct Events {
    buf: Vec<libc::epoll_event>,
    len: usize,
}

impl Events {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![libc::epoll_event { events: 0, u64: 0 }; capacity.max(1)],
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = ReadyEvent> + '_ {
        // epoll_event is packed on some targets; copy fields out by value
        self.buf[..self.len].iter().map(|e| {
            let ev = *e;
            ReadyEvent {
                flags: ev.events,
                data: ev.u64,
            }
        })
    }
}

/// Edge-triggered epoll wait set owned by one worker thread
#[derive(Debug)]
pub struct Reactor {
    epfd: OwnedFd,
}

impl Reactor {
    pub fn new() -> FaultResult<Self> {
        // SAFETY: plain syscall, result checked below.
        let fd = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
        if fd < 0 {
            return Err(Fault::last_os("Creating epoll instance failed"));
        }
        // SAFETY: fd is a freshly created descriptor we exclusively own.
        Ok(Self {
            epfd: unsafe { OwnedFd::from_raw_fd(fd) },
        })
    }

    /// Add a source to the wait set
    pub fn register(
        &self,
        source: &impl AsRawFd,
        token: EventToken,
        interest: Interest,
    ) -> io::Result<()> {
        let mut ev = libc::epoll_event {
            events: interest.bits(),
            u64: token.encode(),
        };
        // SAFETY: ev is valid for the duration of the call.
        let ret = unsafe {
            libc::epoll_ctl(
                self.epfd.as_raw_fd(),
                libc::EPOLL_CTL_ADD,
                source.as_raw_fd(),
                &mut ev,
            )
        };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Remove a source from the wait set
    pub fn deregister(&self, source: &impl AsRawFd) -> io::Result<()> {
        // SAFETY: a null event pointer is allowed for EPOLL_CTL_DEL.
        let ret = unsafe {
            libc::epoll_ctl(
                self.epfd.as_raw_fd(),
                libc::EPOLL_CTL_DEL,
                source.as_raw_fd(),
                std::ptr::null_mut(),
            )
        };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Block until at least one source is ready
    ///
    /// There is no timeout. Interrupted waits are retried.
    pub fn wait(&self, events: &mut Events) -> FaultResult<usize> {
        loop {
            // SAFETY: buf holds buf.len() initialized epoll_event slots.
            let n = unsafe {
                libc::epoll_wait(
                    self.epfd.as_raw_fd(),
                    events.buf.as_mut_ptr(),
                    events.buf.len() as libc::c_int,
                    -1,
                )
            };
            if n >= 0 {
                events.len = n as usize;
                return Ok(events.len);
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(Fault::Setup {
                    what: "Waiting for events failed",
                    source: err,
                });
            }
        }
    }
}
