//! Per-socket connection driven by its worker's reactor
//!
//! A `Connection` pairs the stream socket (and, for paced latency runs, its
//! pacing timer) with a [`RequestTracker`]. It turns readiness events into
//! tracker events, then performs whatever I/O the tracker asks for.
//!
//! Any non-empty read counts as exactly one response. Responses are assumed
//! to fit one read and never to coalesce with the next one; TCP does not
//! promise this, and the engine accepts it as a known approximation.

pub mod state;

pub use state::{Action, ConnEvent, ConnState, RequestTracker, SendPolicy};

use crate::error::{Fault, FaultResult};
use crate::reactor::{EventToken, Interest, PacingTimer, Reactor};
use crate::util::fast_time::now_ns;
use std::io::{self, Read, Write};
use std::net::TcpStream;

/// Size of the stack buffer responses are drained into
const READ_BUF_SIZE: usize = 512;

/// Per-run pacing parameters shared by every connection of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub policy: SendPolicy,
    pub delay_ns: u64,
    pub target_requests: u32,
}

/// Open file descriptors of a live connection
struct Link {
    socket: TcpStream,
    timer: Option<PacingTimer>,
}

/// One connection to the target, owned by a single worker
pub struct Connection<'a> {
    id: usize,
    /// None once retired
    link: Option<Link>,
    request: &'a [u8],
    tracker: RequestTracker<'a>,
}

impl<'a> Connection<'a> {
    /// Wrap a connected socket and register it with the reactor
    ///
    /// A pacing timer is created and registered only for the `Paced` policy.
    pub fn establish(
        id: usize,
        socket: TcpStream,
        reactor: &Reactor,
        request: &'a [u8],
        pacing: Pacing,
        latency_slots: &'a mut [u64],
    ) -> FaultResult<Self> {
        let Pacing {
            policy,
            delay_ns,
            target_requests,
        } = pacing;

        let timer = match policy {
            SendPolicy::Paced => Some(PacingTimer::new(delay_ns)?),
            SendPolicy::Immediate | SendPolicy::Unmeasured => None,
        };

        reactor
            .register(&socket, EventToken::Socket(id), Interest::SOCKET)
            .map_err(|source| Fault::Setup {
                what: "Adding client socket to poller failed",
                source,
            })?;
        if let Some(ref timer) = timer {
            reactor
                .register(timer, EventToken::Timer(id), Interest::TIMER)
                .map_err(|source| Fault::Setup {
                    what: "Adding client timer to poller failed",
                    source,
                })?;
        }

        let mut tracker = RequestTracker::new(id, policy, target_requests, latency_slots);
        tracker.transition(ConnEvent::Connected)?;

        Ok(Self {
            id,
            link: Some(Link { socket, timer }),
            request,
            tracker,
        })
    }

    pub fn state(&self) -> ConnState {
        self.tracker.state()
    }

    pub fn requests_completed(&self) -> u32 {
        self.tracker.requests_completed()
    }

    pub fn is_done(&self) -> bool {
        self.tracker.is_done()
    }

    /// Send the unmeasured priming request (latency mode)
    pub fn prime(&mut self, reactor: &Reactor) -> FaultResult<()> {
        let action = self.tracker.transition(ConnEvent::Prime)?;
        self.perform(action, reactor)
    }

    /// Send the first counted request (throughput mode)
    pub fn start(&mut self, reactor: &Reactor) -> FaultResult<()> {
        let action = self.tracker.transition(ConnEvent::Start { now_ns: now_ns() })?;
        self.perform(action, reactor)
    }

    /// Handle a readable socket; returns true if the connection just retired
    #[inline]
    pub fn on_readable(&mut self, reactor: &Reactor) -> FaultResult<bool> {
        if self.drain_socket()? == 0 {
            // Spurious wakeup: nothing to read yet
            return Ok(false);
        }
        let action = self
            .tracker
            .transition(ConnEvent::Response { now_ns: now_ns() })?;
        self.perform(action, reactor)?;
        Ok(action == Action::Retire)
    }

    /// Handle an expired pacing timer
    #[inline]
    pub fn on_timer(&mut self, reactor: &Reactor) -> FaultResult<()> {
        let link = self.live_link()?;
        let Some(ref timer) = link.timer else {
            return Err(Fault::protocol(self.id, "timer event on a connection without a timer"));
        };
        let expirations = timer.drain().map_err(|source| Fault::Io {
            conn: self.id,
            what: "Reading timer",
            source,
        })?;
        if expirations == 0 {
            return Ok(());
        }
        let action = self
            .tracker
            .transition(ConnEvent::TimerExpired { now_ns: now_ns() })?;
        self.perform(action, reactor)
    }

    fn perform(&mut self, action: Action, reactor: &Reactor) -> FaultResult<()> {
        match action {
            Action::Wait => Ok(()),
            Action::Send => self.send_request(),
            Action::ArmTimer => self.arm_timer(),
            Action::Retire => self.retire(reactor),
        }
    }

    fn live_link(&self) -> FaultResult<&Link> {
        self.link
            .as_ref()
            .ok_or_else(|| Fault::protocol(self.id, "event on a retired connection"))
    }

    /// Read until the socket would block; returns the number of bytes read
    fn drain_socket(&mut self) -> FaultResult<usize> {
        let id = self.id;
        let link = self
            .link
            .as_mut()
            .ok_or_else(|| Fault::protocol(id, "event on a retired connection"))?;

        let mut buf = [0u8; READ_BUF_SIZE];
        let mut total = 0;
        loop {
            match link.socket.read(&mut buf) {
                Ok(0) => {
                    return Err(Fault::protocol(id, "server closed the connection"));
                }
                Ok(n) => total += n,
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(total),
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(source) => {
                    return Err(Fault::Io {
                        conn: id,
                        what: "Reading",
                        source,
                    })
                }
            }
        }
    }

    /// Write the whole request in one call; anything short of that is a fault
    fn send_request(&mut self) -> FaultResult<()> {
        let id = self.id;
        let request = self.request;
        let link = self
            .link
            .as_mut()
            .ok_or_else(|| Fault::protocol(id, "send on a retired connection"))?;

        loop {
            match link.socket.write(request) {
                Ok(n) if n == request.len() => return Ok(()),
                Ok(n) => {
                    return Err(Fault::protocol(
                        id,
                        format!("short write: {} of {} bytes", n, request.len()),
                    ))
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(source) => {
                    return Err(Fault::Io {
                        conn: id,
                        what: "Writing",
                        source,
                    })
                }
            }
        }
    }

    fn arm_timer(&mut self) -> FaultResult<()> {
        let id = self.id;
        let link = self.live_link()?;
        let Some(ref timer) = link.timer else {
            return Err(Fault::protocol(id, "pacing requested on a connection without a timer"));
        };
        timer.arm().map_err(|source| Fault::Io {
            conn: id,
            what: "Setting timer fd",
            source,
        })
    }

    fn retire(&mut self, reactor: &Reactor) -> FaultResult<()> {
        let id = self.id;
        let Some(link) = self.link.take() else {
            return Err(Fault::protocol(id, "connection retired twice"));
        };
        let dereg = |source| Fault::Io {
            conn: id,
            what: "Removing from poller",
            source,
        };
        reactor.deregister(&link.socket).map_err(dereg)?;
        if let Some(ref timer) = link.timer {
            reactor.deregister(timer).map_err(dereg)?;
        }
        // Dropping the link closes the socket and the timer
        Ok(())
    }
}
