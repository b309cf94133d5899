//! Connection state machine
//!
//! ```text
//! Connecting ─► Priming ─► AwaitingResponse ⇄ AwaitingSend
//!                                  │
//!                                  └─► Done
//! ```
//!
//! `transition` is total over (state, event): every pair that is not an
//! expected step is a protocol fault, never a guess.

use crate::error::{Fault, FaultResult};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Connecting,
    Priming,
    AwaitingResponse,
    AwaitingSend,
    Done,
}

/// What happens after a response that did not finish the connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendPolicy {
    /// Latency mode: arm the pacing timer, send when it expires
    Paced,
    /// Latency mode with zero delay: send the next measured request at once
    Immediate,
    /// Throughput mode: send at once, count responses without timing them
    Unmeasured,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnEvent {
    /// Socket connected and configured
    Connected,
    /// Send the unmeasured priming request (latency mode)
    Prime,
    /// Send the first counted request (throughput mode, after the start barrier)
    Start { now_ns: u64 },
    /// Bytes arrived on the socket
    Response { now_ns: u64 },
    /// Pacing timer expired
    TimerExpired { now_ns: u64 },
}

/// I/O the caller must perform after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Nothing to do until the next event
    Wait,
    /// Write one request to the socket
    Send,
    /// Arm the pacing timer
    ArmTimer,
    /// All requests done: deregister and close
    Retire,
}

/// Request accounting for one connection
///
/// Owns the connection's slice of the latency matrix; slot
/// `requests_completed` is the next one written.
pub struct RequestTracker<'a> {
    id: usize,
    policy: SendPolicy,
    state: ConnState,
    requests_completed: u32,
    target_requests: u32,
    latency_slots: &'a mut [u64],
    /// 0 while no measured request is outstanding
    last_send_ns: u64,
}

impl<'a> RequestTracker<'a> {
    /// `latency_slots` must hold exactly `target_requests` entries unless the
    /// policy is `Unmeasured`, in which case it may be empty.
    pub fn new(
        id: usize,
        policy: SendPolicy,
        target_requests: u32,
        latency_slots: &'a mut [u64],
    ) -> Self {
        debug_assert!(target_requests >= 1);
        debug_assert!(
            policy == SendPolicy::Unmeasured || latency_slots.len() == target_requests as usize
        );
        Self {
            id,
            policy,
            state: ConnState::Connecting,
            requests_completed: 0,
            target_requests,
            latency_slots,
            last_send_ns: 0,
        }
    }

    pub fn state(&self) -> ConnState {
        self.state
    }

    pub fn requests_completed(&self) -> u32 {
        self.requests_completed
    }

    pub fn is_done(&self) -> bool {
        self.state == ConnState::Done
    }

    pub fn last_send_ns(&self) -> u64 {
        self.last_send_ns
    }

    /// Apply one event and return the I/O it calls for
    pub fn transition(&mut self, event: ConnEvent) -> FaultResult<Action> {
        use ConnState::*;

        match (self.state, event) {
            (Connecting, ConnEvent::Connected) => {
                self.state = Priming;
                Ok(Action::Wait)
            }
            (Priming, ConnEvent::Prime) if self.policy != SendPolicy::Unmeasured => {
                self.last_send_ns = 0;
                self.state = AwaitingResponse;
                Ok(Action::Send)
            }
            (Priming, ConnEvent::Start { now_ns }) if self.policy == SendPolicy::Unmeasured => {
                self.last_send_ns = now_ns;
                self.state = AwaitingResponse;
                Ok(Action::Send)
            }
            (AwaitingResponse, ConnEvent::Response { now_ns }) => Ok(self.on_response(now_ns)),
            (AwaitingSend, ConnEvent::TimerExpired { now_ns }) => {
                self.last_send_ns = now_ns;
                self.state = AwaitingResponse;
                Ok(Action::Send)
            }
            (state, event) => Err(Fault::protocol(
                self.id,
                format!("unexpected {} while {}", event, state),
            )),
        }
    }

    fn on_response(&mut self, now_ns: u64) -> Action {
        match self.policy {
            SendPolicy::Unmeasured => self.requests_completed += 1,
            SendPolicy::Paced | SendPolicy::Immediate => {
                // A zero timestamp marks the priming exchange, which is not recorded
                if self.last_send_ns != 0 {
                    let slot = self.requests_completed as usize;
                    self.latency_slots[slot] = now_ns.saturating_sub(self.last_send_ns);
                    self.requests_completed += 1;
                }
            }
        }

        if self.requests_completed == self.target_requests {
            self.state = ConnState::Done;
            self.last_send_ns = 0;
            return Action::Retire;
        }

        match self.policy {
            SendPolicy::Paced => {
                self.state = ConnState::AwaitingSend;
                Action::ArmTimer
            }
            SendPolicy::Immediate | SendPolicy::Unmeasured => {
                self.last_send_ns = now_ns;
                Action::Send
            }
        }
    }
}

impl fmt::Display for ConnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnState::Connecting => "connecting",
            ConnState::Priming => "priming",
            ConnState::AwaitingResponse => "awaiting response",
            ConnState::AwaitingSend => "awaiting send",
            ConnState::Done => "done",
        };
        f.write_str(name)
    }
}

impl fmt::Display for ConnEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnEvent::Connected => "connect",
            ConnEvent::Prime => "priming send",
            ConnEvent::Start { .. } => "start",
            ConnEvent::Response { .. } => "read event",
            ConnEvent::TimerExpired { .. } => "timer event",
        };
        f.write_str(name)
    }
}
