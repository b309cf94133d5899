//! Fault taxonomy for a measurement run
//!
//! A run is all-or-nothing: every variant here aborts the measurement. The
//! only recoverable I/O condition ("would block") never becomes a `Fault`.

use std::io;
use thiserror::Error;

/// Unrecoverable condition detected by the engine
#[derive(Debug, Error)]
pub enum Fault {
    /// Socket, timer, poller, connect, option-set or thread creation failed
    #[error("{what}: {source}")]
    Setup {
        what: &'static str,
        #[source]
        source: io::Error,
    },

    /// The event stream disagreed with the connection state machine
    #[error("protocol violation on connection {conn}: {detail}")]
    Protocol { conn: usize, detail: String },

    /// An I/O call on an established connection failed
    #[error("{what} failed on connection {conn}: {source}")]
    Io {
        conn: usize,
        what: &'static str,
        #[source]
        source: io::Error,
    },

    /// Readiness event carried hang-up or error flags
    #[error("got error on socket of connection {conn} (events {events:#x})")]
    Hangup { conn: usize, events: u32 },

    /// Arithmetic overflow caught before the operation was performed
    #[error("overflow in the calculation of {0}")]
    Overflow(&'static str),

    /// Run shape the engine cannot execute (zero workers, connections or requests)
    #[error("invalid run configuration: {0}")]
    InvalidConfig(&'static str),

    /// Another worker faulted and released the phase barriers
    #[error("run aborted by a fault in another worker")]
    Aborted,

    #[error("worker {0} panicked")]
    WorkerPanic(usize),
}

impl Fault {
    /// Wrap the current `errno` as a setup fault
    pub(crate) fn last_os(what: &'static str) -> Self {
        Fault::Setup {
            what,
            source: io::Error::last_os_error(),
        }
    }

    pub(crate) fn protocol(conn: usize, detail: impl Into<String>) -> Self {
        Fault::Protocol {
            conn,
            detail: detail.into(),
        }
    }
}

pub type FaultResult<T> = std::result::Result<T, Fault>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_messages() {
        let f = Fault::Overflow("mean");
        assert_eq!(f.to_string(), "overflow in the calculation of mean");

        let f = Fault::protocol(3, "unexpected read event");
        assert_eq!(
            f.to_string(),
            "protocol violation on connection 3: unexpected read event"
        );

        let f = Fault::Setup {
            what: "Connecting to the server failed",
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        assert!(f.to_string().starts_with("Connecting to the server failed"));
        assert!(std::error::Error::source(&f).is_some());
    }
}
