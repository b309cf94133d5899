//! Event tokens carried in the epoll payload
//!
//! Socket and timer sources of the same connection share one wait set, so the
//! payload names both the connection and which of its sources fired. The
//! kind lives in the high word and the connection index in the low word;
//! kind 0 is never produced, so a zeroed payload fails to decode.

use crate::error::{Fault, FaultResult};

/// Index of a connection within its worker's shard
pub type ConnectionId = usize;

const KIND_SOCKET: u64 = 1;
const KIND_TIMER: u64 = 2;
const INDEX_MASK: u64 = 0xFFFF_FFFF;

/// Source of a readiness event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventToken {
    /// The connection's socket has bytes to read
    Socket(ConnectionId),
    /// The connection's pacing timer expired
    Timer(ConnectionId),
}

impl EventToken {
    pub fn connection(&self) -> ConnectionId {
        match *self {
            EventToken::Socket(id) | EventToken::Timer(id) => id,
        }
    }

    /// Encode into the 64-bit epoll payload
    ///
    /// Connection indices are bounded by `u32` because the per-worker
    /// connection count is a `u32`.
    pub fn encode(&self) -> u64 {
        let (kind, id) = match *self {
            EventToken::Socket(id) => (KIND_SOCKET, id),
            EventToken::Timer(id) => (KIND_TIMER, id),
        };
        debug_assert!(id as u64 <= INDEX_MASK);
        (kind << 32) | (id as u64 & INDEX_MASK)
    }

    pub fn decode(raw: u64) -> FaultResult<Self> {
        let id = (raw & INDEX_MASK) as ConnectionId;
        match raw >> 32 {
            KIND_SOCKET => Ok(EventToken::Socket(id)),
            KIND_TIMER => Ok(EventToken::Timer(id)),
            kind => Err(Fault::protocol(
                id,
                format!("unknown event source kind {} in payload {:#x}", kind, raw),
            )),
        }
    }
}
