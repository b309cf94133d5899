//! Target descriptor
//!
//! The server under test is opaque: an IPv4 endpoint plus the fixed request
//! every connection sends. Workers share one descriptor read-only.

use crate::config::RunConfig;
use crate::error::{Fault, FaultResult};
use std::net::{SocketAddrV4, TcpStream};

/// Resolved address and request payload of the server under test
#[derive(Debug, Clone)]
pub struct TargetDescriptor {
    addr: SocketAddrV4,
    request: Box<[u8]>,
}

impl TargetDescriptor {
    pub fn new(addr: SocketAddrV4, request: impl Into<Box<[u8]>>) -> Self {
        Self {
            addr,
            request: request.into(),
        }
    }

    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(config.addr(), config.request.as_bytes())
    }

    pub fn addr(&self) -> SocketAddrV4 {
        self.addr
    }

    pub fn request(&self) -> &[u8] {
        &self.request
    }

    /// Open a connection to the target
    ///
    /// The connect itself blocks; the returned stream is non-blocking with
    /// Nagle disabled so each request leaves in its own segment.
    pub fn connect(&self) -> FaultResult<TcpStream> {
        let stream = TcpStream::connect(self.addr).map_err(|source| Fault::Setup {
            what: "Connecting to the server failed",
            source,
        })?;
        stream.set_nonblocking(true).map_err(|source| Fault::Setup {
            what: "Setting client socket non-blocking failed",
            source,
        })?;
        stream.set_nodelay(true).map_err(|source| Fault::Setup {
            what: "Setting TCP_NODELAY on client socket failed",
            source,
        })?;
        Ok(stream)
    }
}
