//! Asynchronous byte-stream endpoints.
//!
//! An [`Endpoint`] is a bidirectional byte stream (usually a socket) that is
//! driven entirely through futures: each `read` resolves exactly once with a
//! [`ReadEvent`], each `write` resolves exactly once with a [`WriteOutcome`].
//!
//! # Implementations
//!
//! - **`stream`**: [`StreamEndpoint`] over any tokio `AsyncRead + AsyncWrite`,
//!   with [`TcpEndpoint`] as the socket flavour
//! - **`secure`**: [`SecureEndpoint`], which runs every byte through a pair of
//!   frame protectors on its way to and from an inner endpoint
//!
//! # Lifecycle
//!
//! ```text
//!   read / write ──► ... ──► shutdown ──► drop
//! ```
//!
//! `shutdown` makes any pending operation resolve with
//! [`EndpointStatus::Shutdown`]. Dropping an endpoint is its destruction;
//! every implementation signals shutdown from `Drop` so that the owner never
//! has to remember the ordering.

pub mod secure;
pub mod stream;

use async_trait::async_trait;
use bytes::Bytes;
use std::net::SocketAddr;
use tokio::time::Instant;

pub use secure::SecureEndpoint;
pub use stream::{ShutdownHandle, StreamEndpoint, TcpEndpoint};

/// Status attached to every read delivery and to failed writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointStatus {
    /// Operation completed; more data may follow.
    Ok,
    /// The peer closed its side of the stream.
    Eof,
    /// A transport error occurred.
    Error,
    /// The endpoint was shut down while the operation was pending.
    Shutdown,
    /// The deadline passed before the operation completed.
    TimedOut,
}

impl EndpointStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, EndpointStatus::Ok)
    }
}

/// One delivery from [`Endpoint::read`]: zero or more slices and a status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadEvent {
    pub slices: Vec<Bytes>,
    pub status: EndpointStatus,
}

impl ReadEvent {
    pub fn new(slices: Vec<Bytes>, status: EndpointStatus) -> Self {
        Self { slices, status }
    }

    /// A delivery carrying no bytes, only a status.
    pub fn status(status: EndpointStatus) -> Self {
        Self {
            slices: Vec::new(),
            status,
        }
    }

    /// Total number of bytes carried by this delivery.
    pub fn len(&self) -> usize {
        self.slices.iter().map(Bytes::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of [`Endpoint::write`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Every byte was handed to the transport.
    Done,
    /// The write could not be started. Nothing was sent.
    Rejected,
    /// The write started but finished with a non-OK status.
    Failed(EndpointStatus),
}

/// Bidirectional asynchronous byte stream.
#[async_trait]
pub trait Endpoint: Send {
    /// Waits for bytes. Resolves exactly once per call.
    async fn read(&mut self, deadline: Instant) -> ReadEvent;

    /// Writes all `slices` in order. The endpoint keeps its own references to
    /// the slices for as long as the write is in progress.
    async fn write(&mut self, slices: Vec<Bytes>, deadline: Instant) -> WriteOutcome;

    /// Aborts pending operations and refuses new ones.
    fn shutdown(&mut self);

    /// Remote address, when the endpoint has one.
    fn peer(&self) -> Option<SocketAddr> {
        None
    }
}
