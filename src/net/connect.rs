use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, trace};

use crate::endpoint::stream::DEFAULT_READ_CHUNK_SIZE;
use crate::endpoint::{Endpoint, TcpEndpoint};

/// Establishes a transport connection to one address.
///
/// `None` covers every failure (refused, unreachable, deadline passed).
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, addr: SocketAddr, deadline: Instant) -> Option<Box<dyn Endpoint>>;
}

#[derive(Debug, Clone)]
pub struct TcpConnector {
    read_chunk_size: usize,
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl TcpConnector {
    pub fn new() -> Self {
        Self {
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
        }
    }

    pub fn with_read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size;
        self
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, addr: SocketAddr, deadline: Instant) -> Option<Box<dyn Endpoint>> {
        let stream = match timeout_at(deadline, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                debug!(%addr, error = %e, "connect failed");
                return None;
            }
            Err(_) => {
                debug!(%addr, "connect timed out");
                return None;
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            trace!(%addr, error = %e, "could not set TCP_NODELAY");
        }

        trace!(%addr, "connected");
        Some(Box::new(
            TcpEndpoint::from_tcp(stream).with_read_chunk_size(self.read_chunk_size),
        ))
    }
}
