use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, trace};

use crate::endpoint::{Endpoint, EndpointStatus, ReadEvent, WriteOutcome};

/// Default size of the slice allocated for each read.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 8192;

/// Endpoint over a plain TCP socket.
pub type TcpEndpoint = StreamEndpoint<TcpStream>;

/// Cloneable trigger that shuts an endpoint down from another task.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }
}

/// [`Endpoint`] over any tokio byte stream.
///
/// Each `read` allocates a single slice of at most `read_chunk_size` bytes.
/// Small chunk sizes are useful in tests to force responses to arrive split
/// at arbitrary points.
pub struct StreamEndpoint<S> {
    stream: S,
    peer: Option<SocketAddr>,
    read_chunk_size: usize,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl<S> StreamEndpoint<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            stream,
            peer: None,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            shutdown_tx: Arc::new(tx),
            shutdown_rx: rx,
        }
    }

    pub fn with_read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size.max(1);
        self
    }

    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    pub fn read_chunk_size(&self) -> usize {
        self.read_chunk_size
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: Arc::clone(&self.shutdown_tx),
        }
    }

    fn is_shutdown(&self) -> bool {
        *self.shutdown_rx.borrow()
    }
}

impl TcpEndpoint {
    /// Wraps a connected socket, remembering its peer address for logging.
    pub fn from_tcp(stream: TcpStream) -> Self {
        let peer = stream.peer_addr().ok();
        let mut endpoint = Self::new(stream);
        endpoint.peer = peer;
        endpoint
    }
}

async fn shut_down(rx: &mut watch::Receiver<bool>) {
    // The sender lives as long as the endpoint, so an error here cannot
    // outlive the endpoint itself.
    let _ = rx.wait_for(|down| *down).await;
}

#[async_trait]
impl<S> Endpoint for StreamEndpoint<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn read(&mut self, deadline: Instant) -> ReadEvent {
        if self.is_shutdown() {
            return ReadEvent::status(EndpointStatus::Shutdown);
        }

        let mut buf = BytesMut::with_capacity(self.read_chunk_size);
        let stream = &mut self.stream;
        let rx = &mut self.shutdown_rx;

        tokio::select! {
            biased;

            _ = shut_down(rx) => ReadEvent::status(EndpointStatus::Shutdown),

            _ = sleep_until(deadline) => ReadEvent::status(EndpointStatus::TimedOut),

            res = stream.read_buf(&mut buf) => match res {
                Ok(0) => ReadEvent::status(EndpointStatus::Eof),
                Ok(n) => {
                    trace!(bytes = n, peer = ?self.peer, "read");
                    ReadEvent::new(vec![buf.freeze()], EndpointStatus::Ok)
                }
                Err(e) => {
                    debug!(error = %e, peer = ?self.peer, "read failed");
                    ReadEvent::status(EndpointStatus::Error)
                }
            },
        }
    }

    async fn write(&mut self, slices: Vec<Bytes>, deadline: Instant) -> WriteOutcome {
        if self.is_shutdown() {
            return WriteOutcome::Failed(EndpointStatus::Shutdown);
        }

        let stream = &mut self.stream;
        let rx = &mut self.shutdown_rx;
        let write_all = async {
            for slice in &slices {
                stream.write_all(slice).await?;
            }
            stream.flush().await
        };

        tokio::select! {
            biased;

            _ = shut_down(rx) => WriteOutcome::Failed(EndpointStatus::Shutdown),

            _ = sleep_until(deadline) => WriteOutcome::Failed(EndpointStatus::TimedOut),

            res = write_all => match res {
                Ok(()) => WriteOutcome::Done,
                Err(e) => {
                    debug!(error = %e, peer = ?self.peer, "write failed");
                    WriteOutcome::Failed(EndpointStatus::Error)
                }
            },
        }
    }

    fn shutdown(&mut self) {
        self.shutdown_tx.send_replace(true);
    }

    fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }
}

impl<S> Drop for StreamEndpoint<S> {
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);
        trace!(peer = ?self.peer, "endpoint destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::duplex;

    fn far_future() -> Instant {
        Instant::now() + Duration::from_secs(30)
    }

    #[tokio::test]
    async fn read_delivers_bytes_then_eof() {
        let (client, mut server) = duplex(64);
        let mut ep = StreamEndpoint::new(client);

        server.write_all(b"hello").await.unwrap();
        drop(server);

        let event = ep.read(far_future()).await;
        assert_eq!(event.status, EndpointStatus::Ok);
        assert_eq!(event.slices, vec![Bytes::from_static(b"hello")]);

        let event = ep.read(far_future()).await;
        assert_eq!(event.status, EndpointStatus::Eof);
        assert!(event.slices.is_empty());
    }

    #[tokio::test]
    async fn small_chunk_size_splits_reads() {
        let (client, mut server) = duplex(64);
        let mut ep = StreamEndpoint::new(client).with_read_chunk_size(2);

        server.write_all(b"abcde").await.unwrap();

        let mut collected = Vec::new();
        while collected.len() < 5 {
            let event = ep.read(far_future()).await;
            assert_eq!(event.status, EndpointStatus::Ok);
            for slice in event.slices {
                assert!(slice.len() <= 2);
                collected.extend_from_slice(&slice);
            }
        }
        assert_eq!(collected, b"abcde");
    }

    #[tokio::test]
    async fn read_times_out_at_deadline() {
        let (client, _server) = duplex(64);
        let mut ep = StreamEndpoint::new(client);

        let event = ep.read(Instant::now() + Duration::from_millis(20)).await;
        assert_eq!(event.status, EndpointStatus::TimedOut);
    }

    #[tokio::test]
    async fn shutdown_handle_wakes_pending_read() {
        let (client, _server) = duplex(64);
        let mut ep = StreamEndpoint::new(client);
        let handle = ep.shutdown_handle();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            handle.shutdown();
        });

        let event = ep.read(far_future()).await;
        assert_eq!(event.status, EndpointStatus::Shutdown);
    }

    #[tokio::test]
    async fn operations_after_shutdown_report_shutdown() {
        let (client, _server) = duplex(64);
        let mut ep = StreamEndpoint::new(client);
        ep.shutdown();

        assert_eq!(ep.read(far_future()).await.status, EndpointStatus::Shutdown);
        assert_eq!(
            ep.write(vec![Bytes::from_static(b"x")], far_future()).await,
            WriteOutcome::Failed(EndpointStatus::Shutdown)
        );
    }

    #[tokio::test]
    async fn write_sends_every_slice_in_order() {
        let (client, mut server) = duplex(64);
        let mut ep = StreamEndpoint::new(client);

        let outcome = ep
            .write(
                vec![Bytes::from_static(b"GET "), Bytes::from_static(b"/")],
                far_future(),
            )
            .await;
        assert_eq!(outcome, WriteOutcome::Done);

        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"GET /");
    }

    #[tokio::test]
    async fn dropping_endpoint_marks_handle_shut_down() {
        let (client, _server) = duplex(64);
        let ep = StreamEndpoint::new(client);
        let handle = ep.shutdown_handle();
        assert!(!handle.is_shutdown());
        drop(ep);
        assert!(handle.is_shutdown());
    }
}
