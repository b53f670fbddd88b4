use std::io::{self, Read};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection};
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::endpoint::{Endpoint, SecureEndpoint, WriteOutcome};
use crate::net::resolve::split_host_port;
use crate::security::SecurityError;
use crate::security::protector::{Flushed, FrameProtector, Processed, ProtectorError};
use crate::security::roots::TrustedRoots;

const LEFTOVER_CHUNK_SIZE: usize = 8192;

/// Everything a handshake needs to authenticate the server.
#[derive(Debug, Clone)]
pub struct SecurityContext {
    roots: TrustedRoots,
    target_host: String,
}

impl SecurityContext {
    pub fn new(roots: TrustedRoots, target_host: impl Into<String>) -> Self {
        Self {
            roots,
            target_host: target_host.into(),
        }
    }

    pub fn roots(&self) -> &TrustedRoots {
        &self.roots
    }

    pub fn target_host(&self) -> &str {
        &self.target_host
    }

    /// Host name checked against the server certificate, without any port.
    pub fn server_name(&self) -> Result<ServerName<'static>, SecurityError> {
        let host = split_host_port(&self.target_host)
            .map(|(host, _)| host)
            .ok_or_else(|| SecurityError::InvalidHost(self.target_host.clone()))?;
        ServerName::try_from(host.to_string())
            .map_err(|_| SecurityError::InvalidHost(self.target_host.clone()))
    }
}

/// Upgrades a connected endpoint into a secure one.
///
/// On success the raw endpoint is absorbed into the returned endpoint.
#[async_trait]
pub trait SecureTransportSetup: Send + Sync {
    async fn setup(
        &self,
        ctx: &SecurityContext,
        endpoint: Box<dyn Endpoint>,
        deadline: Instant,
    ) -> Result<Box<dyn Endpoint>, SecurityError>;
}

/// TLS client handshake driven over the endpoint's own read and write.
#[derive(Debug, Clone, Default)]
pub struct TlsTransportSetup;

impl TlsTransportSetup {
    pub fn new() -> Self {
        Self
    }

    fn client_config(ctx: &SecurityContext) -> Result<Arc<ClientConfig>, SecurityError> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| SecurityError::Handshake(e.to_string()))?
            .with_root_certificates(ctx.roots().store())
            .with_no_client_auth();
        Ok(Arc::new(config))
    }
}

#[async_trait]
impl SecureTransportSetup for TlsTransportSetup {
    async fn setup(
        &self,
        ctx: &SecurityContext,
        mut endpoint: Box<dyn Endpoint>,
        deadline: Instant,
    ) -> Result<Box<dyn Endpoint>, SecurityError> {
        let server_name = ctx.server_name()?;
        let mut conn = ClientConnection::new(Self::client_config(ctx)?, server_name)
            .map_err(|e| SecurityError::Handshake(e.to_string()))?;

        debug!(host = ctx.target_host(), peer = ?endpoint.peer(), "starting TLS handshake");

        while conn.is_handshaking() {
            if conn.wants_write() {
                send_pending(&mut conn, endpoint.as_mut(), deadline).await?;
                continue;
            }

            let event = endpoint.read(deadline).await;
            for slice in &event.slices {
                feed(&mut conn, slice)?;
            }
            if !event.status.is_ok() && conn.is_handshaking() {
                return Err(SecurityError::Handshake(format!(
                    "transport ended during handshake ({:?})",
                    event.status
                )));
            }
        }

        if conn.wants_write() {
            send_pending(&mut conn, endpoint.as_mut(), deadline).await?;
        }

        // Application data that arrived with the last handshake flight has
        // already been decrypted; hand it to the secure endpoint as leftover.
        let mut leftover = Vec::new();
        let mut buf = vec![0u8; LEFTOVER_CHUNK_SIZE];
        loop {
            let n = read_plaintext(&mut conn, &mut buf)
                .map_err(|e| SecurityError::Handshake(e.to_string()))?;
            if n == 0 {
                break;
            }
            leftover.push(Bytes::copy_from_slice(&buf[..n]));
        }

        debug!(
            host = ctx.target_host(),
            version = ?conn.protocol_version(),
            leftover = leftover.len(),
            "TLS handshake complete"
        );

        let protector = TlsFrameProtector::new(conn);
        Ok(Box::new(SecureEndpoint::new(
            endpoint,
            Box::new(protector.clone()),
            Box::new(protector),
            leftover,
        )))
    }
}

async fn send_pending(
    conn: &mut ClientConnection,
    endpoint: &mut dyn Endpoint,
    deadline: Instant,
) -> Result<(), SecurityError> {
    let mut out = Vec::new();
    while conn.wants_write() {
        conn.write_tls(&mut out)
            .map_err(|e| SecurityError::Handshake(e.to_string()))?;
    }
    trace!(bytes = out.len(), "sending handshake bytes");
    match endpoint.write(vec![Bytes::from(out)], deadline).await {
        WriteOutcome::Done => Ok(()),
        other => Err(SecurityError::Handshake(format!(
            "handshake write failed ({other:?})"
        ))),
    }
}

fn feed(conn: &mut ClientConnection, mut data: &[u8]) -> Result<(), SecurityError> {
    while !data.is_empty() {
        conn.read_tls(&mut data)
            .map_err(|e| SecurityError::Handshake(e.to_string()))?;
        conn.process_new_packets()
            .map_err(|e| SecurityError::Handshake(e.to_string()))?;
    }
    Ok(())
}

fn read_plaintext(conn: &mut ClientConnection, out: &mut [u8]) -> io::Result<usize> {
    if out.is_empty() {
        return Ok(0);
    }
    match conn.reader().read(out) {
        Ok(n) => Ok(n),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
        Err(e) => Err(e),
    }
}

fn write_tls_into(conn: &mut ClientConnection, out: &mut [u8]) -> io::Result<usize> {
    let mut written = 0;
    while conn.wants_write() && written < out.len() {
        let mut cursor = &mut out[written..];
        let n = conn.write_tls(&mut cursor)?;
        if n == 0 {
            break;
        }
        written += n;
    }
    Ok(written)
}

fn channel_error(e: impl std::fmt::Display) -> ProtectorError {
    ProtectorError::Channel(e.to_string())
}

/// Frame protector backed by an established rustls session.
///
/// Both directions share one `ClientConnection`; clone the protector to get
/// the second half.
#[derive(Clone)]
pub struct TlsFrameProtector {
    conn: Arc<Mutex<ClientConnection>>,
}

impl TlsFrameProtector {
    pub fn new(conn: ClientConnection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, ClientConnection>, ProtectorError> {
        self.conn
            .lock()
            .map_err(|_| ProtectorError::Channel("session lock poisoned".to_string()))
    }
}

impl FrameProtector for TlsFrameProtector {
    fn protect(&mut self, unprotected: &[u8], protected: &mut [u8]) -> Result<Processed, ProtectorError> {
        let mut conn = self.lock()?;
        let consumed = if unprotected.is_empty() {
            0
        } else {
            io::Write::write(&mut conn.writer(), unprotected).map_err(channel_error)?
        };
        let produced = write_tls_into(&mut conn, protected).map_err(channel_error)?;
        Ok(Processed { consumed, produced })
    }

    fn protect_flush(&mut self, protected: &mut [u8]) -> Result<Flushed, ProtectorError> {
        let mut conn = self.lock()?;
        let produced = write_tls_into(&mut conn, protected).map_err(channel_error)?;
        Ok(Flushed {
            produced,
            still_pending: usize::from(conn.wants_write()),
        })
    }

    fn unprotect(&mut self, protected: &[u8], unprotected: &mut [u8]) -> Result<Processed, ProtectorError> {
        let mut conn = self.lock()?;
        let mut produced = read_plaintext(&mut conn, unprotected).map_err(channel_error)?;
        let mut consumed = 0;
        // An empty read_tls would be taken as end of stream.
        if produced < unprotected.len() && !protected.is_empty() {
            let mut rd = protected;
            consumed = conn.read_tls(&mut rd).map_err(channel_error)?;
            conn.process_new_packets().map_err(channel_error)?;
            produced += read_plaintext(&mut conn, &mut unprotected[produced..]).map_err(channel_error)?;
        }
        Ok(Processed { consumed, produced })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::StreamEndpoint;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};

    fn deadline() -> Instant {
        Instant::now() + Duration::from_secs(5)
    }

    #[test]
    fn server_name_drops_port() {
        let ctx = SecurityContext::new(TrustedRoots::global().clone(), "example.test:8443");
        let name = ctx.server_name().unwrap();
        assert_eq!(name.to_str(), "example.test");
    }

    #[test]
    fn server_name_rejects_garbage() {
        let ctx = SecurityContext::new(TrustedRoots::global().clone(), "not a host");
        assert!(matches!(ctx.server_name(), Err(SecurityError::InvalidHost(_))));
    }

    #[tokio::test]
    async fn handshake_fails_against_plaintext_server() {
        let (client, mut server) = duplex(16 * 1024);
        tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            let _ = server.read(&mut buf).await;
            let _ = server
                .write_all(b"HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\n\r\n")
                .await;
        });

        let ctx = SecurityContext::new(TrustedRoots::global().clone(), "example.test");
        let result = TlsTransportSetup::new()
            .setup(&ctx, Box::new(StreamEndpoint::new(client)), deadline())
            .await;
        assert!(matches!(result, Err(SecurityError::Handshake(_))));
    }

    #[tokio::test]
    async fn handshake_fails_when_peer_hangs_up() {
        let (client, server) = duplex(16 * 1024);
        drop(server);

        let ctx = SecurityContext::new(TrustedRoots::global().clone(), "example.test");
        let result = TlsTransportSetup::new()
            .setup(&ctx, Box::new(StreamEndpoint::new(client)), deadline())
            .await;
        assert!(result.is_err());
    }
}
