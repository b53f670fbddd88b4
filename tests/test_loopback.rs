//! End-to-end requests against real loopback listeners.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use waypoint::http::HttpClient;
use waypoint::http::request::RequestBuilder;
use waypoint::net::{ResolvedAddresses, Resolver, TcpConnector};
use waypoint::support::time::deadline_after;

struct FixedResolver(Vec<SocketAddr>);

#[async_trait]
impl Resolver for FixedResolver {
    async fn resolve(&self, _name: &str, _default_service: &str) -> Option<ResolvedAddresses> {
        Some(ResolvedAddresses::new(self.0.clone()))
    }
}

/// Accepts one connection, reads the request head, answers with `response`
/// and closes. Resolves to the raw request.
async fn serve_once(response: &'static [u8]) -> (SocketAddr, JoinHandle<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        socket.write_all(response).await.unwrap();
        socket.shutdown().await.unwrap();
        request
    });

    (addr, handle)
}

/// An address nothing listens on.
async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

#[tokio::test]
async fn test_get_over_tcp() {
    let (addr, server) = serve_once(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nOK").await;

    let request = RequestBuilder::new()
        .host(addr.to_string())
        .path("/hello")
        .header("Accept", "text/plain")
        .build()
        .unwrap();

    let resp = HttpClient::new()
        .fetch(&request, deadline_after(Duration::from_secs(10)))
        .await
        .unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.text(), "OK");

    let raw = String::from_utf8(server.await.unwrap()).unwrap();
    assert!(raw.starts_with("GET /hello HTTP/1.1\r\n"));
    assert!(raw.contains(&format!("Host: {addr}\r\n")));
    assert!(raw.contains("Connection: close\r\n"));
    assert!(raw.contains("Accept: text/plain\r\n"));
}

#[tokio::test]
async fn test_body_delimited_by_close() {
    let (addr, server) = serve_once(b"HTTP/1.0 200 OK\r\nServer: test\r\n\r\nuntil the end").await;

    let request = RequestBuilder::new().host(addr.to_string()).build().unwrap();
    let resp = HttpClient::new()
        .fetch(&request, deadline_after(Duration::from_secs(10)))
        .await
        .unwrap();

    assert_eq!(resp.version, "HTTP/1.0");
    assert_eq!(resp.text(), "until the end");
    server.await.unwrap();
}

#[tokio::test]
async fn test_one_byte_reads() {
    let (addr, server) =
        serve_once(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nabc\r\n0\r\n\r\n").await;

    let client = HttpClient::new()
        .with_connector(Arc::new(TcpConnector::new().with_read_chunk_size(1)));
    let request = RequestBuilder::new().host(addr.to_string()).build().unwrap();

    let resp = client
        .fetch(&request, deadline_after(Duration::from_secs(10)))
        .await
        .unwrap();
    assert_eq!(resp.text(), "abc");
    server.await.unwrap();
}

#[tokio::test]
async fn test_refused_address_falls_through() {
    let dead = closed_addr().await;
    let (live, server) = serve_once(b"HTTP/1.1 200 OK\r\nContent-Length: 4\r\n\r\nlive").await;

    let client = HttpClient::new().with_resolver(Arc::new(FixedResolver(vec![dead, live])));
    let request = RequestBuilder::new().host("multi.test").build().unwrap();

    let resp = client
        .fetch(&request, deadline_after(Duration::from_secs(10)))
        .await
        .unwrap();
    assert_eq!(resp.text(), "live");

    let raw = String::from_utf8(server.await.unwrap()).unwrap();
    assert!(raw.contains("Host: multi.test\r\n"));
}

#[tokio::test]
async fn test_all_addresses_refused() {
    let client = HttpClient::new().with_resolver(Arc::new(FixedResolver(vec![
        closed_addr().await,
        closed_addr().await,
    ])));
    let request = RequestBuilder::new().host("nowhere.test").build().unwrap();

    let resp = client
        .fetch(&request, deadline_after(Duration::from_secs(10)))
        .await;
    assert!(resp.is_none());
}

#[tokio::test]
async fn test_server_that_never_answers_hits_deadline() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(socket);
    });

    let request = RequestBuilder::new().host(addr.to_string()).build().unwrap();
    let started = std::time::Instant::now();
    let resp = HttpClient::new()
        .fetch(&request, deadline_after(Duration::from_millis(200)))
        .await;

    assert!(resp.is_none());
    assert!(started.elapsed() < Duration::from_secs(4));
    server.abort();
}
