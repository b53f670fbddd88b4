//! One-shot HTTP client running over the endpoint stack.
//!
//! Every request is an [`InFlightRequest`] driven through an explicit state
//! machine:
//!
//! ```text
//!   Resolving ──► Connecting(i) ──► [Securing] ──► Writing ──► Reading ──► Done
//!                    ▲   │                            │           │
//!                    └───┴──── next address ◄─────────┴───────────┘
//!                                                  (only before the first byte)
//! ```
//!
//! Whatever happens, the request ends in exactly one call to `finish`, which
//! consumes the record: the callback runs once, then the parser, address
//! list, endpoint and request buffer are released in that order.

use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use bytes::Bytes;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout_at};
use tracing::{Instrument, debug, debug_span, error, info, warn};

use crate::config::Config;
use crate::endpoint::{Endpoint, EndpointStatus, WriteOutcome};
use crate::http::format::{format_get_request, format_post_request, format_request};
use crate::http::parser::{ParseError, ResponseParser};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::net::{Connector, DnsResolver, ResolvedAddresses, Resolver, TcpConnector};
use crate::security::{
    SecureTransportSetup, SecurityContext, SecurityError, TlsTransportSetup, TrustedRoots,
};

/// Why a request ended without a response.
#[derive(Debug, Error)]
pub enum RequestFailure {
    #[error("could not resolve {0}")]
    Resolution(String),

    #[error("all {0} candidate addresses failed")]
    AddressesExhausted(usize),

    #[error("secure transport setup failed: {0}")]
    Handshake(#[from] SecurityError),

    #[error("request write could not be started")]
    WriteRejected,

    #[error("malformed response: {0}")]
    Parse(#[from] ParseError),

    #[error("connection closed before the response was complete")]
    IncompleteResponse,
}

enum RequestState {
    Resolving { name: String, service: &'static str },
    Connecting,
    Securing(Box<dyn Endpoint>),
    Writing,
    Reading,
    Done(Result<(), RequestFailure>),
}

/// Entry point for issuing requests.
///
/// Cheap to clone; clones share the resolver, connector, handshake and trust
/// roots.
#[derive(Clone)]
pub struct HttpClient {
    resolver: Arc<dyn Resolver>,
    connector: Arc<dyn Connector>,
    secure_setup: Arc<dyn SecureTransportSetup>,
    roots: TrustedRoots,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// System DNS, plain TCP, rustls with the built-in roots.
    pub fn new() -> Self {
        Self {
            resolver: Arc::new(DnsResolver::new()),
            connector: Arc::new(TcpConnector::new()),
            secure_setup: Arc::new(TlsTransportSetup::new()),
            roots: TrustedRoots::global().clone(),
        }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let mut client = Self::new().with_connector(Arc::new(
            TcpConnector::new().with_read_chunk_size(config.client.read_chunk_size),
        ));

        if let Some(path) = &config.tls.root_certs {
            let pem = std::fs::read(path)
                .with_context(|| format!("reading root certificates from {}", path.display()))?;
            let roots = TrustedRoots::from_pem(&pem)
                .with_context(|| format!("parsing root certificates from {}", path.display()))?;
            client = client.with_roots(roots);
        }

        Ok(client)
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn with_secure_setup(mut self, secure_setup: Arc<dyn SecureTransportSetup>) -> Self {
        self.secure_setup = secure_setup;
        self
    }

    pub fn with_roots(mut self, roots: TrustedRoots) -> Self {
        self.roots = roots;
        self
    }

    /// Issues a GET on `runtime`. `on_response` runs exactly once, with
    /// `None` if the request failed.
    pub fn get<F>(&self, request: &Request, deadline: Instant, runtime: &Handle, on_response: F) -> JoinHandle<()>
    where
        F: FnOnce(Option<&Response>) + Send + 'static,
    {
        runtime.spawn(self.start(request, format_get_request(request), deadline, on_response))
    }

    /// Issues a POST of `request.body` on `runtime`. Same contract as [`get`](Self::get).
    pub fn post<F>(&self, request: &Request, deadline: Instant, runtime: &Handle, on_response: F) -> JoinHandle<()>
    where
        F: FnOnce(Option<&Response>) + Send + 'static,
    {
        runtime.spawn(self.start(request, format_post_request(request), deadline, on_response))
    }

    /// Runs the request on the current task, framed by its own method.
    pub async fn fetch(&self, request: &Request, deadline: Instant) -> Option<Response> {
        let mut result = None;
        self.start(request, format_request(request), deadline, |response: Option<&Response>| {
            result = response.cloned();
        })
        .await;
        result
    }

    /// Like [`fetch`](Self::fetch) but always framed as a POST.
    pub async fn fetch_post(&self, request: &Request, deadline: Instant) -> Option<Response> {
        let mut result = None;
        self.start(request, format_post_request(request), deadline, |response: Option<&Response>| {
            result = response.cloned();
        })
        .await;
        result
    }

    fn start<F>(
        &self,
        request: &Request,
        request_text: Bytes,
        deadline: Instant,
        on_response: F,
    ) -> impl Future<Output = ()> + Send + use<F>
    where
        F: FnOnce(Option<&Response>) + Send,
    {
        let span = debug_span!("http_request", host = %request.host, path = %request.path);
        let name = request.host.clone();
        let service = request.default_service();

        let req = InFlightRequest {
            client: self.clone(),
            request_text,
            parser: ResponseParser::new(),
            addresses: None,
            next_address: 0,
            endpoint: None,
            host: request.use_ssl.then(|| request.host.clone()),
            deadline,
            have_read_byte: false,
            on_response,
        };

        req.run(name, service).instrument(span)
    }
}

struct InFlightRequest<F> {
    client: HttpClient,
    request_text: Bytes,
    parser: ResponseParser,
    addresses: Option<ResolvedAddresses>,
    next_address: usize,
    endpoint: Option<Box<dyn Endpoint>>,
    /// Kept only for secure requests, to verify the server's identity.
    host: Option<String>,
    deadline: Instant,
    have_read_byte: bool,
    on_response: F,
}

impl<F> InFlightRequest<F>
where
    F: FnOnce(Option<&Response>) + Send,
{
    async fn run(mut self, name: String, service: &'static str) {
        let mut state = RequestState::Resolving { name, service };

        loop {
            state = match state {
                RequestState::Resolving { name, service } => self.resolve(name, service).await,
                RequestState::Connecting => self.next_address().await,
                RequestState::Securing(endpoint) => self.secure(endpoint).await,
                RequestState::Writing => self.write().await,
                RequestState::Reading => self.read().await,
                RequestState::Done(outcome) => {
                    self.finish(outcome);
                    return;
                }
            };
        }
    }

    async fn resolve(&mut self, name: String, service: &'static str) -> RequestState {
        let resolved = timeout_at(self.deadline, self.client.resolver.resolve(&name, service))
            .await
            .ok()
            .flatten()
            .filter(|addrs| !addrs.is_empty());

        match resolved {
            Some(addrs) => {
                debug!(count = addrs.len(), "resolved");
                self.addresses = Some(addrs);
                self.next_address = 0;
                RequestState::Connecting
            }
            None => RequestState::Done(Err(RequestFailure::Resolution(name))),
        }
    }

    async fn next_address(&mut self) -> RequestState {
        if let Some(mut old) = self.endpoint.take() {
            old.shutdown();
        }
        self.have_read_byte = false;

        let Some(addrs) = self.addresses.as_ref() else {
            return RequestState::Done(Err(RequestFailure::AddressesExhausted(0)));
        };
        let Some(addr) = addrs.get(self.next_address) else {
            return RequestState::Done(Err(RequestFailure::AddressesExhausted(addrs.len())));
        };
        self.next_address += 1;

        debug!(%addr, attempt = self.next_address, of = addrs.len(), "connecting");

        match self.client.connector.connect(addr, self.deadline).await {
            None => {
                warn!(%addr, attempt = self.next_address, "connect failed, trying next address");
                RequestState::Connecting
            }
            Some(endpoint) if self.host.is_some() => RequestState::Securing(endpoint),
            Some(endpoint) => {
                self.endpoint = Some(endpoint);
                RequestState::Writing
            }
        }
    }

    async fn secure(&mut self, endpoint: Box<dyn Endpoint>) -> RequestState {
        let host = self.host.clone().unwrap_or_default();
        let ctx = SecurityContext::new(self.client.roots.clone(), host);

        match self.client.secure_setup.setup(&ctx, endpoint, self.deadline).await {
            Ok(secure) => {
                self.endpoint = Some(secure);
                RequestState::Writing
            }
            Err(e) => {
                // Trust and negotiation problems do not go away on another address.
                error!(error = %e, "Secure transport setup failed");
                RequestState::Done(Err(e.into()))
            }
        }
    }

    async fn write(&mut self) -> RequestState {
        let Some(endpoint) = self.endpoint.as_mut() else {
            return RequestState::Connecting;
        };

        match endpoint.write(vec![self.request_text.clone()], self.deadline).await {
            WriteOutcome::Done => RequestState::Reading,
            WriteOutcome::Rejected => RequestState::Done(Err(RequestFailure::WriteRejected)),
            WriteOutcome::Failed(status) => {
                // The write always completes before the first read is issued.
                debug_assert!(!self.have_read_byte);
                warn!(?status, "write failed, trying next address");
                RequestState::Connecting
            }
        }
    }

    async fn read(&mut self) -> RequestState {
        let Some(endpoint) = self.endpoint.as_mut() else {
            return RequestState::Connecting;
        };
        let event = endpoint.read(self.deadline).await;

        for slice in &event.slices {
            if slice.is_empty() {
                continue;
            }
            self.have_read_byte = true;
            if let Err(e) = self.parser.parse(slice) {
                return RequestState::Done(Err(e.into()));
            }
        }

        match event.status {
            EndpointStatus::Ok => RequestState::Reading,
            status if !self.have_read_byte => {
                warn!(?status, "connection ended before any response, trying next address");
                RequestState::Connecting
            }
            status => {
                debug!(?status, "response stream ended");
                if self.parser.is_end_of_stream_valid() {
                    RequestState::Done(Ok(()))
                } else {
                    RequestState::Done(Err(RequestFailure::IncompleteResponse))
                }
            }
        }
    }

    fn finish(self, outcome: Result<(), RequestFailure>) {
        let InFlightRequest {
            client,
            request_text,
            parser,
            addresses,
            endpoint,
            host,
            on_response,
            ..
        } = self;

        let response = match outcome {
            Ok(()) => {
                let response = parser.into_response();
                info!(status = response.status, bytes = response.body.len(), "request complete");
                Some(response)
            }
            Err(e) => {
                warn!(error = %e, "request failed");
                drop(parser);
                None
            }
        };

        on_response(response.as_ref());

        drop(response);
        drop(addresses);
        if let Some(mut endpoint) = endpoint {
            endpoint.shutdown();
        }
        drop(request_text);
        drop(host);
        drop(client);
    }
}
