use std::net::SocketAddr;

use async_trait::async_trait;
use tracing::{debug, warn};

/// Ordered candidate addresses for one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAddresses {
    addrs: Vec<SocketAddr>,
}

impl ResolvedAddresses {
    pub fn new(addrs: Vec<SocketAddr>) -> Self {
        Self { addrs }
    }

    pub fn len(&self) -> usize {
        self.addrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<SocketAddr> {
        self.addrs.get(index).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SocketAddr> {
        self.addrs.iter()
    }
}

/// Resolves `name` (`host` or `host:port`) to candidate addresses.
///
/// `default_service` supplies the port when `name` carries none. `None`
/// means resolution failed or produced no addresses.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, name: &str, default_service: &str) -> Option<ResolvedAddresses>;
}

/// Splits `host`, `host:port`, `[v6]` or `[v6]:port`.
///
/// A bare IPv6 literal (more than one colon, no brackets) is returned whole
/// with no port.
pub fn split_host_port(name: &str) -> Option<(&str, Option<&str>)> {
    if let Some(rest) = name.strip_prefix('[') {
        let (host, tail) = rest.split_once(']')?;
        if host.is_empty() {
            return None;
        }
        return match tail {
            "" => Some((host, None)),
            _ => tail.strip_prefix(':').map(|port| (host, Some(port))),
        };
    }

    if name.is_empty() {
        return None;
    }

    match name.matches(':').count() {
        0 => Some((name, None)),
        1 => {
            let (host, port) = name.split_once(':')?;
            if host.is_empty() {
                return None;
            }
            Some((host, Some(port)))
        }
        _ => Some((name, None)),
    }
}

/// Maps a service name or numeric string to a port.
pub fn service_port(service: &str) -> Option<u16> {
    match service {
        "http" => Some(80),
        "https" => Some(443),
        other => other.parse().ok(),
    }
}

/// System resolver backed by `tokio::net::lookup_host`.
#[derive(Debug, Clone, Default)]
pub struct DnsResolver;

impl DnsResolver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Resolver for DnsResolver {
    async fn resolve(&self, name: &str, default_service: &str) -> Option<ResolvedAddresses> {
        let Some((host, port)) = split_host_port(name) else {
            warn!(name, "unparseable host name");
            return None;
        };
        let Some(port) = service_port(port.unwrap_or(default_service)) else {
            warn!(name, default_service, "unknown service");
            return None;
        };

        match tokio::net::lookup_host((host, port)).await {
            Ok(addrs) => {
                let addrs: Vec<SocketAddr> = addrs.collect();
                debug!(name, count = addrs.len(), "resolved");
                if addrs.is_empty() {
                    None
                } else {
                    Some(ResolvedAddresses::new(addrs))
                }
            }
            Err(e) => {
                debug!(name, error = %e, "resolution failed");
                None
            }
        }
    }
}
