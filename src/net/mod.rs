//! Address resolution, connection establishment and socket helpers.

pub mod connect;
pub mod resolve;
#[cfg(unix)]
pub mod socket_utils;

pub use connect::{Connector, TcpConnector};
pub use resolve::{DnsResolver, ResolvedAddresses, Resolver};
