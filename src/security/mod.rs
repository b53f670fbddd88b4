//! Secure transport: frame protectors, trust roots and the TLS handshake.
//!
//! - **`protector`**: the [`FrameProtector`] capability used by
//!   [`SecureEndpoint`](crate::endpoint::SecureEndpoint)
//! - **`fake`**: framing-only protector for tests and loopback
//! - **`roots`**: the process-wide trusted root bundle
//! - **`tls`**: rustls handshake over an arbitrary endpoint

pub mod fake;
pub mod protector;
pub mod roots;
pub mod tls;

use thiserror::Error;

pub use fake::FakeFrameProtector;
pub use protector::{Flushed, FrameProtector, Processed, ProtectorError};
pub use roots::TrustedRoots;
pub use tls::{SecureTransportSetup, SecurityContext, TlsFrameProtector, TlsTransportSetup};

#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("invalid trust roots: {0}")]
    InvalidRoots(String),

    #[error("invalid server name {0:?}")]
    InvalidHost(String),

    #[error("handshake failed: {0}")]
    Handshake(String),
}
