//! Trusted root certificates used to verify servers during the handshake.
//!
//! The process-wide bundle is built once on first use and never mutated;
//! every handshake receives a cheap clone of the same `Arc`.

use std::sync::{Arc, OnceLock};

use rustls::RootCertStore;
use rustls::pki_types::CertificateDer;
use rustls::pki_types::pem::PemObject;

use crate::security::SecurityError;

static GLOBAL_ROOTS: OnceLock<TrustedRoots> = OnceLock::new();

#[derive(Debug, Clone)]
pub struct TrustedRoots {
    store: Arc<RootCertStore>,
}

impl TrustedRoots {
    /// The built-in bundle (Mozilla's root program via `webpki-roots`).
    pub fn global() -> &'static TrustedRoots {
        GLOBAL_ROOTS.get_or_init(|| {
            let mut store = RootCertStore::empty();
            store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            tracing::debug!(roots = store.len(), "loaded built-in trust roots");
            TrustedRoots {
                store: Arc::new(store),
            }
        })
    }

    /// Builds a bundle from PEM-encoded certificates.
    pub fn from_pem(pem: &[u8]) -> Result<Self, SecurityError> {
        let mut store = RootCertStore::empty();
        for cert in CertificateDer::pem_slice_iter(pem) {
            let cert = cert.map_err(|e| SecurityError::InvalidRoots(e.to_string()))?;
            store
                .add(cert)
                .map_err(|e| SecurityError::InvalidRoots(e.to_string()))?;
        }
        if store.is_empty() {
            return Err(SecurityError::InvalidRoots(
                "no certificates in bundle".to_string(),
            ));
        }
        Ok(Self {
            store: Arc::new(store),
        })
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn store(&self) -> Arc<RootCertStore> {
        Arc::clone(&self.store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_bundle_is_built_once() {
        let a = TrustedRoots::global();
        let b = TrustedRoots::global();
        assert!(!a.is_empty());
        assert!(Arc::ptr_eq(&a.store, &b.store));
    }

    #[test]
    fn empty_pem_is_rejected() {
        let err = TrustedRoots::from_pem(b"").unwrap_err();
        assert!(matches!(err, SecurityError::InvalidRoots(_)));
    }

    #[test]
    fn garbage_certificate_is_rejected() {
        let pem = b"-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n";
        assert!(TrustedRoots::from_pem(pem).is_err());
    }
}
