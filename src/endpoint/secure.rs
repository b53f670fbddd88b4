//! Endpoint that protects every byte with a pair of frame protectors.
//!
//! Outbound slices are run through the write protector into an 8 KiB staging
//! buffer; every time the staging buffer fills it is split off as one
//! ciphertext slice, and the whole batch goes to the inner endpoint in a
//! single write. Inbound ciphertext is unprotected the same way.
//!
//! Plaintext read off the connection before the wrapper existed (for example
//! application data that arrived together with the last handshake message)
//! is passed in as `leftover` and handed to the first reader as-is, ahead of
//! anything decrypted later.

use std::collections::VecDeque;
use std::net::SocketAddr;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::time::Instant;
use tracing::{trace, warn};

use crate::endpoint::{Endpoint, EndpointStatus, ReadEvent, WriteOutcome};
use crate::security::protector::{FrameProtector, ProtectorError};

pub const STAGING_BUFFER_SIZE: usize = 8192;

pub struct SecureEndpoint {
    inner: Box<dyn Endpoint>,
    read_protector: Box<dyn FrameProtector>,
    write_protector: Box<dyn FrameProtector>,
    leftover: VecDeque<Bytes>,
}

/// Fixed-size scratch area that is split off into output slices as it fills.
struct Staging {
    buf: BytesMut,
    used: usize,
    out: Vec<Bytes>,
}

impl Staging {
    fn new() -> Self {
        Self {
            buf: BytesMut::zeroed(STAGING_BUFFER_SIZE),
            used: 0,
            out: Vec::new(),
        }
    }

    fn spare(&mut self) -> &mut [u8] {
        &mut self.buf[self.used..]
    }

    fn advance(&mut self, n: usize) {
        self.used += n;
        if self.used == STAGING_BUFFER_SIZE {
            self.split();
        }
    }

    fn split(&mut self) {
        if self.used == 0 {
            return;
        }
        self.out.push(self.buf.split_to(self.used).freeze());
        self.buf = BytesMut::zeroed(STAGING_BUFFER_SIZE);
        self.used = 0;
    }

    fn finish(mut self) -> Vec<Bytes> {
        self.split();
        self.out
    }
}

impl SecureEndpoint {
    pub fn new(
        inner: Box<dyn Endpoint>,
        read_protector: Box<dyn FrameProtector>,
        write_protector: Box<dyn FrameProtector>,
        leftover: Vec<Bytes>,
    ) -> Self {
        Self {
            inner,
            read_protector,
            write_protector,
            leftover: leftover.into_iter().filter(|s| !s.is_empty()).collect(),
        }
    }

    fn protect(&mut self, slices: &[Bytes]) -> Result<Vec<Bytes>, ProtectorError> {
        let mut staging = Staging::new();

        for slice in slices {
            let mut rest = &slice[..];
            while !rest.is_empty() {
                let step = self.write_protector.protect(rest, staging.spare())?;
                if step.consumed == 0 && step.produced == 0 {
                    return Err(ProtectorError::Stalled);
                }
                rest = &rest[step.consumed..];
                staging.advance(step.produced);
            }
        }

        loop {
            let step = self.write_protector.protect_flush(staging.spare())?;
            staging.advance(step.produced);
            if step.still_pending == 0 {
                break;
            }
            if step.produced == 0 {
                return Err(ProtectorError::Stalled);
            }
        }

        Ok(staging.finish())
    }

    fn unprotect(&mut self, slices: &[Bytes]) -> Result<Vec<Bytes>, ProtectorError> {
        let mut staging = Staging::new();

        for slice in slices {
            let mut rest = &slice[..];
            let mut keep_looping = false;
            while !rest.is_empty() || keep_looping {
                let step = self.read_protector.unprotect(rest, staging.spare())?;
                if !rest.is_empty() && step.consumed == 0 && step.produced == 0 {
                    return Err(ProtectorError::Stalled);
                }
                rest = &rest[step.consumed..];
                staging.advance(step.produced);
                // Output may be waiting inside the protector even once the
                // input is gone; keep draining until a call produces nothing.
                keep_looping = step.produced > 0;
            }
        }

        Ok(staging.finish())
    }
}

#[async_trait]
impl Endpoint for SecureEndpoint {
    async fn read(&mut self, deadline: Instant) -> ReadEvent {
        if !self.leftover.is_empty() {
            let slices: Vec<Bytes> = self.leftover.drain(..).collect();
            trace!(slices = slices.len(), "delivering leftover plaintext");
            return ReadEvent::new(slices, EndpointStatus::Ok);
        }

        let event = self.inner.read(deadline).await;
        if event.slices.is_empty() {
            return event;
        }

        match self.unprotect(&event.slices) {
            Ok(plain) => ReadEvent::new(plain, event.status),
            Err(e) => {
                warn!(error = %e, peer = ?self.inner.peer(), "failed to unprotect inbound frames");
                ReadEvent::status(EndpointStatus::Error)
            }
        }
    }

    async fn write(&mut self, slices: Vec<Bytes>, deadline: Instant) -> WriteOutcome {
        let protected = match self.protect(&slices) {
            Ok(protected) => protected,
            Err(e) => {
                warn!(error = %e, peer = ?self.inner.peer(), "failed to protect outbound frames");
                return WriteOutcome::Rejected;
            }
        };
        drop(slices);

        if protected.is_empty() {
            return WriteOutcome::Done;
        }
        self.inner.write(protected, deadline).await
    }

    fn shutdown(&mut self) {
        self.inner.shutdown();
    }

    fn peer(&self) -> Option<SocketAddr> {
        self.inner.peer()
    }
}

impl Drop for SecureEndpoint {
    fn drop(&mut self) {
        self.inner.shutdown();
        if !self.leftover.is_empty() {
            trace!(slices = self.leftover.len(), "discarding unread leftover plaintext");
        }
    }
}
