//! Framing-only protector.
//!
//! Wire format per frame: a 4-byte little-endian length that counts the
//! header itself, followed by the payload. Nothing is encrypted; the
//! protector exists so that the secure endpoint can be exercised end to end
//! without a handshake.

use bytes::{Buf, BufMut, BytesMut};

use crate::security::protector::{Flushed, FrameProtector, Processed, ProtectorError};

pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024;
const FRAME_HEADER_SIZE: usize = 4;

#[derive(Debug)]
pub struct FakeFrameProtector {
    max_frame_size: usize,
    frame: BytesMut,
    sealed: BytesMut,
    incoming: BytesMut,
    decoded: BytesMut,
}

impl Default for FakeFrameProtector {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeFrameProtector {
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        let max_frame_size = max_frame_size.max(FRAME_HEADER_SIZE + 1);
        Self {
            max_frame_size,
            frame: BytesMut::with_capacity(max_frame_size - FRAME_HEADER_SIZE),
            sealed: BytesMut::new(),
            incoming: BytesMut::new(),
            decoded: BytesMut::new(),
        }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    fn max_payload(&self) -> usize {
        self.max_frame_size - FRAME_HEADER_SIZE
    }

    fn seal(&mut self) {
        if self.frame.is_empty() {
            return;
        }
        self.sealed.put_u32_le((self.frame.len() + FRAME_HEADER_SIZE) as u32);
        self.sealed.extend_from_slice(&self.frame);
        self.frame.clear();
    }

    fn decode_frames(&mut self) -> Result<(), ProtectorError> {
        while self.incoming.len() >= FRAME_HEADER_SIZE {
            let mut header = &self.incoming[..FRAME_HEADER_SIZE];
            let frame_len = header.get_u32_le() as usize;
            if frame_len < FRAME_HEADER_SIZE || frame_len > self.max_frame_size {
                return Err(ProtectorError::CorruptFrame(format!(
                    "frame length {frame_len} outside 4..={}",
                    self.max_frame_size
                )));
            }
            if self.incoming.len() < frame_len {
                break;
            }
            self.incoming.advance(FRAME_HEADER_SIZE);
            let payload = self.incoming.split_to(frame_len - FRAME_HEADER_SIZE);
            self.decoded.extend_from_slice(&payload);
        }
        Ok(())
    }
}

fn drain(src: &mut BytesMut, out: &mut [u8]) -> usize {
    let n = src.len().min(out.len());
    out[..n].copy_from_slice(&src[..n]);
    src.advance(n);
    n
}

impl FrameProtector for FakeFrameProtector {
    fn protect(&mut self, unprotected: &[u8], protected: &mut [u8]) -> Result<Processed, ProtectorError> {
        let room = self.max_payload() - self.frame.len();
        let consumed = room.min(unprotected.len());
        self.frame.extend_from_slice(&unprotected[..consumed]);
        if self.frame.len() == self.max_payload() {
            self.seal();
        }
        let produced = drain(&mut self.sealed, protected);
        Ok(Processed { consumed, produced })
    }

    fn protect_flush(&mut self, protected: &mut [u8]) -> Result<Flushed, ProtectorError> {
        self.seal();
        let produced = drain(&mut self.sealed, protected);
        Ok(Flushed {
            produced,
            still_pending: self.sealed.len(),
        })
    }

    fn unprotect(&mut self, protected: &[u8], unprotected: &mut [u8]) -> Result<Processed, ProtectorError> {
        let mut produced = drain(&mut self.decoded, unprotected);
        self.incoming.extend_from_slice(protected);
        self.decode_frames()?;
        produced += drain(&mut self.decoded, &mut unprotected[produced..]);
        Ok(Processed {
            consumed: protected.len(),
            produced,
        })
    }
}
