use thiserror::Error;

/// Errors raised by a [`FrameProtector`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtectorError {
    #[error("corrupt frame: {0}")]
    CorruptFrame(String),

    #[error("protector made no progress")]
    Stalled,

    #[error("secure channel error: {0}")]
    Channel(String),
}

/// Progress reported by [`FrameProtector::protect`] and [`FrameProtector::unprotect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Processed {
    /// Bytes taken from the input.
    pub consumed: usize,
    /// Bytes written to the output.
    pub produced: usize,
}

/// Progress reported by [`FrameProtector::protect_flush`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flushed {
    pub produced: usize,
    /// Non-zero while protected bytes remain buffered inside the protector.
    pub still_pending: usize,
}

/// Turns plaintext into framed wire bytes and back.
///
/// Both directions work on caller-provided output slices. A call may consume
/// only part of its input and may buffer output internally; callers loop
/// until the input is consumed and then drain with [`protect_flush`].
///
/// [`protect_flush`]: FrameProtector::protect_flush
pub trait FrameProtector: Send {
    fn protect(&mut self, unprotected: &[u8], protected: &mut [u8]) -> Result<Processed, ProtectorError>;

    fn protect_flush(&mut self, protected: &mut [u8]) -> Result<Flushed, ProtectorError>;

    fn unprotect(&mut self, protected: &[u8], unprotected: &mut [u8]) -> Result<Processed, ProtectorError>;
}
