//! Descriptor flag helpers for accepted sockets.
//!
//! A failing `fcntl` on a descriptor we just received from `accept` means the
//! process state is corrupt, so these helpers panic instead of returning an
//! error.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd};

/// Sets `O_NONBLOCK` and/or `FD_CLOEXEC` on `fd`.
///
/// # Panics
///
/// Panics if any `fcntl` call fails.
pub fn set_socket_flags(fd: BorrowedFd<'_>, nonblock: bool, cloexec: bool) {
    let raw = fd.as_raw_fd();

    if nonblock {
        // SAFETY: `raw` comes from a live BorrowedFd.
        let flags = unsafe { libc::fcntl(raw, libc::F_GETFL) };
        assert!(flags >= 0, "F_GETFL failed on fd {raw}: {}", io::Error::last_os_error());
        let rc = unsafe { libc::fcntl(raw, libc::F_SETFL, flags | libc::O_NONBLOCK) };
        assert!(rc == 0, "F_SETFL failed on fd {raw}: {}", io::Error::last_os_error());
    }

    if cloexec {
        // SAFETY: `raw` comes from a live BorrowedFd.
        let flags = unsafe { libc::fcntl(raw, libc::F_GETFD) };
        assert!(flags >= 0, "F_GETFD failed on fd {raw}: {}", io::Error::last_os_error());
        let rc = unsafe { libc::fcntl(raw, libc::F_SETFD, flags | libc::FD_CLOEXEC) };
        assert!(rc == 0, "F_SETFD failed on fd {raw}: {}", io::Error::last_os_error());
    }
}

/// Accepts one connection and applies the requested descriptor flags.
pub fn accept4(
    listener: &TcpListener,
    nonblock: bool,
    cloexec: bool,
) -> io::Result<(TcpStream, SocketAddr)> {
    let (stream, peer) = listener.accept()?;
    set_socket_flags(stream.as_fd(), nonblock, cloexec);
    Ok((stream, peer))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fd_flags(stream: &TcpStream) -> (i32, i32) {
        let raw = stream.as_raw_fd();
        unsafe { (libc::fcntl(raw, libc::F_GETFL), libc::fcntl(raw, libc::F_GETFD)) }
    }

    #[test]
    fn accept4_sets_nonblocking_and_cloexec() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let _client = TcpStream::connect(addr).unwrap();

        let (stream, peer) = accept4(&listener, true, true).unwrap();
        assert_eq!(peer, _client.local_addr().unwrap());

        let (fl, fd) = fd_flags(&stream);
        assert_ne!(fl & libc::O_NONBLOCK, 0);
        assert_ne!(fd & libc::FD_CLOEXEC, 0);
    }

    #[test]
    fn flags_are_left_alone_when_not_requested() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let _client = TcpStream::connect(addr).unwrap();

        let (stream, _) = accept4(&listener, false, false).unwrap();
        let (fl, _) = fd_flags(&stream);
        assert_eq!(fl & libc::O_NONBLOCK, 0);

        set_socket_flags(stream.as_fd(), true, false);
        let (fl, _) = fd_flags(&stream);
        assert_ne!(fl & libc::O_NONBLOCK, 0);
    }
}
