//! Non-blocking UDP socket used by the controller.
//!
//! Thin wrapper around [`mio::net::UdpSocket`]. The controller never registers
//! it with a `mio::Poll`; it polls by calling the `try_*` methods once per loop
//! iteration and sleeps in between.

use std::io::{self, ErrorKind};
use std::os::fd::AsFd;

use mio::net::UdpSocket as MioUdpSocket;

use super::Endpoint;

/// A bound, non-blocking UDP socket.
pub struct UdpSocket {
    inner: MioUdpSocket,
}

impl UdpSocket {
    /// Binds a non-blocking socket to `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is unavailable or already in use.
    pub fn bind(endpoint: Endpoint) -> io::Result<Self> {
        let inner = MioUdpSocket::bind(endpoint.into())?;
        Ok(Self { inner })
    }

    /// Returns the local address this socket is bound to.
    ///
    /// # Errors
    ///
    /// Returns an error if the local address cannot be retrieved.
    pub fn local_addr(&self) -> io::Result<Endpoint> {
        self.inner.local_addr().map(Endpoint::from)
    }

    /// Sends one datagram to `dest`, returning `Ok(None)` instead of `WouldBlock`.
    ///
    /// # Errors
    ///
    /// Returns any I/O error other than `WouldBlock`.
    pub fn try_send_to(&self, buf: &[u8], dest: Endpoint) -> io::Result<Option<usize>> {
        match self.inner.send_to(buf, dest.into()) {
            Ok(n) => Ok(Some(n)),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Receives one datagram, returning `Ok(None)` instead of `WouldBlock`.
    ///
    /// A datagram longer than `buf` is truncated by the kernel; callers that
    /// need to detect oversize datagrams should pass a buffer at least one
    /// byte longer than the largest valid one.
    ///
    /// # Errors
    ///
    /// Returns any I/O error other than `WouldBlock`.
    pub fn try_recv_from(&self, buf: &mut [u8]) -> io::Result<Option<(usize, Endpoint)>> {
        match self.inner.recv_from(buf) {
            Ok((n, addr)) => Ok(Some((n, Endpoint::from(addr)))),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Sets the kernel receive buffer size (`SO_RCVBUF`).
    ///
    /// # Errors
    ///
    /// Returns an error if the option cannot be set.
    pub fn set_recv_buffer_size(&self, size: usize) -> io::Result<()> {
        // mio doesn't expose socket options
        rustix::net::sockopt::set_socket_recv_buffer_size(self.inner.as_fd(), size)?;
        Ok(())
    }

    /// Gets the kernel receive buffer size.
    ///
    /// # Errors
    ///
    /// Returns an error if the option cannot be read.
    pub fn recv_buffer_size(&self) -> io::Result<usize> {
        Ok(rustix::net::sockopt::get_socket_recv_buffer_size(
            self.inner.as_fd(),
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_assigns_ephemeral_port() {
        let socket = UdpSocket::bind(Endpoint::localhost(0)).unwrap();
        let addr = socket.local_addr().unwrap();
        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);
    }

    #[test]
    fn try_recv_on_empty_socket_is_none() {
        let socket = UdpSocket::bind(Endpoint::localhost(0)).unwrap();
        let mut buf = [0u8; 16];
        assert!(socket.try_recv_from(&mut buf).unwrap().is_none());
    }

    #[test]
    fn send_recv_loopback() {
        let sender = UdpSocket::bind(Endpoint::localhost(0)).unwrap();
        let receiver = UdpSocket::bind(Endpoint::localhost(0)).unwrap();
        let to = receiver.local_addr().unwrap();

        let sent = sender.try_send_to(b"ping", to).unwrap();
        assert_eq!(sent, Some(4));

        let mut buf = [0u8; 16];
        let mut got = None;
        for _ in 0..1000 {
            got = receiver.try_recv_from(&mut buf).unwrap();
            if got.is_some() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        let (n, from) = got.expect("datagram should arrive on loopback");
        assert_eq!(&buf[..n], b"ping");
        assert_eq!(from, sender.local_addr().unwrap());
    }

    #[test]
    fn oversize_datagram_is_truncated_to_buffer() {
        let sender = UdpSocket::bind(Endpoint::localhost(0)).unwrap();
        let receiver = UdpSocket::bind(Endpoint::localhost(0)).unwrap();
        let to = receiver.local_addr().unwrap();

        sender.try_send_to(&[7u8; 32], to).unwrap();

        let mut buf = [0u8; 8];
        let mut got = None;
        for _ in 0..1000 {
            got = receiver.try_recv_from(&mut buf).unwrap();
            if got.is_some() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        let (n, _) = got.expect("datagram should arrive on loopback");
        assert_eq!(n, buf.len());
    }

    #[test]
    fn recv_buffer_size_roundtrip() {
        let socket = UdpSocket::bind(Endpoint::localhost(0)).unwrap();
        socket.set_recv_buffer_size(64 * 1024).unwrap();
        // Linux doubles the requested value for bookkeeping
        assert!(socket.recv_buffer_size().unwrap() >= 64 * 1024);
    }
}
