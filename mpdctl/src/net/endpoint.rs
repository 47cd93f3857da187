//! Peer and bind addresses.

use std::fmt;
use std::net::{AddrParseError, IpAddr, Ipv4Addr, SocketAddr};

/// An IP address and UDP port.
///
/// Both ends of the controller link are fixed at configuration time, so this is
/// built once from the `*_address`/`*_port` option pairs and copied around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint(SocketAddr);

impl Endpoint {
    #[must_use]
    pub const fn new(addr: IpAddr, port: u16) -> Self {
        Self(SocketAddr::new(addr, port))
    }

    /// Loopback endpoint; the simulator normally runs on the same host.
    #[must_use]
    pub const fn localhost(port: u16) -> Self {
        Self::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    }

    /// Builds an endpoint from a literal IP address string and a port.
    ///
    /// Host names are not resolved.
    ///
    /// # Errors
    ///
    /// Returns an error if `address` is not an IPv4 or IPv6 literal.
    pub fn parse(address: &str, port: u16) -> Result<Self, AddrParseError> {
        let ip: IpAddr = address.trim().parse()?;
        Ok(Self::new(ip, port))
    }

    #[must_use]
    pub const fn ip(&self) -> IpAddr {
        self.0.ip()
    }

    #[must_use]
    pub const fn port(&self) -> u16 {
        self.0.port()
    }

    #[must_use]
    pub const fn as_socket_addr(&self) -> SocketAddr {
        self.0
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Self(addr)
    }
}

impl From<Endpoint> for SocketAddr {
    fn from(ep: Endpoint) -> Self {
        ep.0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_v4_literal() {
        let ep = Endpoint::parse("127.0.0.1", 65000).unwrap();
        assert_eq!(ep, Endpoint::localhost(65000));
        assert_eq!(ep.port(), 65000);
    }

    #[test]
    fn parse_trims_whitespace() {
        let ep = Endpoint::parse(" 10.0.0.7 ", 65008).unwrap();
        assert_eq!(ep.ip(), IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7)));
    }

    #[test]
    fn parse_v6_literal() {
        let ep = Endpoint::parse("::1", 9000).unwrap();
        assert!(ep.ip().is_loopback());
    }

    #[test]
    fn parse_rejects_hostname() {
        assert!(Endpoint::parse("localhost", 9000).is_err());
    }

    #[test]
    fn display_matches_socket_addr() {
        let ep = Endpoint::localhost(65008);
        assert_eq!(ep.to_string(), "127.0.0.1:65008");
    }
}
