//! UDP transport primitives for the control loop.
//!
//! The loop talks to exactly one simulator peer through one non-blocking
//! socket. `WouldBlock` is folded into `Ok(None)` here so the loop only ever
//! sees real errors.

pub mod endpoint;
pub mod socket;

pub use endpoint::Endpoint;
pub use socket::UdpSocket;
