//! Network abstractions
//!
//! Provides the datagram endpoint the protocol runs over and the few link
//! layer operations needed to reach the host before the first packet.

pub use core::net::{Ipv4Addr, SocketAddrV4 as SocketAddr};

/// Hardware (MAC) address
pub type MacAddr = [u8; 6];

/// Errors from socket operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NetError {
    /// No usable network interface
    NoInterface,
    /// Socket could not be created
    Socket,
    /// Local address could not be bound
    Bind,
    /// Remote address could not be set
    Connect,
    /// Datagram could not be sent
    Send,
    /// Endpoint was closed
    Closed,
    /// Any other I/O failure
    Io,
}

/// Result of a link-layer address lookup that did not produce an address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ArpError {
    /// A request is outstanding; ask again
    InProgress,
    /// No entry yet; a request has been queued
    NotResolved,
    /// Lookup cannot succeed
    Failed,
}

/// Connected datagram endpoint
///
/// Sockets are created unbound by [`NetStack::udp_socket`]; the client binds
/// the local port and fixes the remote peer before use.
pub trait DatagramSocket {
    /// Bind the local port
    fn bind(&mut self, port: u16) -> Result<(), NetError>;

    /// Fix the remote peer for `send` and filter `recv` to it
    fn connect(&mut self, remote: SocketAddr) -> Result<(), NetError>;

    /// Send one datagram
    fn send(&mut self, data: &[u8]) -> Result<usize, NetError>;

    /// Receive one datagram, waiting for it
    ///
    /// Returns the datagram length. An error is a hard failure (e.g. the
    /// endpoint was closed), not a timeout.
    fn recv_blocking(&mut self, buf: &mut [u8]) -> Result<usize, NetError>;

    /// Receive one datagram if one is queued
    ///
    /// Returns `Ok(None)` when nothing is available. Must not block, so it is
    /// usable where the receive interrupt cannot fire.
    fn try_recv(&mut self, buf: &mut [u8]) -> Result<Option<usize>, NetError>;

    /// Let the network device process at most one received frame
    ///
    /// Used together with [`DatagramSocket::try_recv`] when interrupts are
    /// unavailable and received frames would otherwise never be delivered.
    fn poll_device(&mut self);

    /// Release the endpoint
    fn close(&mut self);
}

/// Network stack operations used during connection setup
pub trait NetStack {
    /// Socket type produced by this stack
    type Socket: DatagramSocket;

    /// Whether a default interface is configured
    fn has_default_interface(&self) -> bool;

    /// Look up the hardware address for `ip`
    fn arp_lookup(&mut self, ip: Ipv4Addr) -> Result<MacAddr, ArpError>;

    /// Insert a resolution that never expires
    fn arp_insert_permanent(&mut self, ip: Ipv4Addr, mac: MacAddr);

    /// Create an unbound UDP socket
    fn udp_socket(&mut self) -> Result<Self::Socket, NetError>;
}
