//! `std::net` backend
//!
//! The operating system resolves link-layer addresses and delivers frames
//! on its own, so ARP is a formality and device polling does nothing.

use std::io::ErrorKind;
use std::net::{SocketAddr as StdSocketAddr, UdpSocket};

use dcload_hal::{ArpError, DatagramSocket, Ipv4Addr, MacAddr, NetError, NetStack, SocketAddr};
use log::{debug, trace};

/// UDP endpoint backed by a [`UdpSocket`]
///
/// Created unbound; the socket itself is opened by [`DatagramSocket::bind`].
#[derive(Debug)]
pub struct UdpEndpoint {
    local: Ipv4Addr,
    socket: Option<UdpSocket>,
}

impl UdpEndpoint {
    /// An unbound endpoint that will bind on `local`
    pub fn new(local: Ipv4Addr) -> Self {
        Self {
            local,
            socket: None,
        }
    }

    /// Local address, once bound
    pub fn local_addr(&self) -> Option<StdSocketAddr> {
        self.socket.as_ref()?.local_addr().ok()
    }

    fn socket(&self) -> Result<&UdpSocket, NetError> {
        self.socket.as_ref().ok_or(NetError::Closed)
    }
}

fn io_error(e: std::io::Error) -> NetError {
    trace!("socket error: {}", e);
    match e.kind() {
        ErrorKind::NotConnected | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => {
            NetError::Closed
        }
        _ => NetError::Io,
    }
}

impl DatagramSocket for UdpEndpoint {
    fn bind(&mut self, port: u16) -> Result<(), NetError> {
        let socket = UdpSocket::bind((self.local, port)).map_err(|e| {
            debug!("bind {}:{} failed: {}", self.local, port, e);
            NetError::Bind
        })?;
        self.socket = Some(socket);
        Ok(())
    }

    fn connect(&mut self, remote: SocketAddr) -> Result<(), NetError> {
        self.socket()?
            .connect(remote)
            .map_err(|_| NetError::Connect)
    }

    fn send(&mut self, data: &[u8]) -> Result<usize, NetError> {
        self.socket()?.send(data).map_err(|e| {
            debug!("send failed: {}", e);
            NetError::Send
        })
    }

    fn recv_blocking(&mut self, buf: &mut [u8]) -> Result<usize, NetError> {
        let socket = self.socket()?;
        socket.set_nonblocking(false).map_err(io_error)?;
        socket.recv(buf).map_err(io_error)
    }

    fn try_recv(&mut self, buf: &mut [u8]) -> Result<Option<usize>, NetError> {
        let socket = self.socket()?;
        socket.set_nonblocking(true).map_err(io_error)?;
        match socket.recv(buf) {
            Ok(len) => Ok(Some(len)),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(io_error(e)),
        }
    }

    fn poll_device(&mut self) {
        std::thread::yield_now();
    }

    fn close(&mut self) {
        self.socket = None;
    }
}

/// Network stack of the host operating system
#[derive(Debug, Clone)]
pub struct UdpNet {
    local: Ipv4Addr,
}

impl UdpNet {
    /// Bind client sockets on `local`
    pub fn new(local: Ipv4Addr) -> Self {
        Self { local }
    }
}

impl Default for UdpNet {
    fn default() -> Self {
        Self::new(Ipv4Addr::UNSPECIFIED)
    }
}

impl NetStack for UdpNet {
    type Socket = UdpEndpoint;

    fn has_default_interface(&self) -> bool {
        true
    }

    fn arp_lookup(&mut self, _ip: Ipv4Addr) -> Result<MacAddr, ArpError> {
        Ok([0; 6])
    }

    fn arp_insert_permanent(&mut self, ip: Ipv4Addr, _mac: MacAddr) {
        debug!("link-layer resolution of {} left to the OS", ip);
    }

    fn udp_socket(&mut self) -> Result<UdpEndpoint, NetError> {
        Ok(UdpEndpoint::new(self.local))
    }
}
