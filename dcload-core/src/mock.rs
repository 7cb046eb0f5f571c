//! Scripted host for unit tests
//!
//! The host side of every exchange is queued up front: the receive calls
//! replay the queue in order and report the endpoint closed once it runs
//! dry. Everything the client sends is recorded.

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::vec::Vec;

use dcload_hal::{
    ArpError, DatagramSocket, Ipv4Addr, MacAddr, NetError, NetStack, SocketAddr,
};
use dcload_protocol::{encode_addressed, Command, BLOCK_SIZE, PACKET_BUF_SIZE};

#[derive(Debug, Default)]
pub struct MockSocket {
    pub inbox: VecDeque<Vec<u8>>,
    pub sent: Vec<Vec<u8>>,
    pub bound: Option<u16>,
    pub remote: Option<SocketAddr>,
    pub closed: bool,
    /// Shared copy of `closed`, readable after the socket is gone
    pub released: Rc<Cell<bool>>,
    pub fail_send: bool,
    pub fail_bind: bool,
    pub fail_connect: bool,
    /// Empty polls to report before the queue is consulted
    pub idle_polls: usize,
    pub device_polls: usize,
    pub blocking_recvs: usize,
}

impl MockSocket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, datagram: &[u8]) {
        self.inbox.push_back(datagram.to_vec());
    }

    pub fn push_addressed(&mut self, command: Command, address: u32, size: u32, data: &[u8]) {
        let mut buf = [0u8; PACKET_BUF_SIZE];
        let len = encode_addressed(&mut buf, command, address, size, data).unwrap();
        self.push(&buf[..len]);
    }

    pub fn push_retv(&mut self, value: i32) {
        self.push_addressed(Command::ReturnValue, value as u32, 0, &[]);
    }

    /// Queue a complete host-to-client transfer of `data` to `address`
    pub fn push_download(&mut self, address: u32, data: &[u8]) {
        self.push_addressed(Command::LoadBinary, address, data.len() as u32, &[]);
        let mut offset = 0u32;
        for chunk in data.chunks(BLOCK_SIZE) {
            self.push_addressed(Command::PutBinary, address + offset, chunk.len() as u32, chunk);
            offset += chunk.len() as u32;
        }
        self.push_addressed(Command::DoneBinary, 0, 0, &[]);
    }

    /// Requests sent by the client, without the replies it sent the host
    pub fn requests(&self) -> Vec<&[u8]> {
        self.sent
            .iter()
            .filter(|p| p.starts_with(b"DC") || p.starts_with(b"DD"))
            .map(|p| &p[..])
            .collect()
    }

    /// Tags of every datagram sent, in order
    pub fn sent_tags(&self) -> Vec<[u8; 4]> {
        self.sent
            .iter()
            .map(|p| [p[0], p[1], p[2], p[3]])
            .collect()
    }
}

impl DatagramSocket for MockSocket {
    fn bind(&mut self, port: u16) -> Result<(), NetError> {
        if self.fail_bind {
            return Err(NetError::Bind);
        }
        self.bound = Some(port);
        Ok(())
    }

    fn connect(&mut self, remote: SocketAddr) -> Result<(), NetError> {
        if self.fail_connect {
            return Err(NetError::Connect);
        }
        self.remote = Some(remote);
        Ok(())
    }

    fn send(&mut self, data: &[u8]) -> Result<usize, NetError> {
        if self.fail_send {
            return Err(NetError::Send);
        }
        self.sent.push(data.to_vec());
        Ok(data.len())
    }

    fn recv_blocking(&mut self, buf: &mut [u8]) -> Result<usize, NetError> {
        self.blocking_recvs += 1;
        let datagram = self.inbox.pop_front().ok_or(NetError::Closed)?;
        buf[..datagram.len()].copy_from_slice(&datagram);
        Ok(datagram.len())
    }

    fn try_recv(&mut self, buf: &mut [u8]) -> Result<Option<usize>, NetError> {
        if self.idle_polls > 0 {
            self.idle_polls -= 1;
            return Ok(None);
        }
        let datagram = self.inbox.pop_front().ok_or(NetError::Closed)?;
        buf[..datagram.len()].copy_from_slice(&datagram);
        Ok(Some(datagram.len()))
    }

    fn poll_device(&mut self) {
        self.device_polls += 1;
    }

    fn close(&mut self) {
        self.closed = true;
        self.released.set(true);
    }
}

/// Network stack handing out one prepared socket
#[derive(Debug, Default)]
pub struct MockNet {
    pub interface: bool,
    pub socket: Option<MockSocket>,
    /// Lookups that report "in progress" before resolving
    pub arp_pending: usize,
    pub arp_fails: bool,
    pub arp_lookups: usize,
    pub permanent: Vec<(Ipv4Addr, MacAddr)>,
}

pub const HOST_MAC: MacAddr = [0x02, 0, 0, 0, 0, 0x01];

impl MockNet {
    pub fn with_socket(socket: MockSocket) -> Self {
        Self {
            interface: true,
            socket: Some(socket),
            ..Default::default()
        }
    }
}

impl NetStack for MockNet {
    type Socket = MockSocket;

    fn has_default_interface(&self) -> bool {
        self.interface
    }

    fn arp_lookup(&mut self, _ip: Ipv4Addr) -> Result<MacAddr, ArpError> {
        self.arp_lookups += 1;
        if self.arp_fails {
            return Err(ArpError::Failed);
        }
        if self.arp_pending > 0 {
            self.arp_pending -= 1;
            return Err(ArpError::InProgress);
        }
        Ok(HOST_MAC)
    }

    fn arp_insert_permanent(&mut self, ip: Ipv4Addr, mac: MacAddr) {
        self.permanent.push((ip, mac));
    }

    fn udp_socket(&mut self) -> Result<MockSocket, NetError> {
        self.socket.take().ok_or(NetError::Socket)
    }
}
