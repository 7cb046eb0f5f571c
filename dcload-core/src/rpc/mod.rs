//! RPC engine
//!
//! Sends one request and then services host traffic until the host answers
//! with `RETV`. While waiting, the host may drive binary transfers into or out
//! of the request's memory window, ask for the client identity, or send
//! packets this client does not understand (which are dropped).
//!
//! There is no timeout: an unanswered request waits forever. The only ways
//! out of the loop are the terminal response and a hard transport failure.

mod handlers;

use dcload_hal::{DatagramSocket, ExecContext, NetError};
use dcload_protocol::{PacketError, Request, MAX_DATAGRAM, PACKET_BUF_SIZE};
use heapless::String;

use crate::config::MAX_IDENT_LEN;
use crate::memory::{MemoryError, TargetMemory};
use crate::transfer::TransferSession;

/// How the receive loop obtains datagrams
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecvStrategy {
    /// Wait on the socket; the network interrupt delivers frames
    Blocking,
    /// Poll the device for one frame, then try a non-blocking receive
    PollDevice,
}

impl From<ExecContext> for RecvStrategy {
    fn from(context: ExecContext) -> Self {
        match context {
            ExecContext::Thread => RecvStrategy::Blocking,
            ExecContext::Interrupt => RecvStrategy::PollDevice,
        }
    }
}

/// Errors from a request/response exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RpcError {
    /// Request could not be sent or the receive loop ended without a result
    Transport(NetError),
    /// Request did not fit the packet buffer
    Encode(PacketError),
    /// The host touched memory outside the request's window
    Memory(MemoryError),
}

impl From<PacketError> for RpcError {
    fn from(e: PacketError) -> Self {
        RpcError::Encode(e)
    }
}

/// Result register and terminal flag
///
/// Written only by the `RETV` handler (and by handlers recording a memory
/// fault), read once by the engine after the loop ends.
#[derive(Debug, Clone, Copy, Default)]
struct Registers {
    retval: i32,
    escape: bool,
    fault: Option<MemoryError>,
}

/// A connected protocol endpoint
///
/// Owns the socket, the shared send buffer, the receive buffer and the
/// transfer state. Only one request can be in flight per link.
pub struct Link<S> {
    socket: S,
    tx: [u8; PACKET_BUF_SIZE],
    rx: [u8; MAX_DATAGRAM],
    transfer: TransferSession,
    regs: Registers,
    ident: String<MAX_IDENT_LEN>,
}

impl<S: DatagramSocket> Link<S> {
    /// Wrap a connected socket
    ///
    /// `ident` is returned to the host's version query.
    pub fn new(socket: S, ident: &str) -> Self {
        let mut id = String::new();
        if id.push_str(ident).is_err() {
            // Oversized identities are cut at a character boundary
            for c in ident.chars() {
                if id.push(c).is_err() {
                    break;
                }
            }
        }
        Self {
            socket,
            tx: [0; PACKET_BUF_SIZE],
            rx: [0; MAX_DATAGRAM],
            transfer: TransferSession::new(),
            regs: Registers::default(),
            ident: id,
        }
    }

    /// Access the underlying socket
    pub fn socket(&self) -> &S {
        &self.socket
    }

    /// Mutable access to the underlying socket
    pub fn socket_mut(&mut self) -> &mut S {
        &mut self.socket
    }

    /// State of the most recent binary transfer
    pub fn transfer(&self) -> &TransferSession {
        &self.transfer
    }

    /// Release the link and return the socket
    pub fn into_socket(self) -> S {
        self.socket
    }

    /// Encode `request`, send it and wait for its result
    pub fn request(
        &mut self,
        request: &Request<'_>,
        memory: &mut dyn TargetMemory,
        strategy: RecvStrategy,
    ) -> Result<i32, RpcError> {
        let len = request.encode(&mut self.tx)?;
        trace!("-> {:?} ({} bytes)", request.command(), len);
        self.send_and_wait(len, memory, strategy)
    }

    /// Send the first `len` bytes of the send buffer and wait for the result
    pub fn send_and_wait(
        &mut self,
        len: usize,
        memory: &mut dyn TargetMemory,
        strategy: RecvStrategy,
    ) -> Result<i32, RpcError> {
        debug_assert!(!self.regs.escape);
        self.regs.fault = None;

        self.socket
            .send(&self.tx[..len])
            .map_err(RpcError::Transport)?;

        let retval = self
            .receive_loop(memory, strategy)
            .map_err(RpcError::Transport)?;

        match self.regs.fault.take() {
            Some(fault) => Err(RpcError::Memory(fault)),
            None => Ok(retval),
        }
    }

    /// Send a request that the host does not answer
    pub fn notify(&mut self, request: &Request<'_>) -> Result<(), RpcError> {
        let len = request.encode(&mut self.tx)?;
        self.socket
            .send(&self.tx[..len])
            .map_err(RpcError::Transport)?;
        Ok(())
    }

    /// Dispatch datagrams until the terminal response arrives
    fn receive_loop(
        &mut self,
        memory: &mut dyn TargetMemory,
        strategy: RecvStrategy,
    ) -> Result<i32, NetError> {
        while !self.regs.escape {
            let received = match strategy {
                RecvStrategy::Blocking => self.socket.recv_blocking(&mut self.rx).map(Some),
                RecvStrategy::PollDevice => {
                    self.socket.poll_device();
                    self.socket.try_recv(&mut self.rx)
                }
            };

            let len = match received {
                Ok(Some(len)) => len,
                Ok(None) => continue,
                Err(e) => {
                    warn!("receive failed: {:?}", e);
                    return Err(e);
                }
            };

            self.dispatch(len, memory)?;
        }

        self.regs.escape = false;
        Ok(self.regs.retval)
    }
}
