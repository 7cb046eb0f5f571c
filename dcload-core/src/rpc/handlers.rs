//! Host-initiated command handlers
//!
//! Invoked from the receive loop for every datagram that arrives while a
//! request is outstanding. A datagram too short for the fields its verb
//! needs is dropped like an unknown one; only socket failures end the loop.

use dcload_hal::{DatagramSocket, NetError};
use dcload_protocol::{
    encode_addressed, Command, Packet, PacketError, PacketWriter, BLOCK_SIZE, PACKET_BUF_SIZE,
};

use super::{Link, Registers};
use crate::memory::TargetMemory;
use crate::transfer::TransferSession;

enum HandlerError {
    /// Datagram lacks a field the verb needs
    Malformed(PacketError),
    /// Reply could not be sent
    Net(NetError),
}

impl From<PacketError> for HandlerError {
    fn from(e: PacketError) -> Self {
        HandlerError::Malformed(e)
    }
}

impl From<NetError> for HandlerError {
    fn from(e: NetError) -> Self {
        HandlerError::Net(e)
    }
}

type Reply = [u8; PACKET_BUF_SIZE];

impl<S: DatagramSocket> Link<S> {
    /// Handle the datagram in the first `len` bytes of the receive buffer
    pub(super) fn dispatch(
        &mut self,
        len: usize,
        memory: &mut dyn TargetMemory,
    ) -> Result<(), NetError> {
        let Link {
            socket,
            tx,
            rx,
            transfer,
            regs,
            ident,
        } = self;

        let Ok(packet) = Packet::parse(&rx[..len]) else {
            trace!("dropping runt datagram ({} bytes)", len);
            return Ok(());
        };

        let result = match packet.command {
            Command::LoadBinary => load_binary(socket, transfer, &packet),
            Command::PutBinary => put_binary(transfer, regs, memory, &packet),
            Command::DoneBinary => done_binary(socket, tx, transfer),
            Command::SendBinary | Command::SendBinaryQuiet => {
                send_binary(socket, tx, regs, memory, &packet)
            }
            Command::ReturnValue => return_value(socket, regs, &packet),
            Command::Version => version(socket, tx, ident, &packet),
            other => {
                trace!("ignoring {:?}", other);
                Ok(())
            }
        };

        match result {
            Ok(()) => Ok(()),
            Err(HandlerError::Malformed(e)) => {
                trace!("dropping malformed {:?}: {:?}", packet.command, e);
                Ok(())
            }
            Err(HandlerError::Net(e)) => {
                warn!("reply to {:?} failed: {:?}", packet.command, e);
                Err(e)
            }
        }
    }
}

/// LBIN: begin a download and acknowledge with the header
fn load_binary<S: DatagramSocket>(
    socket: &mut S,
    transfer: &mut TransferSession,
    packet: &Packet<'_>,
) -> Result<(), HandlerError> {
    let header = packet.header()?;
    let (address, size) = (packet.address()?, packet.size()?);

    transfer.start(address, size);
    debug!("download of {} bytes to {:#x}", size, address);

    socket.send(header)?;
    Ok(())
}

/// PBIN: store one chunk and mark its block
///
/// A chunk the window refuses is discarded, but its block still counts as
/// delivered so the transfer terminates; the request then reports the fault.
fn put_binary(
    transfer: &mut TransferSession,
    regs: &mut Registers,
    memory: &mut dyn TargetMemory,
    packet: &Packet<'_>,
) -> Result<(), HandlerError> {
    let address = packet.address()?;
    let data = packet.data()?;

    if let Err(e) = memory.store(address, data) {
        warn!("host wrote outside window: {:?}", e);
        regs.fault.get_or_insert(e);
    }

    if transfer.mark(address).is_err() {
        trace!("chunk at {:#x} is outside the transfer", address);
    }
    Ok(())
}

/// DBIN: report the next missing block, or `0/0` when complete
fn done_binary<S: DatagramSocket>(
    socket: &mut S,
    tx: &mut Reply,
    transfer: &TransferSession,
) -> Result<(), HandlerError> {
    let (address, size) = match transfer.next_missing() {
        Some(block) => {
            trace!("requesting block at {:#x}", block.address);
            (block.address, block.size)
        }
        None => (0, 0),
    };

    let len = encode_addressed(tx, Command::DoneBinary, address, size, &[])?;
    socket.send(&tx[..len])?;
    Ok(())
}

/// SBIN/SBIQ: upload a region in 1 KiB chunks, then the terminator
fn send_binary<S: DatagramSocket>(
    socket: &mut S,
    tx: &mut Reply,
    regs: &mut Registers,
    memory: &mut dyn TargetMemory,
    packet: &Packet<'_>,
) -> Result<(), HandlerError> {
    let (start, size) = (packet.address()?, packet.size()?);

    match memory.load(start, size) {
        Ok(region) => {
            let mut address = start;
            for chunk in region.chunks(BLOCK_SIZE) {
                let len = encode_addressed(
                    tx,
                    Command::SendBinary,
                    address,
                    chunk.len() as u32,
                    chunk,
                )?;
                socket.send(&tx[..len])?;
                address = address.wrapping_add(chunk.len() as u32);
            }
        }
        Err(e) => {
            warn!("host read outside window: {:?}", e);
            regs.fault.get_or_insert(e);
        }
    }

    let len = encode_addressed(tx, Command::DoneBinary, 0, 0, &[])?;
    socket.send(&tx[..len])?;
    Ok(())
}

/// RETV: acknowledge, latch the result and end the receive loop
fn return_value<S: DatagramSocket>(
    socket: &mut S,
    regs: &mut Registers,
    packet: &Packet<'_>,
) -> Result<(), HandlerError> {
    let header = packet.header()?;
    let value = packet.address()? as i32;

    socket.send(header)?;
    regs.retval = value;
    regs.escape = true;
    Ok(())
}

/// VERS: answer with the header followed by the client identity
fn version<S: DatagramSocket>(
    socket: &mut S,
    tx: &mut Reply,
    ident: &str,
    packet: &Packet<'_>,
) -> Result<(), HandlerError> {
    let header = packet.header()?;

    let mut w = PacketWriter::new(tx, Command::Version)?;
    w.bytes(&header[4..])?.cstr(ident)?;
    let len = w.finish();

    socket.send(&tx[..len])?;
    Ok(())
}
