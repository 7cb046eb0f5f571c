//! Packet encoding and decoding for the dcload-ip protocol.
//!
//! Packet format:
//! - TAG (4 bytes): ASCII verb identifier
//! - ADDRESS (4 bytes, big-endian): target address or first integer value
//! - SIZE (4 bytes, big-endian): byte count or second integer value
//! - DATA (0-1024 bytes): chunk payload or NUL-terminated strings
//!
//! Integer packets reuse the same positions for up to three values.

use crate::command::Command;

/// Length of a command tag
pub const TAG_LEN: usize = 4;

/// Length of the addressed-packet header (TAG + ADDRESS + SIZE)
pub const HEADER_LEN: usize = TAG_LEN + 4 + 4;

/// Size of one binary transfer block
pub const BLOCK_SIZE: usize = 1024;

/// Size of the shared send buffer (header + one full block)
pub const PACKET_BUF_SIZE: usize = HEADER_LEN + BLOCK_SIZE;

/// Largest datagram the client will accept (one Ethernet frame)
pub const MAX_DATAGRAM: usize = 1514;

/// Errors that can occur during packet parsing or encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PacketError {
    /// Datagram is shorter than the fields its tag requires
    Truncated,
    /// Buffer too small for encoding
    BufferTooSmall,
    /// String argument contains an interior NUL byte
    InvalidString,
}

/// A received datagram viewed through its command tag
///
/// The packet borrows the receive buffer; field accessors decode lazily so
/// that a short datagram is only rejected by the handler that needs the
/// missing field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet<'a> {
    /// Parsed command tag
    pub command: Command,
    bytes: &'a [u8],
}

impl<'a> Packet<'a> {
    /// Parse a datagram
    ///
    /// Only the tag is required; anything shorter than four bytes cannot be
    /// classified and is reported as truncated.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, PacketError> {
        if bytes.len() < TAG_LEN {
            return Err(PacketError::Truncated);
        }
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&bytes[..TAG_LEN]);

        Ok(Self {
            command: Command::from_tag(tag),
            bytes,
        })
    }

    /// Raw datagram bytes
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Read the `index`th 32-bit field after the tag
    pub fn value(&self, index: usize) -> Result<u32, PacketError> {
        read_u32_be(self.bytes, TAG_LEN + index * 4).ok_or(PacketError::Truncated)
    }

    /// Address field of an addressed packet
    pub fn address(&self) -> Result<u32, PacketError> {
        self.value(0)
    }

    /// Size field of an addressed packet
    pub fn size(&self) -> Result<u32, PacketError> {
        self.value(1)
    }

    /// The 12-byte header, as the host sent it
    pub fn header(&self) -> Result<&'a [u8], PacketError> {
        self.bytes.get(..HEADER_LEN).ok_or(PacketError::Truncated)
    }

    /// Payload following the header
    ///
    /// Limited to `size` bytes; a datagram carrying fewer bytes than its size
    /// field claims is truncated.
    pub fn data(&self) -> Result<&'a [u8], PacketError> {
        let size = self.size()? as usize;
        let end = HEADER_LEN.checked_add(size).ok_or(PacketError::Truncated)?;
        self.bytes.get(HEADER_LEN..end).ok_or(PacketError::Truncated)
    }
}

/// Sequential writer for outgoing packets
///
/// Fields are appended in order; every append checks the remaining space so
/// encoding into the fixed send buffer can never overrun it.
#[derive(Debug)]
pub struct PacketWriter<'a> {
    buf: &'a mut [u8],
    len: usize,
}

impl<'a> PacketWriter<'a> {
    /// Start a packet with the given command tag
    pub fn new(buf: &'a mut [u8], command: Command) -> Result<Self, PacketError> {
        let mut writer = Self { buf, len: 0 };
        writer.bytes(&command.tag())?;
        Ok(writer)
    }

    /// Append a big-endian 32-bit value
    pub fn u32(&mut self, value: u32) -> Result<&mut Self, PacketError> {
        self.bytes(&value.to_be_bytes())
    }

    /// Append raw bytes
    pub fn bytes(&mut self, data: &[u8]) -> Result<&mut Self, PacketError> {
        let end = self.len + data.len();
        if end > self.buf.len() {
            return Err(PacketError::BufferTooSmall);
        }
        self.buf[self.len..end].copy_from_slice(data);
        self.len = end;
        Ok(self)
    }

    /// Append a string followed by its NUL terminator
    pub fn cstr(&mut self, s: &str) -> Result<&mut Self, PacketError> {
        if s.as_bytes().contains(&0) {
            return Err(PacketError::InvalidString);
        }
        self.bytes(s.as_bytes())?;
        self.bytes(&[0])
    }

    /// Number of bytes written so far
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing has been written
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Finish the packet and return its length
    pub fn finish(self) -> usize {
        self.len
    }
}

/// Encode an addressed packet (`tag, address, size, data`)
pub fn encode_addressed(
    buf: &mut [u8],
    command: Command,
    address: u32,
    size: u32,
    data: &[u8],
) -> Result<usize, PacketError> {
    let mut writer = PacketWriter::new(buf, command)?;
    writer.u32(address)?.u32(size)?.bytes(data)?;
    Ok(writer.finish())
}

/// Read a big-endian u32 at `offset`
#[inline]
pub fn read_u32_be(buf: &[u8], offset: usize) -> Option<u32> {
    let b = buf.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}
