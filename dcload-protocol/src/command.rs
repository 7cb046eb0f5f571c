//! Command tags and request encoding
//!
//! Commands fall into two groups:
//! - Host → Client: binary transfer verbs, version query, the terminal result
//! - Client → Host: filesystem requests, each answered by a `RETV`

use crate::packet::{PacketError, PacketWriter, TAG_LEN};

// Tags: Host → Client
pub const TAG_LOAD_BINARY: [u8; TAG_LEN] = *b"LBIN";
pub const TAG_PUT_BINARY: [u8; TAG_LEN] = *b"PBIN";
pub const TAG_DONE_BINARY: [u8; TAG_LEN] = *b"DBIN";
pub const TAG_SEND_BINARY: [u8; TAG_LEN] = *b"SBIN";
pub const TAG_SEND_BINARY_QUIET: [u8; TAG_LEN] = *b"SBIQ";
pub const TAG_RETURN_VALUE: [u8; TAG_LEN] = *b"RETV";
pub const TAG_VERSION: [u8; TAG_LEN] = *b"VERS";

// Tags: Client → Host
pub const TAG_EXIT: [u8; TAG_LEN] = *b"DC00";
pub const TAG_WRITE: [u8; TAG_LEN] = *b"DD02";
pub const TAG_READ: [u8; TAG_LEN] = *b"DC03";
pub const TAG_OPEN: [u8; TAG_LEN] = *b"DC04";
pub const TAG_CLOSE: [u8; TAG_LEN] = *b"DC05";
pub const TAG_LINK: [u8; TAG_LEN] = *b"DC07";
pub const TAG_UNLINK: [u8; TAG_LEN] = *b"DC08";
pub const TAG_LSEEK: [u8; TAG_LEN] = *b"DC11";
pub const TAG_STAT: [u8; TAG_LEN] = *b"DC13";
pub const TAG_OPENDIR: [u8; TAG_LEN] = *b"DC16";
pub const TAG_CLOSEDIR: [u8; TAG_LEN] = *b"DC17";
pub const TAG_READDIR: [u8; TAG_LEN] = *b"DC18";

/// Host open-mode bits carried in the `DC04` address field
pub mod open_flags {
    pub const RDONLY: u32 = 0x0000;
    pub const WRONLY: u32 = 0x0001;
    pub const RDWR: u32 = 0x0002;
    pub const APPEND: u32 = 0x0008;
    pub const CREAT: u32 = 0x0200;
    pub const TRUNC: u32 = 0x0400;
}

/// Creation mode sent with every file open
pub const CREATE_MODE: u32 = 0o644;

/// Raw host descriptor of the host tool's standard output
pub const HOST_STDOUT: u32 = 1;

/// Protocol verbs
///
/// Parsed once from the 4-byte tag. Tags this client does not know are kept
/// as [`Command::Unrecognized`] so the receive loop can drop them and carry
/// on waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Start a chunked download into client memory
    LoadBinary,
    /// One chunk of a download
    PutBinary,
    /// Next-missing-block query (host → client) or end of upload (client → host)
    DoneBinary,
    /// Upload request (host → client) or upload chunk (client → host)
    SendBinary,
    /// Upload request without progress output on the host
    SendBinaryQuiet,
    /// Terminal result of a request
    ReturnValue,
    /// Identity query
    Version,
    /// Disconnect notification
    Exit,
    Write,
    Read,
    Open,
    Close,
    /// Create a second name for a file (first half of a rename)
    Link,
    Unlink,
    Lseek,
    Stat,
    OpenDir,
    CloseDir,
    ReadDir,
    /// Tag not known to this client
    Unrecognized([u8; TAG_LEN]),
}

impl Command {
    /// Classify a tag
    pub fn from_tag(tag: [u8; TAG_LEN]) -> Self {
        match tag {
            TAG_LOAD_BINARY => Command::LoadBinary,
            TAG_PUT_BINARY => Command::PutBinary,
            TAG_DONE_BINARY => Command::DoneBinary,
            TAG_SEND_BINARY => Command::SendBinary,
            TAG_SEND_BINARY_QUIET => Command::SendBinaryQuiet,
            TAG_RETURN_VALUE => Command::ReturnValue,
            TAG_VERSION => Command::Version,
            TAG_EXIT => Command::Exit,
            TAG_WRITE => Command::Write,
            TAG_READ => Command::Read,
            TAG_OPEN => Command::Open,
            TAG_CLOSE => Command::Close,
            TAG_LINK => Command::Link,
            TAG_UNLINK => Command::Unlink,
            TAG_LSEEK => Command::Lseek,
            TAG_STAT => Command::Stat,
            TAG_OPENDIR => Command::OpenDir,
            TAG_CLOSEDIR => Command::CloseDir,
            TAG_READDIR => Command::ReadDir,
            other => Command::Unrecognized(other),
        }
    }

    /// Wire tag for this command
    pub fn tag(self) -> [u8; TAG_LEN] {
        match self {
            Command::LoadBinary => TAG_LOAD_BINARY,
            Command::PutBinary => TAG_PUT_BINARY,
            Command::DoneBinary => TAG_DONE_BINARY,
            Command::SendBinary => TAG_SEND_BINARY,
            Command::SendBinaryQuiet => TAG_SEND_BINARY_QUIET,
            Command::ReturnValue => TAG_RETURN_VALUE,
            Command::Version => TAG_VERSION,
            Command::Exit => TAG_EXIT,
            Command::Write => TAG_WRITE,
            Command::Read => TAG_READ,
            Command::Open => TAG_OPEN,
            Command::Close => TAG_CLOSE,
            Command::Link => TAG_LINK,
            Command::Unlink => TAG_UNLINK,
            Command::Lseek => TAG_LSEEK,
            Command::Stat => TAG_STAT,
            Command::OpenDir => TAG_OPENDIR,
            Command::CloseDir => TAG_CLOSEDIR,
            Command::ReadDir => TAG_READDIR,
            Command::Unrecognized(tag) => tag,
        }
    }
}

/// Requests sent from the client to the host
///
/// `addr` fields name the client memory window the host should read from or
/// write into while servicing the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Request<'a> {
    /// Disconnect notification; the host does not answer
    Exit,
    /// Open a file
    Open { path: &'a str, flags: u32, mode: u32 },
    /// Close a raw file descriptor
    Close { fd: u32 },
    /// Read `count` bytes into the window at `addr`
    Read { fd: u32, addr: u32, count: u32 },
    /// Write `count` bytes from the window at `addr`
    Write { fd: u32, addr: u32, count: u32 },
    /// Reposition a descriptor
    Lseek { fd: u32, offset: u32, whence: u32 },
    /// Give `from` the additional name `to`
    Link { from: &'a str, to: &'a str },
    /// Remove a name
    Unlink { path: &'a str },
    /// Stat `path` into the window at `addr`
    Stat { path: &'a str, addr: u32, size: u32 },
    /// Open a directory
    OpenDir { path: &'a str },
    /// Close a raw directory handle
    CloseDir { dir: u32 },
    /// Read one directory entry into the window at `addr`
    ReadDir { dir: u32, addr: u32, size: u32 },
}

impl<'a> Request<'a> {
    /// Command tag of this request
    pub fn command(&self) -> Command {
        match self {
            Request::Exit => Command::Exit,
            Request::Open { .. } => Command::Open,
            Request::Close { .. } => Command::Close,
            Request::Read { .. } => Command::Read,
            Request::Write { .. } => Command::Write,
            Request::Lseek { .. } => Command::Lseek,
            Request::Link { .. } => Command::Link,
            Request::Unlink { .. } => Command::Unlink,
            Request::Stat { .. } => Command::Stat,
            Request::OpenDir { .. } => Command::OpenDir,
            Request::CloseDir { .. } => Command::CloseDir,
            Request::ReadDir { .. } => Command::ReadDir,
        }
    }

    /// Encode this request into `buf`
    ///
    /// Returns the number of bytes written
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, PacketError> {
        let mut w = PacketWriter::new(buf, self.command())?;
        match *self {
            Request::Exit => {
                w.u32(0)?.u32(0)?;
            }
            Request::Open { path, flags, mode } => {
                w.u32(flags)?.u32(mode)?.cstr(path)?;
            }
            Request::Close { fd } => {
                w.u32(fd)?;
            }
            Request::CloseDir { dir } => {
                w.u32(dir)?;
            }
            Request::Read { fd, addr, count } | Request::Write { fd, addr, count } => {
                w.u32(fd)?.u32(addr)?.u32(count)?;
            }
            Request::Lseek { fd, offset, whence } => {
                w.u32(fd)?.u32(offset)?.u32(whence)?;
            }
            Request::ReadDir { dir, addr, size } => {
                w.u32(dir)?.u32(addr)?.u32(size)?;
            }
            Request::Link { from, to } => {
                w.cstr(from)?.cstr(to)?;
            }
            Request::Unlink { path } | Request::OpenDir { path } => {
                w.cstr(path)?;
            }
            Request::Stat { path, addr, size } => {
                w.u32(addr)?.u32(size)?.cstr(path)?;
            }
        }
        Ok(w.finish())
    }
}
