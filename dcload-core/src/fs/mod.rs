//! Filesystem adapter
//!
//! Exposes the host's filesystem through the [`FileSystem`] capability set.
//! Every operation is a short RPC exchange with the host tool; see
//! [`crate::session::Session`] for the implementation.
//!
//! Capabilities the host protocol cannot express (directories, symbolic
//! links, ioctl, polling) have default implementations that report
//! [`FsError::NotSupported`].

mod adapter;
mod handle;

pub use handle::{Handle, HandleKind, FILE_HANDLE_MAX};

use heapless::String;

use crate::rpc::RpcError;
use dcload_hal::LockError;
use dcload_protocol::{records::NAME_MAX, PacketError};

/// Capacity of the remembered directory path
pub const PATH_MAX: usize = 256;

/// Open flags as passed by the filesystem framework
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OpenFlags(pub u32);

impl OpenFlags {
    pub const RDONLY: OpenFlags = OpenFlags(0x0000);
    pub const WRONLY: OpenFlags = OpenFlags(0x0001);
    pub const RDWR: OpenFlags = OpenFlags(0x0002);
    /// Mask of the access mode bits
    pub const ACCMODE: u32 = 0x0003;
    pub const APPEND: OpenFlags = OpenFlags(0x0008);
    pub const CREAT: OpenFlags = OpenFlags(0x0200);
    pub const TRUNC: OpenFlags = OpenFlags(0x0400);
    /// Open a directory for listing
    pub const DIR: OpenFlags = OpenFlags(0x1000);

    /// Whether every bit of `other` is set
    pub fn contains(self, other: OpenFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Access mode bits
    pub fn access(self) -> u32 {
        self.0 & Self::ACCMODE
    }
}

impl core::ops::BitOr for OpenFlags {
    type Output = OpenFlags;

    fn bitor(self, rhs: OpenFlags) -> OpenFlags {
        OpenFlags(self.0 | rhs.0)
    }
}

/// Seek origin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum Whence {
    Set = 0,
    Current = 1,
    End = 2,
}

/// File status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Stat {
    /// Device id of the session that produced the status
    pub dev: u32,
    pub ino: u32,
    pub mode: u32,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub rdev: u32,
    pub size: i64,
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
    pub blksize: u32,
    pub blocks: u32,
}

impl Stat {
    /// Whether the mode carries the directory bit
    pub fn is_dir(&self) -> bool {
        self.mode & dcload_protocol::records::S_IFDIR != 0
    }
}

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String<NAME_MAX>,
    /// Size in bytes, or [`DirEntry::UNKNOWN_SIZE`]
    pub size: i32,
    /// Modification time in seconds
    pub time: i32,
    pub is_dir: bool,
}

impl DirEntry {
    /// Size reported for directories and entries whose status is unknown
    pub const UNKNOWN_SIZE: i32 = -1;
}

/// Descriptor control commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FcntlCmd {
    GetFl,
    SetFl(u32),
    GetFd,
    SetFd(u32),
    Other(i32),
}

/// Filesystem errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FsError {
    /// Session is not connected
    NotConnected,
    /// Session lock is held and the caller may not wait
    LockUnavailable,
    /// Handle is invalid or of the wrong kind
    BadHandle,
    /// The host refused to open the path
    OpenFailed,
    /// The host reported failure (negative result)
    Host(i32),
    /// The exchange ended without a result
    Transport,
    /// The host accessed memory outside the request buffer
    Fault,
    /// Argument not accepted (e.g. NUL in a path)
    InvalidArgument,
    /// Path does not fit a request datagram
    NameTooLong,
    /// Capability not provided by this filesystem
    NotSupported,
}

impl FsError {
    /// Matching newlib `errno` value
    pub fn errno(self) -> i32 {
        match self {
            FsError::OpenFailed => 2,
            FsError::Host(_) | FsError::Transport => 5,
            FsError::BadHandle => 9,
            FsError::LockUnavailable => 11,
            FsError::Fault => 14,
            FsError::InvalidArgument => 22,
            FsError::NotSupported => 88,
            FsError::NameTooLong => 91,
            FsError::NotConnected => 128,
        }
    }
}

impl From<LockError> for FsError {
    fn from(_: LockError) -> Self {
        FsError::LockUnavailable
    }
}

impl From<RpcError> for FsError {
    fn from(e: RpcError) -> Self {
        match e {
            RpcError::Transport(_) => FsError::Transport,
            RpcError::Encode(PacketError::BufferTooSmall) => FsError::NameTooLong,
            RpcError::Encode(_) => FsError::InvalidArgument,
            RpcError::Memory(_) => FsError::Fault,
        }
    }
}

/// Convert a host result to a byte count of at most `limit`
pub(crate) fn host_len(rv: i32, limit: usize) -> Result<usize, FsError> {
    match usize::try_from(rv) {
        Ok(len) if len <= limit => Ok(len),
        _ => Err(FsError::Host(rv)),
    }
}

/// Filesystem capability set
///
/// Mirrors the handler table of the filesystem framework. Paths are relative
/// to the mount point and start with `/`.
pub trait FileSystem {
    /// Open a file, or a directory when `flags` contains [`OpenFlags::DIR`]
    fn open(&mut self, path: &str, flags: OpenFlags) -> Result<Handle, FsError>;

    /// Close a file or directory
    fn close(&mut self, handle: Handle) -> Result<(), FsError>;

    /// Read up to `buf.len()` bytes; returns the number read
    fn read(&mut self, handle: Handle, buf: &mut [u8]) -> Result<usize, FsError>;

    /// Write `buf`; returns the number of bytes written
    fn write(&mut self, handle: Handle, buf: &[u8]) -> Result<usize, FsError>;

    /// Reposition; returns the new offset
    fn seek(&mut self, handle: Handle, offset: i32, whence: Whence) -> Result<u32, FsError>;

    /// Current offset
    fn tell(&mut self, handle: Handle) -> Result<u32, FsError> {
        self.seek(handle, 0, Whence::Current)
    }

    /// Total size, leaving the offset where it was
    fn size(&mut self, handle: Handle) -> Result<u32, FsError> {
        let current = self.tell(handle)?;
        let end = self.seek(handle, 0, Whence::End)?;
        self.seek(handle, current as i32, Whence::Set)?;
        Ok(end)
    }

    /// Next directory entry, or `None` at the end of the listing
    fn readdir(&mut self, handle: Handle) -> Result<Option<DirEntry>, FsError>;

    /// Give `from` the name `to`
    fn rename(&mut self, from: &str, to: &str) -> Result<(), FsError>;

    /// Remove a file
    fn unlink(&mut self, path: &str) -> Result<(), FsError>;

    /// Status of a path
    fn stat(&mut self, path: &str) -> Result<Stat, FsError>;

    /// Descriptor control
    fn fcntl(&mut self, handle: Handle, cmd: FcntlCmd) -> Result<i32, FsError>;

    fn mkdir(&mut self, _path: &str) -> Result<(), FsError> {
        Err(FsError::NotSupported)
    }

    fn rmdir(&mut self, _path: &str) -> Result<(), FsError> {
        Err(FsError::NotSupported)
    }

    fn link(&mut self, _from: &str, _to: &str) -> Result<(), FsError> {
        Err(FsError::NotSupported)
    }

    fn symlink(&mut self, _target: &str, _path: &str) -> Result<(), FsError> {
        Err(FsError::NotSupported)
    }

    fn readlink(&mut self, _path: &str, _buf: &mut [u8]) -> Result<usize, FsError> {
        Err(FsError::NotSupported)
    }

    fn rewinddir(&mut self, _handle: Handle) -> Result<(), FsError> {
        Err(FsError::NotSupported)
    }

    fn fstat(&mut self, _handle: Handle) -> Result<Stat, FsError> {
        Err(FsError::NotSupported)
    }

    fn ioctl(&mut self, _handle: Handle, _request: i32, _arg: &mut [u8]) -> Result<i32, FsError> {
        Err(FsError::NotSupported)
    }

    fn poll(&mut self, _handle: Handle, _events: i16) -> Result<i16, FsError> {
        Err(FsError::NotSupported)
    }
}
