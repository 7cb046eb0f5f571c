//! File and directory handles
//!
//! The host hands out small integers for open files and large ones for open
//! directories. Both travel through the same handle slot of the filesystem
//! framework, where zero means "no handle", so file descriptors are stored
//! shifted up by one:
//!
//! | Handle     | Meaning                               |
//! |------------|---------------------------------------|
//! | `0`        | invalid / failed open                 |
//! | `1..=100`  | file, host descriptor `handle - 1`    |
//! | `> 100`    | directory, host handle used unchanged |
//!
//! Handle 100 decodes as file descriptor 99 everywhere.

/// Largest handle value that still denotes a file
pub const FILE_HANDLE_MAX: u32 = 100;

/// What a handle refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HandleKind {
    /// Host file descriptor
    File(u32),
    /// Host directory handle
    Dir(u32),
}

/// Opaque handle returned by `open`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Handle(u32);

impl Handle {
    /// The "no handle" value
    pub const INVALID: Handle = Handle(0);

    /// Wrap a raw handle value
    pub const fn from_raw(raw: u32) -> Self {
        Handle(raw)
    }

    /// Raw handle value
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Handle for a host file descriptor
    ///
    /// Descriptors that would not fit the file range are rejected.
    pub fn file(fd: u32) -> Option<Self> {
        let raw = fd.checked_add(1)?;
        (raw <= FILE_HANDLE_MAX).then_some(Handle(raw))
    }

    /// Handle for a host directory handle
    pub fn dir(dir: u32) -> Option<Self> {
        (dir > FILE_HANDLE_MAX).then_some(Handle(dir))
    }

    /// Whether this is the "no handle" value
    pub fn is_valid(self) -> bool {
        self.0 != 0
    }

    /// Classify and decode
    pub fn kind(self) -> Option<HandleKind> {
        match self.0 {
            0 => None,
            raw @ 1..=FILE_HANDLE_MAX => Some(HandleKind::File(raw - 1)),
            raw => Some(HandleKind::Dir(raw)),
        }
    }
}
