//! [`FileSystem`] over the host protocol
//!
//! Each operation takes the session lock, performs one or two RPC exchanges
//! and translates the host's result. Buffers are shown to the host through a
//! [`Window`] mapped at the configured base address, so the address the host
//! sees never refers to real client memory.

use dcload_hal::{ContextProbe, DatagramSocket, IrqSafeLock};
use dcload_protocol::command::{open_flags, HOST_STDOUT};
use dcload_protocol::{HostDirent, HostStat, Request, HOST_DIRENT_SIZE, HOST_STAT_SIZE};
use heapless::String;

use super::{
    host_len, DirEntry, FcntlCmd, FileSystem, FsError, Handle, HandleKind, OpenFlags, Stat,
    Whence, PATH_MAX,
};
use crate::memory::Window;
use crate::session::{DirPath, Exchange, Session};

/// `d_type` of a directory in a host directory entry
const DT_DIR: u8 = 4;

/// Translate framework open flags into host open bits
fn host_open_bits(flags: OpenFlags) -> u32 {
    let access = flags.access();
    let mut bits = if access & OpenFlags::RDWR.0 != 0 {
        open_flags::RDWR | open_flags::CREAT
    } else if access & OpenFlags::WRONLY.0 != 0 {
        open_flags::WRONLY | open_flags::CREAT
    } else {
        open_flags::RDONLY
    };

    if flags.contains(OpenFlags::APPEND) {
        bits |= open_flags::APPEND;
    }
    if flags.contains(OpenFlags::TRUNC) {
        bits |= open_flags::TRUNC;
    }
    bits
}

fn file_descriptor(handle: Handle) -> Result<u32, FsError> {
    match handle.kind() {
        Some(HandleKind::File(fd)) => Ok(fd),
        _ => Err(FsError::BadHandle),
    }
}

fn dir_handle(handle: Handle) -> Result<u32, FsError> {
    match handle.kind() {
        Some(HandleKind::Dir(dir)) => Ok(dir),
        _ => Err(FsError::BadHandle),
    }
}

/// Status of `path` as the host reports it
fn host_stat<S: DatagramSocket>(x: &mut Exchange<'_, S>, path: &str) -> Result<HostStat, FsError> {
    let mut record = [0u8; HOST_STAT_SIZE];
    let base = x.window_base();
    let rv = x.call(
        &Request::Stat {
            path,
            addr: base,
            size: HOST_STAT_SIZE as u32,
        },
        &mut Window::sink(base, &mut record),
    )?;
    if rv != 0 {
        return Err(FsError::Host(rv));
    }
    HostStat::from_bytes(&record).ok_or(FsError::Fault)
}

impl<S, L, P> Session<S, L, P>
where
    S: DatagramSocket,
    L: IrqSafeLock,
    P: ContextProbe,
{
    fn open_file(&mut self, path: &str, flags: OpenFlags) -> Result<Handle, FsError> {
        let request = Request::Open {
            path,
            flags: host_open_bits(flags),
            mode: self.config().create_mode,
        };

        self.exchange(|x| {
            let rv = x.call_plain(&request)?;
            let fd = u32::try_from(rv).map_err(|_| FsError::OpenFailed)?;
            match Handle::file(fd) {
                Some(handle) => Ok(handle),
                None => {
                    // Descriptor cannot be told apart from a directory handle
                    warn!("host descriptor {} out of range", fd);
                    x.call_plain(&Request::Close { fd })?;
                    Err(FsError::OpenFailed)
                }
            }
        })
    }

    fn open_dir(&mut self, path: &str) -> Result<Handle, FsError> {
        let path = if path.is_empty() { "/" } else { path };

        self.exchange(|x| {
            let rv = x.call_plain(&Request::OpenDir { path })?;
            if rv <= 0 {
                return Err(FsError::OpenFailed);
            }
            let dir = rv as u32;
            let Some(handle) = Handle::dir(dir) else {
                warn!("host directory handle {} out of range", dir);
                x.call_plain(&Request::CloseDir { dir })?;
                return Err(FsError::OpenFailed);
            };

            *x.dir_path = dir_context(path);
            Ok(handle)
        })
    }

    /// Write `buf` to a raw host descriptor
    pub(crate) fn write_descriptor(&mut self, fd: u32, buf: &[u8]) -> Result<usize, FsError> {
        self.exchange(|x| {
            let base = x.window_base();
            let rv = x.call(
                &Request::Write {
                    fd,
                    addr: base,
                    count: buf.len() as u32,
                },
                &mut Window::source(base, buf),
            )?;
            host_len(rv, buf.len())
        })
    }

    /// Write to the host tool's standard output
    pub(crate) fn write_stdout(&mut self, buf: &[u8]) -> Result<usize, FsError> {
        self.write_descriptor(HOST_STDOUT, buf)
    }
}

/// Remembered form of a directory path: always ends in `/`
///
/// Returns `None` if the path does not fit, in which case listing entries
/// are reported without their status.
fn dir_context(path: &str) -> Option<DirPath> {
    let mut out = DirPath::new();
    out.push_str(path).ok()?;
    if !out.ends_with('/') {
        out.push('/').ok()?;
    }
    Some(out)
}

impl<S, L, P> FileSystem for Session<S, L, P>
where
    S: DatagramSocket,
    L: IrqSafeLock,
    P: ContextProbe,
{
    fn open(&mut self, path: &str, flags: OpenFlags) -> Result<Handle, FsError> {
        if flags.contains(OpenFlags::DIR) {
            self.open_dir(path)
        } else {
            self.open_file(path, flags)
        }
    }

    fn close(&mut self, handle: Handle) -> Result<(), FsError> {
        let request = match handle.kind() {
            None => return Ok(()),
            Some(HandleKind::File(fd)) => Request::Close { fd },
            Some(HandleKind::Dir(dir)) => Request::CloseDir { dir },
        };

        let rv = self.exchange(|x| x.call_plain(&request))?;
        if rv < 0 {
            debug!("host reported {} closing {:?}", rv, handle);
        }
        Ok(())
    }

    fn read(&mut self, handle: Handle, buf: &mut [u8]) -> Result<usize, FsError> {
        let fd = file_descriptor(handle)?;

        self.exchange(|x| {
            let base = x.window_base();
            let rv = x.call(
                &Request::Read {
                    fd,
                    addr: base,
                    count: buf.len() as u32,
                },
                &mut Window::sink(base, buf),
            )?;
            host_len(rv, buf.len())
        })
    }

    fn write(&mut self, handle: Handle, buf: &[u8]) -> Result<usize, FsError> {
        let fd = file_descriptor(handle)?;
        self.write_descriptor(fd, buf)
    }

    fn seek(&mut self, handle: Handle, offset: i32, whence: Whence) -> Result<u32, FsError> {
        let fd = file_descriptor(handle)?;
        let request = Request::Lseek {
            fd,
            offset: offset as u32,
            whence: whence as u32,
        };

        let rv = self.exchange(|x| x.call_plain(&request))?;
        u32::try_from(rv).map_err(|_| FsError::Host(rv))
    }

    fn readdir(&mut self, handle: Handle) -> Result<Option<DirEntry>, FsError> {
        let dir = dir_handle(handle)?;

        self.exchange(|x| {
            let mut record = [0u8; HOST_DIRENT_SIZE];
            let base = x.window_base();
            let rv = x.call(
                &Request::ReadDir {
                    dir,
                    addr: base,
                    size: HOST_DIRENT_SIZE as u32,
                },
                &mut Window::sink(base, &mut record),
            )?;
            // Any nonzero result means an entry was written
            if rv == 0 {
                return Ok(None);
            }

            let dirent = HostDirent::from_bytes(&record).ok_or(FsError::Fault)?;
            let mut entry = DirEntry {
                name: dirent.name,
                size: DirEntry::UNKNOWN_SIZE,
                time: 0,
                is_dir: dirent.d_type == DT_DIR,
            };

            let mut full: String<{ PATH_MAX * 2 }> = String::new();
            let joined = match x.dir_path.as_ref() {
                Some(dir) => full.push_str(dir).and_then(|_| full.push_str(&entry.name)),
                None => Err(()),
            };
            if joined.is_err() {
                return Ok(Some(entry));
            }

            match host_stat(x, &full) {
                Ok(stat) => {
                    entry.is_dir = stat.is_dir();
                    entry.size = if entry.is_dir {
                        DirEntry::UNKNOWN_SIZE
                    } else {
                        stat.size
                    };
                    entry.time = stat.mtime;
                }
                Err(FsError::Transport) => return Err(FsError::Transport),
                Err(e) => trace!("no status for {}: {:?}", full.as_str(), e),
            }
            Ok(Some(entry))
        })
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<(), FsError> {
        self.exchange(|x| {
            let rv = x.call_plain(&Request::Link { from, to })?;
            if rv != 0 {
                return Err(FsError::Host(rv));
            }
            let rv = x.call_plain(&Request::Unlink { path: from })?;
            if rv != 0 {
                return Err(FsError::Host(rv));
            }
            Ok(())
        })
    }

    fn unlink(&mut self, path: &str) -> Result<(), FsError> {
        let rv = self.exchange(|x| x.call_plain(&Request::Unlink { path }))?;
        if rv != 0 {
            return Err(FsError::Host(rv));
        }
        Ok(())
    }

    fn stat(&mut self, path: &str) -> Result<Stat, FsError> {
        let host = self.exchange(|x| host_stat(x, path))?;

        Ok(Stat {
            dev: self.device_id(),
            ino: host.ino.into(),
            mode: host.mode,
            nlink: host.nlink.into(),
            uid: host.uid.into(),
            gid: host.gid.into(),
            rdev: host.rdev.into(),
            size: host.size.into(),
            atime: host.atime.into(),
            mtime: host.mtime.into(),
            ctime: host.ctime.into(),
            blksize: host.blksize as u32,
            blocks: host.blocks as u32,
        })
    }

    fn fcntl(&mut self, _handle: Handle, cmd: FcntlCmd) -> Result<i32, FsError> {
        match cmd {
            FcntlCmd::GetFl => Ok(OpenFlags::RDWR.0 as i32),
            FcntlCmd::SetFl(_) | FcntlCmd::GetFd | FcntlCmd::SetFd(_) => Ok(0),
            FcntlCmd::Other(_) => Err(FsError::InvalidArgument),
        }
    }
}
