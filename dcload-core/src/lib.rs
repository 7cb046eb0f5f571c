//! Board-agnostic dcload-ip client
//!
//! This crate contains the client side of the dcload-ip host protocol,
//! written against the traits of `dcload-hal` only:
//!
//! - RPC engine: request/response exchange and host-driven binary transfers
//! - Transfer tracking for chunked downloads
//! - Filesystem adapter exposing the host filesystem under a mount point
//! - Console adapter routing debug output to the host tool
//! - Session lifecycle (console attach, connect, shutdown)
//! - Configuration type definitions
//!
//! # Usage
//!
//! ```ignore
//! let mut session = Session::new(ClientConfig::default(), SpinLock::new(), ExecContext::Thread);
//! session.attach_console(&net)?;
//! session.connect(&mut net, &mut loader, &mut mounts)?;
//!
//! let file = session.open("/readme.txt", OpenFlags::RDONLY)?;
//! let n = session.read(file, &mut buf)?;
//! session.close(file)?;
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

// This mod MUST go first, so that the others see its macros.
mod fmt;

pub mod config;
pub mod console;
pub mod fs;
pub mod memory;
pub mod rpc;
pub mod session;
pub mod sync;
pub mod transfer;

#[cfg(test)]
mod mock;

pub use config::{ClientConfig, ConfigError};
pub use console::{ConsoleError, ConsoleSink};
pub use fs::{DirEntry, FcntlCmd, FileSystem, FsError, Handle, OpenFlags, Stat, Whence};
pub use memory::{MemoryError, TargetMemory, Window};
pub use rpc::{Link, RecvStrategy, RpcError};
pub use session::{Session, SessionError, SessionState};
pub use sync::{LockGuard, SpinLock};
pub use transfer::{MissingBlock, TransferSession};
