//! Hosted dcload-ip client
//!
//! Implements the `dcload-hal` traits on top of the standard library so the
//! client core can talk to a real host tool from a desktop machine, and
//! provides the pieces the `dcl` command line tool is built from:
//!
//! - [`net`] - UDP sockets over `std::net`
//! - [`host`] - fixed-address loader, in-process mount and console tables
//! - [`config`] - TOML configuration file

pub mod config;
pub mod host;
pub mod net;

pub use config::HostConfig;
pub use host::{ConsoleTable, MountTable, StaticLoader};
pub use net::{UdpEndpoint, UdpNet};

use dcload_core::{Session, SpinLock};
use dcload_hal::ExecContext;

/// Session type used on a hosted OS
pub type HostSession = Session<UdpEndpoint, SpinLock, ExecContext>;

/// Create a session for `config`
///
/// `poll` runs every exchange in polling mode, as it would from interrupt
/// context on the target.
pub fn session(config: &HostConfig, poll: bool) -> HostSession {
    let context = if poll {
        ExecContext::Interrupt
    } else {
        ExecContext::Thread
    };
    Session::new(config.client.clone(), SpinLock::new(), context)
}
