//! Debug loader queries
//!
//! The program was started by a debug loader that already talks to the host
//! tool. The loader knows which transport it used and where the host is.

use crate::net::SocketAddr;

/// Transport the debug loader runs over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LoaderKind {
    /// Not started from a debug loader
    None,
    /// Serial cable loader
    Serial,
    /// Network loader
    Ip,
}

/// Where the host tool is listening
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostInfo {
    /// Host address and port
    pub addr: SocketAddr,
}

/// Debug loader interface
pub trait DebugLoader {
    /// Transport variant of the running loader
    fn kind(&self) -> LoaderKind;

    /// Ask the loader for the host address
    fn host_info(&mut self) -> HostInfo;
}
