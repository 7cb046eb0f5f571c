//! Hosted stand-ins for the debug loader and framework registries

use std::collections::BTreeMap;

use dcload_hal::{
    ConsoleRegistry, DebugLoader, HostInfo, LoaderKind, RegistryError, SocketAddr, VfsRegistry,
};
use log::{debug, info};

/// Loader that always reports the network variant and a fixed host
#[derive(Debug, Clone, Copy)]
pub struct StaticLoader {
    addr: SocketAddr,
}

impl StaticLoader {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }
}

impl DebugLoader for StaticLoader {
    fn kind(&self) -> LoaderKind {
        LoaderKind::Ip
    }

    fn host_info(&mut self) -> HostInfo {
        HostInfo { addr: self.addr }
    }
}

/// In-process mount table
#[derive(Debug, Default)]
pub struct MountTable {
    mounts: BTreeMap<String, u32>,
}

impl MountTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_mounted(&self, name: &str) -> bool {
        self.mounts.contains_key(name)
    }

    /// Handler version registered at `name`
    pub fn version(&self, name: &str) -> Option<u32> {
        self.mounts.get(name).copied()
    }
}

impl VfsRegistry for MountTable {
    fn register(&mut self, name: &str, version: u32) -> Result<(), RegistryError> {
        if self.mounts.contains_key(name) {
            return Err(RegistryError::Duplicate);
        }
        info!("mounted {} (handler version {:#x})", name, version);
        self.mounts.insert(name.to_owned(), version);
        Ok(())
    }

    fn unregister(&mut self, name: &str) {
        if self.mounts.remove(name).is_some() {
            info!("unmounted {}", name);
        }
    }
}

/// Console selection with at most one active console
#[derive(Debug, Default)]
pub struct ConsoleTable {
    console: Option<String>,
}

impl ConsoleTable {
    /// Mark the console named `name` active
    pub fn with_active(name: &str) -> Self {
        Self {
            console: Some(name.to_owned()),
        }
    }

    pub fn active(&self) -> Option<&str> {
        self.console.as_deref()
    }
}

impl ConsoleRegistry for ConsoleTable {
    fn is_active(&self, name: &str) -> bool {
        self.console.as_deref() == Some(name)
    }

    fn disable(&mut self) {
        if let Some(name) = self.console.take() {
            debug!("console {} disabled", name);
        }
    }
}
