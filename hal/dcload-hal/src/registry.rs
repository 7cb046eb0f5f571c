//! Registration with the filesystem and console frameworks
//!
//! The frameworks themselves live outside the client. The client only needs
//! to announce its mount point and find out which console is active.

/// Errors from framework registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegistryError {
    /// A handler with this name already exists
    Duplicate,
    /// The framework has no room for another handler
    Full,
}

/// Virtual filesystem handler table
pub trait VfsRegistry {
    /// Add a handler mounted at `name`
    ///
    /// `version` is the handler version in 16.16 fixed point (1.0 = `0x0001_0000`).
    fn register(&mut self, name: &str, version: u32) -> Result<(), RegistryError>;

    /// Remove the handler mounted at `name`
    fn unregister(&mut self, name: &str);
}

/// Debug console selection
pub trait ConsoleRegistry {
    /// Whether the console named `name` is the active one
    fn is_active(&self, name: &str) -> bool;

    /// Disable the active console
    fn disable(&mut self);
}
