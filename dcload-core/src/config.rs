//! Client configuration
//!
//! Everything the session needs to know before it connects. The defaults
//! match what the host tool expects; embedded builds normally use them as is,
//! hosted builds may override them from a file. With the `serde` feature the
//! configuration can also be stored as postcard binary data.

use heapless::String;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use dcload_protocol::command::CREATE_MODE;
use dcload_protocol::DCLOAD_PORT;

/// Maximum length of a mount point or console name
pub const MAX_NAME_LEN: usize = 32;

/// Maximum length of the identity string returned to version queries
pub const MAX_IDENT_LEN: usize = 64;

/// Filesystem handler version announced at registration (1.0 in 16.16)
pub const HANDLER_VERSION: u32 = 0x0001_0000;

/// Configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Mount point must be absolute and non-empty
    InvalidMount,
    /// Identity must be non-empty and free of NUL bytes
    InvalidIdent,
    /// Memory window base must be non-zero
    InvalidWindow,
    /// Binary encoding failed
    Serialize,
    /// Binary decoding failed
    Deserialize,
}

/// dcload-ip client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ClientConfig {
    /// Local UDP port
    pub local_port: u16,
    /// Mount point of the host filesystem
    pub mount: String<MAX_NAME_LEN>,
    /// Handler version passed to the filesystem registry
    pub handler_version: u32,
    /// Console name the session registers under
    pub console_name: String<MAX_NAME_LEN>,
    /// Identity returned to `VERS` queries
    pub ident: String<MAX_IDENT_LEN>,
    /// Permission bits sent with every file open
    pub create_mode: u32,
    /// Address at which request buffers are shown to the host
    pub window_base: u32,
}

fn label<const N: usize>(s: &str) -> String<N> {
    let mut out = String::new();
    let _ = out.push_str(s);
    out
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            local_port: DCLOAD_PORT,
            mount: label("/pc"),
            handler_version: HANDLER_VERSION,
            console_name: label("fs_dclsocket"),
            ident: label("dcload-ip over KOS sockets"),
            create_mode: CREATE_MODE,
            window_base: 0x1000_0000,
        }
    }
}

impl ClientConfig {
    /// Check values the session relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mount.len() < 2 || !self.mount.starts_with('/') {
            return Err(ConfigError::InvalidMount);
        }
        if self.ident.is_empty() || self.ident.contains('\0') {
            return Err(ConfigError::InvalidIdent);
        }
        if self.window_base == 0 {
            return Err(ConfigError::InvalidWindow);
        }
        Ok(())
    }
}

#[cfg(feature = "serde")]
impl ClientConfig {
    /// Encode as postcard binary data into `buf`
    pub fn to_postcard<'b>(&self, buf: &'b mut [u8]) -> Result<&'b mut [u8], ConfigError> {
        postcard::to_slice(self, buf).map_err(|_| ConfigError::Serialize)
    }

    /// Decode from postcard binary data
    pub fn from_postcard(bytes: &[u8]) -> Result<Self, ConfigError> {
        postcard::from_bytes(bytes).map_err(|_| ConfigError::Deserialize)
    }
}
