//! dcload Platform Abstraction Layer
//!
//! This crate defines the traits the dcload-ip client needs from the system
//! it runs on. The client core is written against these traits only, so the
//! same protocol code runs on a bare-metal network stack, under an RTOS, or
//! on a hosted OS for testing.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  dcload-core (protocol client, adapters)│
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  dcload-hal (this crate - traits)       │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ target network│       │  dcload-std   │
//! │ stack / kernel│       │  (std::net)   │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`net::DatagramSocket`], [`net::NetStack`] - UDP endpoint and link layer
//! - [`lock::IrqSafeLock`], [`lock::ContextProbe`] - Mutual exclusion across contexts
//! - [`loader::DebugLoader`] - Host discovery through the debug loader
//! - [`registry::VfsRegistry`], [`registry::ConsoleRegistry`] - Framework registration

#![no_std]
#![deny(unsafe_code)]

pub mod loader;
pub mod lock;
pub mod net;
pub mod registry;

// Re-export key traits at crate root for convenience
pub use loader::{DebugLoader, HostInfo, LoaderKind};
pub use lock::{ContextProbe, ExecContext, IrqSafeLock, LockError};
pub use net::{ArpError, DatagramSocket, Ipv4Addr, MacAddr, NetError, NetStack, SocketAddr};
pub use registry::{ConsoleRegistry, RegistryError, VfsRegistry};
