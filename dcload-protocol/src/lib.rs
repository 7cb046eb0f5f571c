//! dcload-ip wire protocol
//!
//! This crate defines the UDP protocol spoken between an embedded client and
//! the dcload-ip host tool. Every datagram starts with a 4-byte ASCII tag that
//! names the verb; the rest of the datagram depends on the tag.
//!
//! # Packet Shapes
//!
//! ```text
//! Addressed packet
//! ┌──────┬─────────┬──────┬──────────────┐
//! │ TAG  │ ADDRESS │ SIZE │ DATA         │
//! │ 4B   │ 4B      │ 4B   │ 0–1024B      │
//! └──────┴─────────┴──────┴──────────────┘
//!
//! Integer packet
//! ┌──────┬────────┬────────┬────────┐
//! │ TAG  │ VALUE0 │ VALUE1 │ VALUE2 │
//! │ 4B   │ 4B     │ (4B)   │ (4B)   │
//! └──────┴────────┴────────┴────────┘
//! ```
//!
//! All integers are big-endian (network byte order). There is no length
//! field: the datagram boundary delimits the packet.
//!
//! Records the host writes into client memory ([`HostStat`], [`HostDirent`])
//! use the target's native little-endian layout instead.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod command;
pub mod packet;
pub mod records;

pub use command::{Command, Request};
pub use packet::{
    encode_addressed, Packet, PacketError, PacketWriter, BLOCK_SIZE, HEADER_LEN, MAX_DATAGRAM,
    PACKET_BUF_SIZE, TAG_LEN,
};
pub use records::{HostDirent, HostStat, HOST_DIRENT_SIZE, HOST_STAT_SIZE};

/// UDP port the client binds locally
pub const DCLOAD_PORT: u16 = 31313;
