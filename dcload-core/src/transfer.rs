//! Chunked binary transfer tracking
//!
//! A host-to-client transfer (`LBIN` … `PBIN`* … `DBIN`) moves a memory
//! region in 1 KiB blocks over an unreliable datagram link. The host sends
//! every block once, then repeatedly asks which block is still missing and
//! resends it, until the client reports that nothing is missing.

use dcload_protocol::BLOCK_SIZE;

/// Largest number of blocks a single transfer can track (16 MiB)
pub const MAX_BLOCKS: usize = 16384;

const BLOCK: u32 = BLOCK_SIZE as u32;

/// Errors from transfer bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferError {
    /// Chunk address lies outside the active transfer
    OutOfRange,
}

/// A block the host still has to send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MissingBlock {
    /// Target address of the block
    pub address: u32,
    /// Block length in bytes (the last block may be short)
    pub size: u32,
}

/// State of the active transfer
///
/// Only one transfer exists per session. Starting a new one discards the
/// previous state, finished or not.
#[derive(Clone)]
pub struct TransferSession {
    base: u32,
    total: u32,
    map: [u8; MAX_BLOCKS / 8],
}

impl Default for TransferSession {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for TransferSession {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TransferSession")
            .field("base", &self.base)
            .field("total", &self.total)
            .field("complete", &self.is_complete())
            .finish()
    }
}

impl TransferSession {
    /// Create an empty session (a zero-length transfer, already complete)
    pub const fn new() -> Self {
        Self {
            base: 0,
            total: 0,
            map: [0; MAX_BLOCKS / 8],
        }
    }

    /// Begin a new transfer of `size` bytes at `base`
    ///
    /// Sizes beyond [`MAX_BLOCKS`] blocks are clamped; the excess cannot be
    /// tracked.
    pub fn start(&mut self, base: u32, size: u32) {
        self.base = base;
        self.total = size.min((MAX_BLOCKS as u32) * BLOCK);
        self.map.fill(0);
    }

    /// Base address of the transfer
    pub fn base(&self) -> u32 {
        self.base
    }

    /// Total transfer size in bytes
    pub fn total_size(&self) -> u32 {
        self.total
    }

    /// Number of blocks in the transfer (`ceil(total / 1024)`)
    pub fn block_count(&self) -> usize {
        self.total.div_ceil(BLOCK) as usize
    }

    /// Record delivery of the block containing `address`
    ///
    /// Returns the block index.
    pub fn mark(&mut self, address: u32) -> Result<usize, TransferError> {
        let offset = address
            .checked_sub(self.base)
            .ok_or(TransferError::OutOfRange)?;
        let index = (offset / BLOCK) as usize;
        if index >= self.block_count() {
            return Err(TransferError::OutOfRange);
        }
        self.map[index / 8] |= 1 << (index % 8);
        Ok(index)
    }

    /// Whether block `index` has been delivered
    pub fn is_delivered(&self, index: usize) -> bool {
        index < self.block_count() && self.map[index / 8] & (1 << (index % 8)) != 0
    }

    /// First block not yet delivered, or `None` if the transfer is complete
    pub fn next_missing(&self) -> Option<MissingBlock> {
        let count = self.block_count();
        let index = (0..count).find(|&i| !self.is_delivered(i))?;

        let size = if index == count - 1 {
            match self.total % BLOCK {
                0 => BLOCK,
                rest => rest,
            }
        } else {
            BLOCK
        };

        Some(MissingBlock {
            address: self.base.wrapping_add((index as u32) * BLOCK),
            size,
        })
    }

    /// Whether every block of the transfer has been delivered
    pub fn is_complete(&self) -> bool {
        self.next_missing().is_none()
    }
}
