//! Client memory as seen by the host
//!
//! The protocol lets the host name client memory by 32-bit address: `PBIN`
//! writes a chunk to an address, `SBIN` asks for the bytes at an address.
//! Instead of trusting those addresses, the client resolves them through
//! [`TargetMemory`]. The filesystem adapter exposes one bounds-checked
//! [`Window`] per request, mapped at a synthetic base address, and every
//! access outside it is refused.

/// Errors from target memory access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MemoryError {
    /// Address range is not mapped
    Unmapped { address: u32, len: u32 },
    /// Region is mapped but may not be accessed this way
    ReadOnly,
}

/// Address space the host may read and write during one request
pub trait TargetMemory {
    /// Copy `data` to `address`
    fn store(&mut self, address: u32, data: &[u8]) -> Result<(), MemoryError>;

    /// Borrow `len` bytes starting at `address`
    fn load(&self, address: u32, len: u32) -> Result<&[u8], MemoryError>;
}

/// A single buffer mapped at `base`
#[derive(Debug)]
pub enum Window<'a> {
    /// Nothing mapped
    Closed,
    /// Host may write into the buffer
    Sink { base: u32, buf: &'a mut [u8] },
    /// Host may read from the buffer
    Source { base: u32, buf: &'a [u8] },
}

impl<'a> Window<'a> {
    /// Map a writable buffer at `base`
    pub fn sink(base: u32, buf: &'a mut [u8]) -> Self {
        Window::Sink { base, buf }
    }

    /// Map a read-only buffer at `base`
    pub fn source(base: u32, buf: &'a [u8]) -> Self {
        Window::Source { base, buf }
    }

    /// Base address of the mapping (0 when closed)
    pub fn base(&self) -> u32 {
        match self {
            Window::Closed => 0,
            Window::Sink { base, .. } | Window::Source { base, .. } => *base,
        }
    }

    /// Mapped length in bytes
    pub fn len(&self) -> usize {
        match self {
            Window::Closed => 0,
            Window::Sink { buf, .. } => buf.len(),
            Window::Source { buf, .. } => buf.len(),
        }
    }

    /// Whether nothing is mapped
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Translate `address..address+len` into an offset range of a buffer at `base`
fn resolve(
    base: u32,
    buf_len: usize,
    address: u32,
    len: u32,
) -> Result<core::ops::Range<usize>, MemoryError> {
    let unmapped = MemoryError::Unmapped { address, len };
    let start = address.checked_sub(base).ok_or(unmapped)? as usize;
    let end = start.checked_add(len as usize).ok_or(unmapped)?;
    if end > buf_len {
        return Err(unmapped);
    }
    Ok(start..end)
}

impl TargetMemory for Window<'_> {
    fn store(&mut self, address: u32, data: &[u8]) -> Result<(), MemoryError> {
        match self {
            Window::Sink { base, buf } => {
                let range = resolve(*base, buf.len(), address, data.len() as u32)?;
                buf[range].copy_from_slice(data);
                Ok(())
            }
            Window::Source { .. } => Err(MemoryError::ReadOnly),
            Window::Closed => Err(MemoryError::Unmapped {
                address,
                len: data.len() as u32,
            }),
        }
    }

    fn load(&self, address: u32, len: u32) -> Result<&[u8], MemoryError> {
        match self {
            Window::Sink { base, buf } => {
                let range = resolve(*base, buf.len(), address, len)?;
                Ok(&buf[range])
            }
            Window::Source { base, buf } => {
                let range = resolve(*base, buf.len(), address, len)?;
                Ok(&buf[range])
            }
            Window::Closed => Err(MemoryError::Unmapped { address, len }),
        }
    }
}
