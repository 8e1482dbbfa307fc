//! Simulated memory seen by the loader.
//!
//! This module defines the contract between the loaders and the memory model. It provides:
//! 1. **Sink:** The [`MemorySink`] trait, the only channel through which loaders touch memory.
//! 2. **Buffer:** Backing storage ([`DramBuffer`]) for RAM contents.
//! 3. **Ram:** A buffer mapped at a base address, usable directly as a sink.
//! 4. **Map:** A [`MemoryMap`] of RAM and device regions that routes writes by address.

/// DRAM buffer implementation (mmap or heap) for raw byte storage.
pub mod buffer;

/// Region map routing writes to RAM and rejecting device ranges.
pub mod map;

pub use self::buffer::DramBuffer;
pub use self::map::MemoryMap;

use crate::common::{AddrRange, AddressWidth, LoadError, MemoryAddress, Result};

/// Largest single write issued by the provided [`MemorySink::zero`].
const ZERO_CHUNK: usize = 4096;

/// Destination for loader writes.
///
/// Loaders never read back through a sink; they check every destination with
/// [`MemorySink::in_range`] during validation and only then issue writes.
pub trait MemorySink {
    /// Writes `data` starting at `address`.
    fn write(&mut self, address: MemoryAddress, data: &[u8]) -> Result<()>;

    /// Returns `true` if `len` bytes at `address` may be written.
    fn in_range(&self, address: MemoryAddress, len: u64) -> bool;

    /// Writes `len` zero bytes at `address` (default: chunked [`MemorySink::write`]).
    fn zero(&mut self, address: MemoryAddress, len: u64) -> Result<()> {
        let chunk = [0u8; ZERO_CHUNK];
        let mut done = 0u64;
        while done < len {
            let step = (len - done).min(ZERO_CHUNK as u64);
            self.write(address + done, &chunk[..step as usize])?;
            done += step;
        }
        Ok(())
    }
}

impl<T: MemorySink + ?Sized> MemorySink for &mut T {
    fn write(&mut self, address: MemoryAddress, data: &[u8]) -> Result<()> {
        (**self).write(address, data)
    }

    fn in_range(&self, address: MemoryAddress, len: u64) -> bool {
        (**self).in_range(address, len)
    }

    fn zero(&mut self, address: MemoryAddress, len: u64) -> Result<()> {
        (**self).zero(address, len)
    }
}

/// A RAM region: a [`DramBuffer`] mapped at a base address.
#[derive(Debug)]
pub struct Ram {
    buffer: DramBuffer,
    base: MemoryAddress,
}

impl Ram {
    /// Creates `size` bytes of zeroed RAM starting at `base`.
    ///
    /// # Errors
    ///
    /// [`LoadError::Range`] if the region would extend past the 64-bit address space.
    pub fn new(base: MemoryAddress, size: usize) -> Result<Self> {
        let _ = AddrRange::new(base, size as u64, AddressWidth::Bits64)?;
        Ok(Self {
            buffer: DramBuffer::new(size),
            base,
        })
    }

    /// Returns the address range covered by this RAM.
    pub const fn range(&self) -> AddrRange {
        AddrRange {
            start: self.base,
            len: self.buffer.len() as u64,
        }
    }

    fn offset_of(&self, address: MemoryAddress, len: u64) -> Option<usize> {
        let want = AddrRange { start: address, len };
        if self.range().contains(&want) {
            Some((address - self.base) as usize)
        } else {
            None
        }
    }

    /// Reads `len` bytes at `address`, or `None` if any of them is outside this RAM.
    pub fn read_bytes(&self, address: MemoryAddress, len: usize) -> Option<&[u8]> {
        let offset = self.offset_of(address, len as u64)?;
        self.buffer.read_slice(offset, len)
    }

    /// Reads one byte.
    pub fn read_u8(&self, address: MemoryAddress) -> Option<u8> {
        self.read_bytes(address, 1).map(|b| b[0])
    }

    /// Reads a little-endian word.
    pub fn read_u32(&self, address: MemoryAddress) -> Option<u32> {
        self.read_bytes(address, 4)
            .and_then(|b| b.try_into().ok())
            .map(u32::from_le_bytes)
    }

    /// Reads a little-endian double-word.
    pub fn read_u64(&self, address: MemoryAddress) -> Option<u64> {
        self.read_bytes(address, 8)
            .and_then(|b| b.try_into().ok())
            .map(u64::from_le_bytes)
    }
}

impl MemorySink for Ram {
    fn write(&mut self, address: MemoryAddress, data: &[u8]) -> Result<()> {
        let len = data.len() as u64;
        let offset = self
            .offset_of(address, len)
            .ok_or_else(|| LoadError::range(address, len, "outside RAM"))?;
        if self.buffer.write_slice(offset, data) {
            Ok(())
        } else {
            Err(LoadError::range(address, len, "outside RAM"))
        }
    }

    fn in_range(&self, address: MemoryAddress, len: u64) -> bool {
        self.offset_of(address, len).is_some()
    }

    fn zero(&mut self, address: MemoryAddress, len: u64) -> Result<()> {
        let offset = self
            .offset_of(address, len)
            .ok_or_else(|| LoadError::range(address, len, "outside RAM"))?;
        if self.buffer.fill(offset, len as usize, 0) {
            Ok(())
        } else {
            Err(LoadError::range(address, len, "outside RAM"))
        }
    }
}
