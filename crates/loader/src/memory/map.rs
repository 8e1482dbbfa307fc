//! Address map for the loader's view of the system.
//!
//! This module implements the region map that routes loader writes. It provides:
//! 1. **Region registration:** RAM and device regions are added by address range, kept sorted and disjoint.
//! 2. **Write routing:** A write must land entirely inside one RAM region; device and unmapped ranges are rejected.
//! 3. **Read-back:** Byte, word and slice reads for tests and inspection tooling.

use super::{MemorySink, Ram};
use crate::common::{AddrRange, AddressWidth, LoadError, MemoryAddress, Result};

/// One entry of the [`MemoryMap`].
#[derive(Debug)]
pub enum Region {
    /// Writable RAM.
    Ram(Ram),
    /// A memory-mapped device; the loader may not write here.
    Device {
        /// Short device name (e.g. `"UART0"`).
        name: String,
        /// Address range claimed by the device.
        range: AddrRange,
    },
}

impl Region {
    /// Returns the address range covered by this region.
    pub const fn range(&self) -> AddrRange {
        match self {
            Self::Ram(ram) => ram.range(),
            Self::Device { range, .. } => *range,
        }
    }
}

/// Sorted, non-overlapping set of [`Region`]s.
#[derive(Debug, Default)]
pub struct MemoryMap {
    regions: Vec<Region>,
}

impl MemoryMap {
    /// Creates an empty map; add regions with [`MemoryMap::add_ram`] and [`MemoryMap::add_device`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a map holding a single RAM region.
    ///
    /// # Errors
    ///
    /// [`LoadError::Range`] if the region does not fit the address space.
    pub fn with_ram(base: MemoryAddress, size: usize) -> Result<Self> {
        let mut map = Self::new();
        map.add_ram(base, size)?;
        Ok(map)
    }

    /// Maps `size` bytes of zeroed RAM at `base`.
    ///
    /// # Errors
    ///
    /// [`LoadError::Range`] if the region overlaps an existing one or overflows.
    pub fn add_ram(&mut self, base: MemoryAddress, size: usize) -> Result<()> {
        self.insert(Region::Ram(Ram::new(base, size)?))
    }

    /// Reserves `[base, base + size)` for a device.
    ///
    /// # Errors
    ///
    /// [`LoadError::Range`] if the region overlaps an existing one or overflows.
    pub fn add_device(&mut self, name: &str, base: MemoryAddress, size: u64) -> Result<()> {
        let range = AddrRange::new(base, size, AddressWidth::Bits64)?;
        self.insert(Region::Device {
            name: name.to_string(),
            range,
        })
    }

    fn insert(&mut self, region: Region) -> Result<()> {
        let range = region.range();
        if let Some(clash) = self.regions.iter().find(|r| r.range().overlaps(&range)) {
            let other = clash.range();
            return Err(LoadError::range(
                range.start,
                range.len,
                format!(
                    "overlaps region {:#x}+{:#x}",
                    other.start, other.len
                ),
            ));
        }
        self.regions.push(region);
        self.regions.sort_by_key(|r| r.range().start);
        Ok(())
    }

    /// Returns the registered regions in address order.
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    fn find(&self, address: MemoryAddress) -> Option<&Region> {
        let idx = self
            .regions
            .partition_point(|r| r.range().start <= address)
            .checked_sub(1)?;
        let region = &self.regions[idx];
        ((address as u128) < region.range().end()).then_some(region)
    }

    fn find_ram_mut(&mut self, address: MemoryAddress, len: u64) -> Result<&mut Ram> {
        let want = AddrRange { start: address, len };
        let idx = self
            .regions
            .partition_point(|r| r.range().start <= address)
            .checked_sub(1)
            .ok_or_else(|| LoadError::range(address, len, "unmapped address"))?;
        let region = &self.regions[idx];
        let range = region.range();
        if (address as u128) >= range.end() {
            return Err(LoadError::range(address, len, "unmapped address"));
        }
        if let Region::Device { name, .. } = region {
            return Err(LoadError::range(
                address,
                len,
                format!("device region {name}"),
            ));
        }
        if !range.contains(&want) {
            return Err(LoadError::range(address, len, "crosses the end of RAM"));
        }
        let Region::Ram(ram) = &mut self.regions[idx] else {
            return Err(LoadError::range(address, len, "unmapped address"));
        };
        Ok(ram)
    }

    fn ram_at(&self, address: MemoryAddress) -> Option<&Ram> {
        match self.find(address)? {
            Region::Ram(ram) => Some(ram),
            Region::Device { .. } => None,
        }
    }

    /// Reads `len` bytes at `address` if they all lie in one RAM region.
    pub fn read_bytes(&self, address: MemoryAddress, len: usize) -> Option<&[u8]> {
        self.ram_at(address)?.read_bytes(address, len)
    }

    /// Reads one byte from RAM.
    pub fn read_u8(&self, address: MemoryAddress) -> Option<u8> {
        self.ram_at(address)?.read_u8(address)
    }

    /// Reads a little-endian word from RAM.
    pub fn read_u32(&self, address: MemoryAddress) -> Option<u32> {
        self.ram_at(address)?.read_u32(address)
    }

    /// Reads a little-endian double-word from RAM.
    pub fn read_u64(&self, address: MemoryAddress) -> Option<u64> {
        self.ram_at(address)?.read_u64(address)
    }
}

impl MemorySink for MemoryMap {
    fn write(&mut self, address: MemoryAddress, data: &[u8]) -> Result<()> {
        self.find_ram_mut(address, data.len() as u64)?
            .write(address, data)
    }

    fn in_range(&self, address: MemoryAddress, len: u64) -> bool {
        let want = AddrRange { start: address, len };
        match self.find(address) {
            Some(Region::Ram(ram)) => ram.range().contains(&want),
            _ => false,
        }
    }

    fn zero(&mut self, address: MemoryAddress, len: u64) -> Result<()> {
        self.find_ram_mut(address, len)?.zero(address, len)
    }
}
