//! Simulated address arithmetic.
//!
//! This module defines the address type shared by the parsers and the memory sink. It provides:
//! 1. **Address Width:** The width of the target address space, derived from the image class.
//! 2. **Ranges:** Half-open address ranges with overflow-checked construction.
//! 3. **Alignment:** Checked round-up used by the boot-image item walk and payload placement.

use super::error::{LoadError, Result};

/// A location in the simulated address space.
pub type MemoryAddress = u64;

/// Width of the target address space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressWidth {
    /// 32-bit addresses (ELFCLASS32).
    Bits32,
    /// 64-bit addresses (ELFCLASS64, boot images).
    Bits64,
}

impl AddressWidth {
    /// Returns one past the highest representable address, as a `u128` so the
    /// 64-bit case does not wrap.
    pub const fn limit(self) -> u128 {
        match self {
            Self::Bits32 => 1 << 32,
            Self::Bits64 => 1 << 64,
        }
    }
}

/// A half-open range `[start, start + len)` of simulated memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct AddrRange {
    /// First address in the range.
    pub start: MemoryAddress,
    /// Length in bytes.
    pub len: u64,
}

impl AddrRange {
    /// Creates a range, failing with [`LoadError::Range`] if its end does not fit in `width`.
    pub fn new(start: MemoryAddress, len: u64, width: AddressWidth) -> Result<Self> {
        let end = start as u128 + len as u128;
        if end > width.limit() {
            return Err(LoadError::range(
                start,
                len,
                "end of range overflows the address space",
            ));
        }
        Ok(Self { start, len })
    }

    /// One past the last byte, widened so a range ending exactly at 2^64 is representable.
    #[inline]
    pub const fn end(&self) -> u128 {
        self.start as u128 + self.len as u128
    }

    /// Returns `true` if the range covers no bytes.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns `true` if both ranges share at least one byte.
    pub const fn overlaps(&self, other: &Self) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && (self.start as u128) < other.end()
            && (other.start as u128) < self.end()
    }

    /// Returns `true` if `other` lies entirely inside this range.
    pub const fn contains(&self, other: &Self) -> bool {
        other.start >= self.start && other.end() <= self.end()
    }
}

/// Offsets `addr` by `offset`, failing with [`LoadError::Range`] on overflow.
pub fn offset_by(addr: MemoryAddress, offset: u64) -> Result<MemoryAddress> {
    addr.checked_add(offset)
        .ok_or_else(|| LoadError::range(addr, offset, "load offset overflows the address space"))
}

/// Rounds `value` up to a multiple of `align` (a power of two), or `None` on overflow.
#[inline]
pub const fn align_up(value: u64, align: u64) -> Option<u64> {
    debug_assert!(align.is_power_of_two());
    match value.checked_add(align - 1) {
        Some(v) => Some(v & !(align - 1)),
        None => None,
    }
}
