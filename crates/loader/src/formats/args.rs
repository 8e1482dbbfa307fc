//! Program argument block.
//!
//! Programs loaded from an argument vector find their arguments in a fixed block of
//! simulated memory. All fields are little-endian:
//!
//! ```text
//! +0               u32  zero word
//! +4               u32  argc
//! +8               u64  argv[0..argc], absolute address of each string
//! +8 + 8*argc      u32  zero terminator
//! +12 + 8*argc     NUL-terminated argument strings, in order
//! ```
//!
//! The block lives at [`ARGUMENT_BLOCK_BASE`] and may not exceed [`ARGUMENT_BLOCK_CAPACITY`] bytes.
//! `argc` counts the program's arguments only; the executable path is not included.

use std::borrow::Cow;

use super::{Placement, RegionKind};
use crate::common::{AddrRange, AddressWidth, LoadError, MemoryAddress, Result};

/// Address of the argument block.
pub const ARGUMENT_BLOCK_BASE: MemoryAddress = 0x0;

/// Bytes reserved for the argument block.
pub const ARGUMENT_BLOCK_CAPACITY: usize = 1024;

const ARGC_OFFSET: usize = 4;
const ARGV_OFFSET: usize = 8;
const POINTER_SIZE: usize = 8;

/// An encoded argument block ready to be placed in memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArgumentBlock {
    base: MemoryAddress,
    argc: u32,
    bytes: Vec<u8>,
}

impl ArgumentBlock {
    /// Encodes `args` for placement at `base`.
    ///
    /// # Errors
    ///
    /// [`LoadError::Format`] if an argument contains a NUL byte, [`LoadError::Range`] if the
    /// encoded block exceeds [`ARGUMENT_BLOCK_CAPACITY`] or does not fit the address space.
    pub fn encode<S: AsRef<str>>(args: &[S], base: MemoryAddress) -> Result<Self> {
        let argc = args.len();
        let table_len = ARGV_OFFSET + argc * POINTER_SIZE + 4;
        let strings_len: usize = args.iter().map(|a| a.as_ref().len() + 1).sum();
        let total = table_len + strings_len;
        if total > ARGUMENT_BLOCK_CAPACITY {
            return Err(LoadError::range(
                base,
                total as u64,
                format!("argument block exceeds its {ARGUMENT_BLOCK_CAPACITY}-byte reservation"),
            ));
        }
        let _ = AddrRange::new(base, total as u64, AddressWidth::Bits64)?;

        let mut bytes = vec![0u8; table_len];
        bytes[ARGC_OFFSET..ARGV_OFFSET].copy_from_slice(&(argc as u32).to_le_bytes());
        for (i, arg) in args.iter().enumerate() {
            let arg = arg.as_ref();
            if arg.contains('\0') {
                return Err(LoadError::format(format!(
                    "argument {i} contains a NUL byte"
                )));
            }
            let ptr = base + bytes.len() as u64;
            let slot = ARGV_OFFSET + i * POINTER_SIZE;
            bytes[slot..slot + POINTER_SIZE].copy_from_slice(&ptr.to_le_bytes());
            bytes.extend_from_slice(arg.as_bytes());
            bytes.push(0);
        }

        Ok(Self {
            base,
            argc: argc as u32,
            bytes,
        })
    }

    /// Address the block is encoded for.
    pub const fn base(&self) -> MemoryAddress {
        self.base
    }

    /// Number of arguments.
    pub const fn argc(&self) -> u32 {
        self.argc
    }

    /// Encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Memory covered by the block.
    pub const fn range(&self) -> AddrRange {
        AddrRange {
            start: self.base,
            len: self.bytes.len() as u64,
        }
    }

    /// Returns the block as a placement.
    pub fn placement(&self) -> Placement<'_> {
        Placement {
            kind: RegionKind::Arguments,
            address: self.base,
            data: Cow::Borrowed(&self.bytes),
            zero_fill: 0,
        }
    }

    /// Reads the arguments back out of a block that was placed at `base`.
    ///
    /// # Errors
    ///
    /// [`LoadError::Format`] if the block does not follow the layout.
    pub fn decode(bytes: &[u8], base: MemoryAddress) -> Result<Vec<String>> {
        if read_u32(bytes, 0)? != 0 {
            return Err(LoadError::format("argument block does not start with a zero word"));
        }
        let argc = read_u32(bytes, ARGC_OFFSET)? as usize;
        let terminator = argc
            .checked_mul(POINTER_SIZE)
            .and_then(|n| n.checked_add(ARGV_OFFSET))
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| LoadError::format(format!("argc {argc} exceeds the block")))?;
        if read_u32(bytes, terminator)? != 0 {
            return Err(LoadError::format("argument pointer table is not zero-terminated"));
        }

        (0..argc)
            .map(|i| {
                let ptr = read_u64(bytes, ARGV_OFFSET + i * POINTER_SIZE)?;
                let start = ptr
                    .checked_sub(base)
                    .and_then(|off| usize::try_from(off).ok())
                    .filter(|&off| off < bytes.len())
                    .ok_or_else(|| {
                        LoadError::format(format!("argv[{i}] = {ptr:#x} points outside the block"))
                    })?;
                let len = bytes[start..]
                    .iter()
                    .position(|&b| b == 0)
                    .ok_or_else(|| LoadError::format(format!("argv[{i}] is not NUL-terminated")))?;
                String::from_utf8(bytes[start..start + len].to_vec())
                    .map_err(|_| LoadError::format(format!("argv[{i}] is not valid UTF-8")))
            })
            .collect()
    }
}

fn read_u32(bytes: &[u8], at: usize) -> Result<u32> {
    bytes
        .get(at..at + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_le_bytes)
        .ok_or_else(|| LoadError::format("argument block truncated"))
}

fn read_u64(bytes: &[u8], at: usize) -> Result<u64> {
    bytes
        .get(at..at + 8)
        .and_then(|b| b.try_into().ok())
        .map(u64::from_le_bytes)
        .ok_or_else(|| LoadError::format("argument block truncated"))
}
