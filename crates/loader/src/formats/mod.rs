//! Image container formats.
//!
//! This module groups the parsers that turn a file's bytes into a placement plan. It provides:
//! 1. **ELF:** File header, loadable segments and symbol table decoding.
//! 2. **ZBI:** Boot-image container and item decoding with checksum validation.
//! 3. **Arguments:** The in-memory argument block handed to programs loaded with an argument vector.
//! 4. **Plans:** [`Placement`], the validated unit of work the loader commits to memory.
//!
//! Parsers never touch memory. They validate the whole image and return placements; the
//! [`sim::loader`](crate::sim::loader) functions write those placements only once every check passed.

/// Program argument block encoding and decoding.
pub mod args;

/// ELF executable decoding.
pub mod elf;

/// ZBI boot-image decoding.
pub mod zbi;

use std::borrow::Cow;
use std::fmt;

use serde::Deserialize;

use crate::common::{AddrRange, MemoryAddress};

/// Container format of a program image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// Executable and Linkable Format.
    Elf,
    /// Zircon boot image.
    Zbi,
    /// Flat binary copied verbatim.
    Raw,
}

impl ImageFormat {
    /// Guesses the format from the leading bytes of an image.
    ///
    /// ELF is recognised by its magic, ZBI by a container header; anything else is raw.
    pub fn detect(bytes: &[u8]) -> Self {
        if elf::has_elf_magic(bytes) {
            Self::Elf
        } else if zbi::has_container_header(bytes) {
            Self::Zbi
        } else {
            Self::Raw
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Elf => "elf",
            Self::Zbi => "zbi",
            Self::Raw => "raw",
        })
    }
}

/// What a placed region holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RegionKind {
    /// An ELF `PT_LOAD` segment.
    Segment,
    /// The program argument block.
    Arguments,
    /// A ZBI kernel payload.
    Kernel,
    /// A ZBI ramdisk payload.
    Ramdisk,
    /// A ZBI command line payload.
    Cmdline,
    /// A flat binary.
    Raw,
}

/// One validated write: `data` at `address`, followed by `zero_fill` zero bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Placement<'a> {
    /// What this region holds.
    pub kind: RegionKind,
    /// Destination of the first byte.
    pub address: MemoryAddress,
    /// Bytes copied from the image (or synthesised, for the argument block).
    pub data: Cow<'a, [u8]>,
    /// Zero bytes written after `data`.
    pub zero_fill: u64,
}

impl Placement<'_> {
    /// Total bytes this placement covers.
    pub fn len(&self) -> u64 {
        self.data.len() as u64 + self.zero_fill
    }

    /// Returns `true` if nothing is written.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Destination range covered by the placement.
    pub fn range(&self) -> AddrRange {
        AddrRange {
            start: self.address,
            len: self.len(),
        }
    }
}
