//! Program Loader and Symbol Resolver.
//!
//! This module is the entry point used by simulation drivers. It performs:
//! 1. **Image loading:** Reads an ELF, ZBI or raw image from disk and places it in a [`MemorySink`].
//! 2. **Argument injection:** Loads an executable named by an argument vector and writes the
//!    remaining arguments as an [`ArgumentBlock`].
//! 3. **Symbol resolution:** Answers entry-point and symbol-address queries without loading anything.
//!
//! Every load validates first and writes second. Parsing, destination checks against the sink
//! and overlap checks all complete before the first write, so a rejected image leaves memory
//! untouched. Nothing is cached between calls.

use std::fs;
use std::path::Path;

use crate::common::{AddrRange, AddressWidth, LoadError, MemoryAddress, Result};
use crate::formats::args::{ARGUMENT_BLOCK_BASE, ArgumentBlock};
use crate::formats::elf::{self, ElfHeader, ElfImage, SymbolEntry};
use crate::formats::zbi::ZbiImage;
use crate::formats::{ImageFormat, Placement, RegionKind};
use crate::memory::MemorySink;

/// A region written by a load.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadedRegion {
    /// What the region holds.
    pub kind: RegionKind,
    /// Memory covered, including zero fill.
    pub range: AddrRange,
    /// Bytes copied from the image; the rest of `range` was zero-filled.
    pub copied: u64,
}

/// Outcome of a successful load.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadSummary {
    /// Format the image was loaded as.
    pub format: ImageFormat,
    /// Address execution should start at, when the format records one.
    pub entry: Option<MemoryAddress>,
    /// Regions written, in write order.
    pub regions: Vec<LoadedRegion>,
}

impl LoadSummary {
    /// Total bytes written, including zero fill.
    pub fn bytes_written(&self) -> u64 {
        self.regions.iter().map(|r| r.range.len).sum()
    }
}

/// Reads a whole image file.
///
/// # Errors
///
/// [`LoadError::Io`] if the file cannot be opened or read.
pub fn read_image(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| LoadError::io(path, e))
}

/// Loads every `PT_LOAD` segment of the executable at `path`, shifted by `offset`.
///
/// The entry in the summary is the header's entry point shifted by the same offset.
///
/// # Errors
///
/// [`LoadError::Io`], [`LoadError::Format`] or [`LoadError::Range`]; memory is untouched on failure.
pub fn load_elf<M: MemorySink + ?Sized>(
    path: &Path,
    offset: u64,
    memory: &mut M,
) -> Result<LoadSummary> {
    let data = read_image(path)?;
    load_elf_bytes(&data, offset, memory)
}

/// Like [`load_elf`], for an image already in memory.
///
/// # Errors
///
/// See [`load_elf`].
pub fn load_elf_bytes<M: MemorySink + ?Sized>(
    data: &[u8],
    offset: u64,
    memory: &mut M,
) -> Result<LoadSummary> {
    let image = ElfImage::parse(data)?;
    let placements = image.placements(offset)?;
    let entry = image.entry_at(offset)?;
    commit(ImageFormat::Elf, Some(entry), &placements, memory)
}

/// Loads the executable named by `argv[0]` and places `argv[1..]` in an [`ArgumentBlock`]
/// at [`ARGUMENT_BLOCK_BASE`].
///
/// # Errors
///
/// [`LoadError::Format`] if `argv` is empty or the image is malformed, [`LoadError::Range`] if
/// the block does not fit its reservation or collides with a segment, [`LoadError::Io`] if
/// the executable cannot be read. Memory is untouched on failure.
pub fn load_elf_with_args<S, M>(argv: &[S], memory: &mut M) -> Result<LoadSummary>
where
    S: AsRef<str>,
    M: MemorySink + ?Sized,
{
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| LoadError::format("no binary file specified"))?;
    let block = ArgumentBlock::encode(args, ARGUMENT_BLOCK_BASE)?;
    let data = read_image(Path::new(program.as_ref()))?;
    let image = ElfImage::parse(&data)?;

    let mut placements = vec![block.placement()];
    placements.extend(image.placements(0)?);
    commit(ImageFormat::Elf, Some(image.entry()), &placements, memory)
}

/// Loads the recognised payloads of the boot image at `path`, starting at `offset`.
///
/// # Errors
///
/// [`LoadError::Io`], [`LoadError::Format`], [`LoadError::Integrity`] or [`LoadError::Range`];
/// memory is untouched on failure.
pub fn load_zbi<M: MemorySink + ?Sized>(
    path: &Path,
    offset: u64,
    memory: &mut M,
) -> Result<LoadSummary> {
    let data = read_image(path)?;
    load_zbi_bytes(&data, offset, memory)
}

/// Like [`load_zbi`], for an image already in memory.
///
/// # Errors
///
/// See [`load_zbi`].
pub fn load_zbi_bytes<M: MemorySink + ?Sized>(
    data: &[u8],
    offset: u64,
    memory: &mut M,
) -> Result<LoadSummary> {
    let image = ZbiImage::parse(data)?;
    let plan = image.plan(offset)?;
    commit(ImageFormat::Zbi, plan.entry, &plan.placements, memory)
}

/// Copies the file at `path` verbatim to `offset`.
///
/// # Errors
///
/// [`LoadError::Io`] or [`LoadError::Range`]; memory is untouched on failure.
pub fn load_raw<M: MemorySink + ?Sized>(
    path: &Path,
    offset: u64,
    memory: &mut M,
) -> Result<LoadSummary> {
    let data = read_image(path)?;
    load_raw_bytes(&data, offset, memory)
}

/// Like [`load_raw`], for an image already in memory.
///
/// # Errors
///
/// See [`load_raw`].
pub fn load_raw_bytes<M: MemorySink + ?Sized>(
    data: &[u8],
    offset: u64,
    memory: &mut M,
) -> Result<LoadSummary> {
    let range = AddrRange::new(offset, data.len() as u64, AddressWidth::Bits64)?;
    let placement = Placement {
        kind: RegionKind::Raw,
        address: range.start,
        data: data.into(),
        zero_fill: 0,
    };
    commit(ImageFormat::Raw, None, &[placement], memory)
}

/// Loads the image at `path` as `format`, or as the format detected from its contents.
///
/// # Errors
///
/// Whatever the selected loader reports.
pub fn load_image<M: MemorySink + ?Sized>(
    path: &Path,
    offset: u64,
    format: Option<ImageFormat>,
    memory: &mut M,
) -> Result<LoadSummary> {
    let data = read_image(path)?;
    let format = format.unwrap_or_else(|| ImageFormat::detect(&data));
    tracing::debug!(path = %path.display(), %format, offset, "loading image");
    match format {
        ImageFormat::Elf => load_elf_bytes(&data, offset, memory),
        ImageFormat::Zbi => load_zbi_bytes(&data, offset, memory),
        ImageFormat::Raw => load_raw_bytes(&data, offset, memory),
    }
}

/// Returns the entry point recorded in the header of the executable at `path`.
///
/// Only the file header is decoded; no load is needed.
///
/// # Errors
///
/// [`LoadError::Io`] or [`LoadError::Format`].
pub fn entry_point(path: &Path) -> Result<MemoryAddress> {
    let data = read_image(path)?;
    Ok(ElfHeader::parse(&data)?.entry)
}

/// Returns the address of `symbol` in the executable at `path`.
///
/// When several entries share the name, the first global wins, then the first weak one,
/// then the first of any other binding.
///
/// # Errors
///
/// [`LoadError::Format`] if the image has no symbol table, [`LoadError::SymbolNotFound`] if
/// no entry is named `symbol`, [`LoadError::Io`] if the file cannot be read.
pub fn symbol_location(path: &Path, symbol: &str) -> Result<MemoryAddress> {
    let symbols = symbols(path)?;
    elf::lookup(&symbols, symbol)
        .map(|s| s.value)
        .ok_or_else(|| {
            tracing::warn!(symbol, path = %path.display(), "symbol not found");
            LoadError::SymbolNotFound(symbol.to_string())
        })
}

/// Returns every defined, named symbol of the executable at `path`, in table order.
///
/// # Errors
///
/// [`LoadError::Io`] or [`LoadError::Format`].
pub fn symbols(path: &Path) -> Result<Vec<SymbolEntry>> {
    let data = read_image(path)?;
    elf::symbol_table(&data)
}

/// Checks every placement against the sink and each other.
fn validate<M: MemorySink + ?Sized>(placements: &[Placement<'_>], memory: &M) -> Result<()> {
    for p in placements {
        if !memory.in_range(p.address, p.len()) {
            return Err(LoadError::range(
                p.address,
                p.len(),
                format!("{:?} region is outside writable memory", p.kind),
            ));
        }
    }
    // Non-empty ranges sorted by start are disjoint iff every neighbour pair is.
    let mut sorted: Vec<&Placement<'_>> =
        placements.iter().filter(|p| !p.is_empty()).collect();
    sorted.sort_by_key(|p| p.address);
    for pair in sorted.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if a.range().overlaps(&b.range()) {
            return Err(LoadError::range(
                b.address,
                b.len(),
                format!("{:?} region overlaps {:?} region at {:#x}", b.kind, a.kind, a.address),
            ));
        }
    }
    Ok(())
}

/// Validates `placements` and then writes them in order.
fn commit<M: MemorySink + ?Sized>(
    format: ImageFormat,
    entry: Option<MemoryAddress>,
    placements: &[Placement<'_>],
    memory: &mut M,
) -> Result<LoadSummary> {
    validate(placements, memory)?;

    let mut regions = Vec::with_capacity(placements.len());
    for p in placements {
        memory.write(p.address, &p.data)?;
        if p.zero_fill > 0 {
            memory.zero(p.address + p.data.len() as u64, p.zero_fill)?;
        }
        tracing::debug!(
            kind = ?p.kind,
            address = p.address,
            copied = p.data.len(),
            zeroed = p.zero_fill,
            "placed region"
        );
        regions.push(LoadedRegion {
            kind: p.kind,
            range: p.range(),
            copied: p.data.len() as u64,
        });
    }

    let summary = LoadSummary {
        format,
        entry,
        regions,
    };
    tracing::info!(
        %format,
        entry = ?summary.entry,
        regions = summary.regions.len(),
        bytes = summary.bytes_written(),
        "image loaded"
    );
    Ok(summary)
}
