//! ELF executable decoding.
//!
//! This module validates ELF images and extracts what the loader and the symbol resolver need:
//! 1. **Header:** Identification (magic, class, data encoding, version), type, machine and entry point.
//! 2. **Segments:** The program-header table, bounds-checked against the file, with loadable
//!    segments checked for `memsz >= filesz` and pairwise overlap.
//! 3. **Placements:** Destination ranges for every loadable segment, with BSS zero-fill.
//! 4. **Symbols:** The `SHT_SYMTAB` table and its string table, with deterministic name lookup.
//!
//! Both ELFCLASS32 and ELFCLASS64 are accepted in either byte order. Table parsing is
//! delegated to the `object` crate; everything it returns is re-checked against the file size
//! before use.

use std::borrow::Cow;

use object::Endianness;
use object::elf;
use object::read::elf::{FileHeader, ProgramHeader, SectionHeader, Sym};

use super::{Placement, RegionKind};
use crate::common::{AddrRange, AddressWidth, LoadError, MemoryAddress, Result, addr};

/// Machine type of RISC-V executables.
pub const EM_RISCV: u16 = elf::EM_RISCV;

const EI_CLASS: usize = 4;
const EI_DATA: usize = 5;
const EI_VERSION: usize = 6;
const EI_NIDENT: usize = 16;

/// Returns `true` if `bytes` starts with the ELF magic.
pub fn has_elf_magic(bytes: &[u8]) -> bool {
    bytes.starts_with(&elf::ELFMAG)
}

/// Fields of the ELF file header the loader relies on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ElfHeader {
    /// Address width implied by the ELF class.
    pub width: AddressWidth,
    /// `true` for ELFDATA2MSB images.
    pub big_endian: bool,
    /// Object file type (`ET_EXEC` or `ET_DYN`).
    pub file_type: u16,
    /// Target machine.
    pub machine: u16,
    /// Address of the first instruction.
    pub entry: MemoryAddress,
}

impl ElfHeader {
    /// Decodes and validates the file header of a RISC-V executable.
    ///
    /// # Errors
    ///
    /// [`LoadError::Format`] on a bad identification, an unsupported file type or a foreign machine.
    pub fn parse(data: &[u8]) -> Result<Self> {
        Self::parse_for_machine(data, EM_RISCV)
    }

    /// Decodes and validates the file header, expecting `machine` in `e_machine`.
    ///
    /// # Errors
    ///
    /// [`LoadError::Format`] on any header violation.
    pub fn parse_for_machine(data: &[u8], machine: u16) -> Result<Self> {
        let width = identify(data)?;
        let header = match width {
            AddressWidth::Bits32 => read_header::<elf::FileHeader32<Endianness>>(data, width)?,
            AddressWidth::Bits64 => read_header::<elf::FileHeader64<Endianness>>(data, width)?,
        };
        if header.machine != machine {
            return Err(LoadError::format(format!(
                "machine type {} does not match expected {machine}",
                header.machine
            )));
        }
        if header.file_type != elf::ET_EXEC && header.file_type != elf::ET_DYN {
            return Err(LoadError::format(format!(
                "ELF type {} is not an executable",
                header.file_type
            )));
        }
        Ok(header)
    }
}

/// Checks the identification bytes and returns the image's address width.
fn identify(data: &[u8]) -> Result<AddressWidth> {
    if data.len() < EI_NIDENT {
        return Err(LoadError::format("file too short for an ELF identification"));
    }
    if !has_elf_magic(data) {
        return Err(LoadError::format("bad ELF magic"));
    }
    let width = match data[EI_CLASS] {
        elf::ELFCLASS32 => AddressWidth::Bits32,
        elf::ELFCLASS64 => AddressWidth::Bits64,
        other => return Err(LoadError::format(format!("unsupported ELF class {other}"))),
    };
    match data[EI_DATA] {
        elf::ELFDATA2LSB | elf::ELFDATA2MSB => {}
        other => {
            return Err(LoadError::format(format!(
                "unsupported ELF data encoding {other}"
            )));
        }
    }
    if data[EI_VERSION] != elf::EV_CURRENT {
        return Err(LoadError::format(format!(
            "unsupported ELF version {}",
            data[EI_VERSION]
        )));
    }
    Ok(width)
}

fn read_header<Elf: FileHeader<Endian = Endianness>>(
    data: &[u8],
    width: AddressWidth,
) -> Result<ElfHeader> {
    let header = Elf::parse(data)?;
    let endian = header.endian()?;
    Ok(ElfHeader {
        width,
        big_endian: endian == Endianness::Big,
        file_type: header.e_type(endian),
        machine: header.e_machine(endian),
        entry: header.e_entry(endian).into(),
    })
}

/// Permission bits of a segment (`PF_R`, `PF_W`, `PF_X`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SegmentFlags(pub u32);

impl SegmentFlags {
    /// Segment is readable.
    pub const fn readable(self) -> bool {
        self.0 & elf::PF_R != 0
    }

    /// Segment is writable.
    pub const fn writable(self) -> bool {
        self.0 & elf::PF_W != 0
    }

    /// Segment is executable.
    pub const fn executable(self) -> bool {
        self.0 & elf::PF_X != 0
    }
}

/// One program-header entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadableSegment {
    /// Segment type (`p_type`); only `PT_LOAD` is placed in memory.
    pub p_type: u32,
    /// Permission flags.
    pub flags: SegmentFlags,
    /// Offset of the segment contents in the file.
    pub file_offset: u64,
    /// Bytes present in the file.
    pub file_size: u64,
    /// Bytes occupied in memory; the tail beyond `file_size` is zero-filled.
    pub mem_size: u64,
    /// Virtual address of the first byte.
    pub vaddr: MemoryAddress,
    /// Required alignment.
    pub align: u64,
}

impl LoadableSegment {
    /// Returns `true` for `PT_LOAD` entries.
    pub const fn is_loadable(&self) -> bool {
        self.p_type == elf::PT_LOAD
    }
}

/// A validated ELF executable borrowed from its file contents.
#[derive(Clone, Debug)]
pub struct ElfImage<'data> {
    data: &'data [u8],
    header: ElfHeader,
    segments: Vec<LoadableSegment>,
}

impl<'data> ElfImage<'data> {
    /// Parses and validates a RISC-V executable.
    ///
    /// # Errors
    ///
    /// [`LoadError::Format`] on any structural violation, including overlapping loadable segments.
    pub fn parse(data: &'data [u8]) -> Result<Self> {
        Self::parse_for_machine(data, EM_RISCV)
    }

    /// Parses and validates an executable for `machine`.
    ///
    /// # Errors
    ///
    /// [`LoadError::Format`] on any structural violation.
    pub fn parse_for_machine(data: &'data [u8], machine: u16) -> Result<Self> {
        let header = ElfHeader::parse_for_machine(data, machine)?;
        let segments = match header.width {
            AddressWidth::Bits32 => read_segments::<elf::FileHeader32<Endianness>>(data)?,
            AddressWidth::Bits64 => read_segments::<elf::FileHeader64<Endianness>>(data)?,
        };
        check_segments(&segments, data.len() as u64)?;
        Ok(Self {
            data,
            header,
            segments,
        })
    }

    /// Returns the decoded file header.
    pub const fn header(&self) -> &ElfHeader {
        &self.header
    }

    /// Returns the entry point recorded in the file header.
    pub const fn entry(&self) -> MemoryAddress {
        self.header.entry
    }

    /// Returns the entry point shifted by `offset`.
    ///
    /// # Errors
    ///
    /// [`LoadError::Range`] if the shifted entry does not fit the image's address width.
    pub fn entry_at(&self, offset: u64) -> Result<MemoryAddress> {
        let entry = addr::offset_by(self.header.entry, offset)?;
        if u128::from(entry) >= self.header.width.limit() {
            return Err(LoadError::range(
                self.header.entry,
                offset,
                "shifted entry point does not fit the address width",
            ));
        }
        Ok(entry)
    }

    /// Returns every program-header entry in table order.
    pub fn segments(&self) -> &[LoadableSegment] {
        &self.segments
    }

    /// Returns the `PT_LOAD` entries in table order.
    pub fn loadable_segments(&self) -> impl Iterator<Item = &LoadableSegment> {
        self.segments.iter().filter(|s| s.is_loadable())
    }

    /// Returns the file contents of a segment.
    ///
    /// Bounds were validated during parsing, so this only fails for a segment not taken from this image.
    pub fn segment_data(&self, segment: &LoadableSegment) -> Option<&'data [u8]> {
        let start = usize::try_from(segment.file_offset).ok()?;
        let len = usize::try_from(segment.file_size).ok()?;
        self.data.get(start..start.checked_add(len)?)
    }

    /// Computes where every loadable segment lands once shifted by `offset`.
    ///
    /// Zero-sized segments produce no placement.
    ///
    /// # Errors
    ///
    /// [`LoadError::Range`] if a destination does not fit the image's address width.
    pub fn placements(&self, offset: u64) -> Result<Vec<Placement<'data>>> {
        let mut out = Vec::new();
        for seg in self.loadable_segments() {
            if seg.mem_size == 0 {
                tracing::debug!(vaddr = seg.vaddr, "skipping empty PT_LOAD segment");
                continue;
            }
            let dest = addr::offset_by(seg.vaddr, offset)?;
            let range = AddrRange::new(dest, seg.mem_size, self.header.width)?;
            let data = self
                .segment_data(seg)
                .ok_or_else(|| LoadError::format("segment contents outside the file"))?;
            out.push(Placement {
                kind: RegionKind::Segment,
                address: range.start,
                data: Cow::Borrowed(data),
                zero_fill: seg.mem_size - seg.file_size,
            });
        }
        Ok(out)
    }

    /// Decodes the symbol table.
    ///
    /// Undefined and unnamed entries are omitted.
    ///
    /// # Errors
    ///
    /// [`LoadError::Format`] if the image has no `SHT_SYMTAB` section or the table is malformed.
    pub fn symbols(&self) -> Result<Vec<SymbolEntry>> {
        symbols_for(self.data, self.header.width)
    }

    /// Looks up `name` in the symbol table.
    ///
    /// # Errors
    ///
    /// [`LoadError::Format`] if there is no symbol table, [`LoadError::SymbolNotFound`] if no entry matches.
    pub fn find_symbol(&self, name: &str) -> Result<SymbolEntry> {
        let symbols = self.symbols()?;
        lookup(&symbols, name)
            .cloned()
            .ok_or_else(|| LoadError::SymbolNotFound(name.to_string()))
    }
}

fn read_segments<Elf: FileHeader<Endian = Endianness>>(
    data: &[u8],
) -> Result<Vec<LoadableSegment>> {
    let header = Elf::parse(data)?;
    let endian = header.endian()?;

    let count = header.phnum(endian, data)?;
    if count > 0 {
        let phoff: u64 = header.e_phoff(endian).into();
        let entsize = u64::from(header.e_phentsize(endian));
        if entsize != std::mem::size_of::<Elf::ProgramHeader>() as u64 {
            return Err(LoadError::format(format!(
                "program header entry size {entsize} is invalid"
            )));
        }
        let table_end = (count as u64)
            .checked_mul(entsize)
            .and_then(|size| size.checked_add(phoff))
            .ok_or_else(|| LoadError::format("program header table size overflows"))?;
        if table_end > data.len() as u64 {
            return Err(LoadError::format(format!(
                "program header table ({count} entries at {phoff:#x}) extends past end of file"
            )));
        }
    }

    let table = header.program_headers(endian, data)?;
    Ok(table
        .iter()
        .map(|ph| LoadableSegment {
            p_type: ph.p_type(endian),
            flags: SegmentFlags(ph.p_flags(endian)),
            file_offset: ph.p_offset(endian).into(),
            file_size: ph.p_filesz(endian).into(),
            mem_size: ph.p_memsz(endian).into(),
            vaddr: ph.p_vaddr(endian).into(),
            align: ph.p_align(endian).into(),
        })
        .collect())
}

fn check_segments(segments: &[LoadableSegment], file_len: u64) -> Result<()> {
    let mut spans: Vec<(u128, u128)> = Vec::new();
    for (idx, seg) in segments.iter().enumerate() {
        if !seg.is_loadable() {
            continue;
        }
        if seg.file_size > seg.mem_size {
            return Err(LoadError::format(format!(
                "segment {idx}: file size {:#x} exceeds memory size {:#x}",
                seg.file_size, seg.mem_size
            )));
        }
        let file_end = seg.file_offset.checked_add(seg.file_size);
        if file_end.is_none_or(|end| end > file_len) {
            return Err(LoadError::format(format!(
                "segment {idx}: contents {:#x}+{:#x} extend past end of file",
                seg.file_offset, seg.file_size
            )));
        }
        if seg.mem_size > 0 {
            let start = seg.vaddr as u128;
            spans.push((start, start + seg.mem_size as u128));
        }
    }

    spans.sort_unstable();
    if let Some(pair) = spans.windows(2).find(|w| w[1].0 < w[0].1) {
        return Err(LoadError::format(format!(
            "loadable segments at {:#x} and {:#x} overlap",
            pair[0].0, pair[1].0
        )));
    }
    Ok(())
}

/// Symbol binding (`STB_*`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SymbolBinding {
    /// `STB_LOCAL`.
    Local,
    /// `STB_GLOBAL`.
    Global,
    /// `STB_WEAK`.
    Weak,
    /// Any other (OS- or processor-specific) binding.
    Other(u8),
}

impl SymbolBinding {
    const fn from_raw(bind: u8) -> Self {
        match bind {
            elf::STB_LOCAL => Self::Local,
            elf::STB_GLOBAL => Self::Global,
            elf::STB_WEAK => Self::Weak,
            other => Self::Other(other),
        }
    }

    /// Lookup preference: globals first, then weak, then everything else.
    const fn rank(self) -> u8 {
        match self {
            Self::Global => 0,
            Self::Weak => 1,
            Self::Local | Self::Other(_) => 2,
        }
    }
}

/// Symbol visibility (`STV_*`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SymbolVisibility {
    /// `STV_DEFAULT`.
    Default,
    /// `STV_INTERNAL`.
    Internal,
    /// `STV_HIDDEN`.
    Hidden,
    /// `STV_PROTECTED`.
    Protected,
}

impl SymbolVisibility {
    const fn from_raw(vis: u8) -> Self {
        match vis & 0x3 {
            elf::STV_INTERNAL => Self::Internal,
            elf::STV_HIDDEN => Self::Hidden,
            elf::STV_PROTECTED => Self::Protected,
            _ => Self::Default,
        }
    }
}

/// A defined, named symbol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolEntry {
    /// Symbol name.
    pub name: String,
    /// Symbol value (its address for functions and objects).
    pub value: MemoryAddress,
    /// Symbol size, if recorded.
    pub size: Option<u64>,
    /// Binding class.
    pub binding: SymbolBinding,
    /// Visibility.
    pub visibility: SymbolVisibility,
}

/// Finds the preferred entry named `name`: the first global, else the first weak, else the first match.
pub fn lookup<'a>(symbols: &'a [SymbolEntry], name: &str) -> Option<&'a SymbolEntry> {
    symbols
        .iter()
        .enumerate()
        .filter(|(_, s)| s.name == name)
        .min_by_key(|(idx, s)| (s.binding.rank(), *idx))
        .map(|(_, s)| s)
}

/// Decodes the symbol table of an executable without validating its program headers.
///
/// # Errors
///
/// [`LoadError::Format`] if the header is invalid, there is no `SHT_SYMTAB` section or the table is malformed.
pub fn symbol_table(data: &[u8]) -> Result<Vec<SymbolEntry>> {
    let header = ElfHeader::parse(data)?;
    symbols_for(data, header.width)
}

fn symbols_for(data: &[u8], width: AddressWidth) -> Result<Vec<SymbolEntry>> {
    match width {
        AddressWidth::Bits32 => read_symbols::<elf::FileHeader32<Endianness>>(data),
        AddressWidth::Bits64 => read_symbols::<elf::FileHeader64<Endianness>>(data),
    }
}

fn read_symbols<Elf: FileHeader<Endian = Endianness>>(data: &[u8]) -> Result<Vec<SymbolEntry>> {
    let header = Elf::parse(data)?;
    let endian = header.endian()?;
    let sections = header.sections(endian, data)?;

    if !sections
        .iter()
        .any(|section| section.sh_type(endian) == elf::SHT_SYMTAB)
    {
        return Err(LoadError::format("image has no symbol table"));
    }

    let table = sections.symbols(endian, data, elf::SHT_SYMTAB)?;
    let mut out = Vec::with_capacity(table.len());
    for sym in table.iter() {
        if sym.st_shndx(endian) == elf::SHN_UNDEF {
            continue;
        }
        let name = table.symbol_name(endian, sym)?;
        if name.is_empty() {
            continue;
        }
        let size: u64 = sym.st_size(endian).into();
        out.push(SymbolEntry {
            name: String::from_utf8_lossy(name).into_owned(),
            value: sym.st_value(endian).into(),
            size: (size != 0).then_some(size),
            binding: SymbolBinding::from_raw(sym.st_bind()),
            visibility: SymbolVisibility::from_raw(sym.st_visibility()),
        });
    }
    Ok(out)
}
