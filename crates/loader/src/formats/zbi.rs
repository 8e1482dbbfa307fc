//! Zircon boot image (ZBI) decoding.
//!
//! A ZBI is a container header followed by a sequence of items, each a 32-byte header and a
//! payload padded to [`ZBI_ALIGNMENT`]. Every header has the same little-endian layout:
//!
//! ```text
//! +0   type       +4   length     +8   extra      +12  flags
//! +16  reserved0  +20  reserved1  +24  magic      +28  crc32
//! ```
//!
//! This module provides:
//! 1. **Container validation:** Type, magics, version flag, and declared length against the file size.
//! 2. **Item walk:** Sequential decoding of item headers with bounds and alignment checks.
//! 3. **Integrity:** CRC-32 verification for items carrying `ZBI_FLAGS_CRC32`.
//! 4. **Placement:** Kernel at the load offset, ramdisk and command line appended after it.

use std::borrow::Cow;

use super::{Placement, RegionKind};
use crate::common::{AddrRange, AddressWidth, LoadError, MemoryAddress, Result, align_up};

/// Size of every container and item header.
pub const ZBI_HEADER_SIZE: usize = 32;

/// Items start on this boundary.
pub const ZBI_ALIGNMENT: u64 = 8;

/// `type` of the container header (`"BOOT"`).
pub const ZBI_TYPE_CONTAINER: u32 = 0x544f_4f42;

/// `extra` of the container header.
pub const ZBI_CONTAINER_MAGIC: u32 = 0x868c_f7e6;

/// `magic` of every header.
pub const ZBI_ITEM_MAGIC: u32 = 0xb578_1729;

/// `crc32` of a header whose payload carries no checksum.
pub const ZBI_ITEM_NO_CRC32: u32 = 0x4a87_e8d6;

/// Required on every header.
pub const ZBI_FLAGS_VERSION: u32 = 0x0001_0000;

/// Set when `crc32` holds a checksum.
pub const ZBI_FLAGS_CRC32: u32 = 0x0002_0000;

/// Low 24 bits shared by all kernel item types (`"KRN"`).
pub const ZBI_TYPE_KERNEL_PREFIX: u32 = 0x004e_524b;

/// Mask selecting the kernel prefix of an item type.
pub const ZBI_TYPE_KERNEL_MASK: u32 = 0x00ff_ffff;

/// RISC-V 64 kernel (`"KRNV"`).
pub const ZBI_TYPE_KERNEL_RISCV64: u32 = 0x564e_524b;

/// Ramdisk image (`"RDSK"`).
pub const ZBI_TYPE_STORAGE_RAMDISK: u32 = 0x4b53_4452;

/// Kernel command line (`"CMDL"`).
pub const ZBI_TYPE_CMDLINE: u32 = 0x4c44_4d43;

/// Placeholder item to be ignored (`"SKIP"`).
pub const ZBI_TYPE_DISCARD: u32 = 0x5049_4b53;

/// Size of the `{entry, reserve_memory_size}` header at the start of a kernel payload.
pub const ZBI_KERNEL_HEADER_SIZE: usize = 16;

/// Returns `true` if `bytes` begins with something shaped like a ZBI container header.
pub fn has_container_header(bytes: &[u8]) -> bool {
    ZbiHeader::read(bytes, 0).is_some_and(|h| {
        h.item_type == ZBI_TYPE_CONTAINER
            && h.extra == ZBI_CONTAINER_MAGIC
            && h.magic == ZBI_ITEM_MAGIC
    })
}

/// A decoded container or item header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ZbiHeader {
    /// Item type tag.
    pub item_type: u32,
    /// Payload length in bytes, excluding padding.
    pub length: u32,
    /// Type-specific value.
    pub extra: u32,
    /// `ZBI_FLAGS_*`.
    pub flags: u32,
    /// Must be [`ZBI_ITEM_MAGIC`].
    pub magic: u32,
    /// Payload checksum or [`ZBI_ITEM_NO_CRC32`].
    pub crc32: u32,
}

impl ZbiHeader {
    fn read(bytes: &[u8], at: usize) -> Option<Self> {
        let raw = bytes.get(at..at.checked_add(ZBI_HEADER_SIZE)?)?;
        let word = |i: usize| u32::from_le_bytes([raw[i], raw[i + 1], raw[i + 2], raw[i + 3]]);
        Some(Self {
            item_type: word(0),
            length: word(4),
            extra: word(8),
            flags: word(12),
            magic: word(24),
            crc32: word(28),
        })
    }
}

/// Classification of an item type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ItemKind {
    /// A nested container header.
    Container,
    /// A kernel payload for any architecture.
    Kernel,
    /// A ramdisk payload.
    Ramdisk,
    /// A command line payload.
    Cmdline,
    /// A discard item.
    Discard,
    /// Any type this loader does not place.
    Other,
}

impl ItemKind {
    /// Classifies a raw item type.
    pub const fn from_type(item_type: u32) -> Self {
        match item_type {
            ZBI_TYPE_CONTAINER => Self::Container,
            ZBI_TYPE_STORAGE_RAMDISK => Self::Ramdisk,
            ZBI_TYPE_CMDLINE => Self::Cmdline,
            ZBI_TYPE_DISCARD => Self::Discard,
            t if t & ZBI_TYPE_KERNEL_MASK == ZBI_TYPE_KERNEL_PREFIX => Self::Kernel,
            _ => Self::Other,
        }
    }
}

/// One item of a boot image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BootImageItem {
    /// Decoded header.
    pub header: ZbiHeader,
    /// Classification of `header.item_type`.
    pub kind: ItemKind,
    /// File offset of the payload.
    pub payload_offset: usize,
    /// Payload length in bytes.
    pub payload_len: usize,
}

impl BootImageItem {
    /// Checksum recorded in the header, if the item carries one.
    pub const fn checksum(&self) -> Option<u32> {
        if self.header.flags & ZBI_FLAGS_CRC32 != 0 {
            Some(self.header.crc32)
        } else {
            None
        }
    }
}

/// The `{entry, reserve_memory_size}` header at the start of a kernel payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KernelHeader {
    /// Entry point, relative to the first byte of the kernel payload.
    pub entry: u64,
    /// Bytes the kernel needs past the end of its payload.
    pub reserve_memory_size: u64,
}

/// A validated boot image borrowed from its file contents.
#[derive(Clone, Debug)]
pub struct ZbiImage<'data> {
    data: &'data [u8],
    items: Vec<BootImageItem>,
}

/// Where a boot image lands in memory.
#[derive(Clone, Debug)]
pub struct ZbiPlan<'data> {
    /// Kernel entry address, if the image holds a kernel.
    pub entry: Option<MemoryAddress>,
    /// Payloads to write, kernel first.
    pub placements: Vec<Placement<'data>>,
}

impl<'data> ZbiImage<'data> {
    /// Validates the container and every item, including checksums.
    ///
    /// # Errors
    ///
    /// [`LoadError::Format`] on any structural violation (checked before any item is decoded for
    /// the container header), [`LoadError::Integrity`] on a checksum mismatch.
    pub fn parse(data: &'data [u8]) -> Result<Self> {
        let container = ZbiHeader::read(data, 0)
            .ok_or_else(|| LoadError::format("file too short for a ZBI container header"))?;
        check_container(&container)?;

        let end = ZBI_HEADER_SIZE as u64 + u64::from(container.length);
        if end > data.len() as u64 {
            return Err(LoadError::format(format!(
                "container declares {:#x} bytes but the file holds only {:#x}",
                end,
                data.len()
            )));
        }
        let end = end as usize;
        if end < data.len() {
            tracing::debug!(trailing = data.len() - end, "ignoring bytes after ZBI container");
        }

        let mut items = Vec::new();
        let mut cursor = ZBI_HEADER_SIZE;
        while cursor < end {
            let item = read_item(data, cursor, end)?;
            verify_checksum(data, &item)?;
            let padded = align_up(item.payload_len as u64, ZBI_ALIGNMENT)
                .ok_or_else(|| LoadError::format("item length overflows"))?;
            let next = item.payload_offset as u64 + padded;
            if next > end as u64 {
                return Err(LoadError::format(format!(
                    "item at {cursor:#x} runs past the end of the container"
                )));
            }
            items.push(item);
            cursor = next as usize;
        }

        Ok(Self { data, items })
    }

    /// Returns the decoded items in container order.
    pub fn items(&self) -> &[BootImageItem] {
        &self.items
    }

    /// Returns the payload bytes of an item.
    pub fn payload(&self, item: &BootImageItem) -> &'data [u8] {
        &self.data[item.payload_offset..item.payload_offset + item.payload_len]
    }

    /// Decodes the kernel header of a kernel item.
    ///
    /// # Errors
    ///
    /// [`LoadError::Format`] if the payload is too short to hold one.
    pub fn kernel_header(&self, item: &BootImageItem) -> Result<KernelHeader> {
        let payload = self.payload(item);
        if payload.len() < ZBI_KERNEL_HEADER_SIZE {
            return Err(LoadError::format(format!(
                "kernel payload of {} bytes is too short for its header",
                payload.len()
            )));
        }
        let dword = |i: usize| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&payload[i..i + 8]);
            u64::from_le_bytes(raw)
        };
        Ok(KernelHeader {
            entry: dword(0),
            reserve_memory_size: dword(8),
        })
    }

    /// Lays out the recognised payloads starting at `offset`.
    ///
    /// The kernel, which must be the first item when present, lands at `offset` followed by its
    /// zero-filled reservation. Ramdisk and command line payloads follow, each aligned to
    /// [`ZBI_ALIGNMENT`]. Other item types are skipped.
    ///
    /// # Errors
    ///
    /// [`LoadError::Format`] for a misplaced or duplicate kernel or a nested container,
    /// [`LoadError::Range`] if the layout overflows the address space.
    pub fn plan(&self, offset: MemoryAddress) -> Result<ZbiPlan<'data>> {
        let mut placements = Vec::new();
        let mut entry = None;
        let mut cursor = offset as u128;

        for (idx, item) in self.items.iter().enumerate() {
            let payload = self.payload(item);
            let (kind, zero_fill) = match item.kind {
                ItemKind::Kernel => {
                    if idx != 0 {
                        return Err(LoadError::format(format!(
                            "kernel item {idx} is not the first item"
                        )));
                    }
                    let header = self.kernel_header(item)?;
                    entry = Some(offset.checked_add(header.entry).ok_or_else(|| {
                        LoadError::range(offset, header.entry, "kernel entry overflows")
                    })?);
                    (RegionKind::Kernel, header.reserve_memory_size)
                }
                ItemKind::Ramdisk => (RegionKind::Ramdisk, 0),
                ItemKind::Cmdline => (RegionKind::Cmdline, 0),
                ItemKind::Container => {
                    return Err(LoadError::format(format!(
                        "item {idx} is a nested container"
                    )));
                }
                ItemKind::Discard => continue,
                ItemKind::Other => {
                    tracing::warn!(
                        index = idx,
                        item_type = %format!("{:#010x}", item.header.item_type),
                        "skipping unrecognised ZBI item"
                    );
                    continue;
                }
            };
            if payload.is_empty() && zero_fill == 0 {
                tracing::debug!(index = idx, ?kind, "skipping empty ZBI payload");
                continue;
            }

            let address = u64::try_from(cursor)
                .ok()
                .and_then(|c| align_up(c, ZBI_ALIGNMENT))
                .ok_or_else(|| LoadError::range(offset, 0, "payloads overflow the address space"))?;
            let range = AddrRange::new(
                address,
                (payload.len() as u64).saturating_add(zero_fill),
                AddressWidth::Bits64,
            )?;
            cursor = range.end();
            placements.push(Placement {
                kind,
                address,
                data: Cow::Borrowed(payload),
                zero_fill,
            });
        }

        Ok(ZbiPlan {
            entry,
            placements,
        })
    }
}

fn check_container(header: &ZbiHeader) -> Result<()> {
    if header.item_type != ZBI_TYPE_CONTAINER {
        return Err(LoadError::format(format!(
            "container type {:#010x} is not BOOT",
            header.item_type
        )));
    }
    if header.extra != ZBI_CONTAINER_MAGIC {
        return Err(LoadError::format("bad ZBI container magic"));
    }
    if header.magic != ZBI_ITEM_MAGIC {
        return Err(LoadError::format("bad ZBI item magic in container header"));
    }
    if header.flags & ZBI_FLAGS_VERSION == 0 {
        return Err(LoadError::format("container header lacks ZBI_FLAGS_VERSION"));
    }
    if header.crc32 != ZBI_ITEM_NO_CRC32 {
        return Err(LoadError::format("container header carries a checksum"));
    }
    Ok(())
}

fn read_item(data: &[u8], at: usize, end: usize) -> Result<BootImageItem> {
    if end - at < ZBI_HEADER_SIZE {
        return Err(LoadError::format(format!(
            "truncated item header at {at:#x}"
        )));
    }
    let header = ZbiHeader::read(data, at)
        .ok_or_else(|| LoadError::format(format!("truncated item header at {at:#x}")))?;
    if header.magic != ZBI_ITEM_MAGIC {
        return Err(LoadError::format(format!("bad item magic at {at:#x}")));
    }
    if header.flags & ZBI_FLAGS_VERSION == 0 {
        return Err(LoadError::format(format!(
            "item at {at:#x} lacks ZBI_FLAGS_VERSION"
        )));
    }
    if header.flags & ZBI_FLAGS_CRC32 == 0 && header.crc32 != ZBI_ITEM_NO_CRC32 {
        return Err(LoadError::format(format!(
            "item at {at:#x} has a checksum without ZBI_FLAGS_CRC32"
        )));
    }

    let payload_offset = at + ZBI_HEADER_SIZE;
    let payload_len = header.length as usize;
    if payload_len > end - payload_offset {
        return Err(LoadError::format(format!(
            "item at {at:#x} declares {payload_len:#x} bytes, only {:#x} remain",
            end - payload_offset
        )));
    }

    Ok(BootImageItem {
        header,
        kind: ItemKind::from_type(header.item_type),
        payload_offset,
        payload_len,
    })
}

/// Computes the checksum an item header should carry: CRC-32 of the header with its
/// `crc32` field zeroed, followed by the payload.
pub fn item_crc32(header_bytes: &[u8; ZBI_HEADER_SIZE], payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&header_bytes[..28]);
    hasher.update(&[0u8; 4]);
    hasher.update(payload);
    hasher.finalize()
}

fn verify_checksum(data: &[u8], item: &BootImageItem) -> Result<()> {
    let Some(expected) = item.checksum() else {
        return Ok(());
    };
    let start = item.payload_offset - ZBI_HEADER_SIZE;
    let mut header_bytes = [0u8; ZBI_HEADER_SIZE];
    header_bytes.copy_from_slice(&data[start..item.payload_offset]);
    let payload = &data[item.payload_offset..item.payload_offset + item.payload_len];
    let actual = item_crc32(&header_bytes, payload);
    if actual != expected {
        return Err(LoadError::integrity(format!(
            "item at {start:#x}: CRC32 {actual:#010x} does not match recorded {expected:#010x}"
        )));
    }
    Ok(())
}
