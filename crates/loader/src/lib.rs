//! Program image loader for RISC-V simulation testbenches.
//!
//! This crate places executable images in a simulated memory model before a simulation starts:
//! 1. **Formats:** ELF executables (32/64-bit, either byte order), Zircon boot images and flat binaries.
//! 2. **Memory:** The [`MemorySink`](memory::MemorySink) contract plus RAM and region-map implementations.
//! 3. **Loading:** Validate-then-write loaders, argument-vector injection and format detection.
//! 4. **Symbols:** Entry-point and symbol-address queries for debuggers and test scripts.
//!
//! ```no_run
//! use std::path::Path;
//! use rvload_core::memory::MemoryMap;
//! use rvload_core::sim::loader;
//!
//! let mut memory = MemoryMap::with_ram(0x8000_0000, 64 << 20)?;
//! let summary = loader::load_elf(Path::new("hello.elf"), 0, &mut memory)?;
//! let tohost = loader::symbol_location(Path::new("hello.elf"), "tohost")?;
//! println!("entry {:#x?}, tohost {tohost:#x}", summary.entry);
//! # Ok::<(), rvload_core::LoadError>(())
//! ```

/// Common types (addresses, ranges, errors).
pub mod common;
/// Driver configuration (memory map, load parameters).
pub mod config;
/// Container formats (ELF, ZBI, argument block).
pub mod formats;
/// Memory sink trait and simulated memory.
pub mod memory;
/// Loader entry points and symbol resolver.
pub mod sim;

/// Loader error; every entry point returns it.
pub use crate::common::{ErrorKind, LoadError, MemoryAddress, Result};
/// Root configuration type; use `LoaderConfig::default()` or deserialize from JSON.
pub use crate::config::LoaderConfig;
/// Image format selector.
pub use crate::formats::ImageFormat;
/// Destination of loader writes.
pub use crate::memory::MemorySink;
