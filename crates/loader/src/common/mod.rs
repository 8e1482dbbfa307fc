//! Common types shared by the parsers, the memory sink and the loader facade.
//!
//! This module provides the building blocks every other module depends on. It includes:
//! 1. **Address Types:** The simulated address type, address-space width and checked ranges.
//! 2. **Error Handling:** The loader error taxonomy and its `Result` alias.

/// Address type, ranges and alignment helpers.
pub mod addr;

/// Error types.
pub mod error;

pub use addr::{AddrRange, AddressWidth, MemoryAddress, align_up};
pub use error::{ErrorKind, LoadError, Result};
