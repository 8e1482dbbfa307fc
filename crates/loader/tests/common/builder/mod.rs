//! Image builders.
//!
//! Both builders lay images out byte by byte so tests control every header field,
//! including the ones a well-behaved toolchain would never emit.


pub use self::elf::{ElfBuilder, SymbolSpec};
pub use self::zbi::{ZbiBuilder, ZbiItemSpec};
