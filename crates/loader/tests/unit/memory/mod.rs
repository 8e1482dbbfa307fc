//! Memory model tests.

/// DRAM buffer allocation and slice access.
pub mod buffer;
