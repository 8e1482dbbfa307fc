//! Tests for shared address and error types.

/// Range construction, overlap and alignment.
pub mod address_arithmetic;
