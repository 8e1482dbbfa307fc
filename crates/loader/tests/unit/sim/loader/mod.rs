//! Loader tests, split by entry point.




/// `entry_point`, `symbol_location` and `symbols`.
pub mod symbol_resolution;
