//! Simulation-facing loading.
//!
//! Provides the functions a simulation driver calls to place program images in
//! memory and to query their entry points and symbols.

pub mod loader;
