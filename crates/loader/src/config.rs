//! Configuration for the loader driver.
//!
//! This module defines the settings a driver needs to build a memory model and pick a load
//! strategy. It provides:
//! 1. **Defaults:** Baseline memory map and load constants.
//! 2. **Structures:** Memory map (RAM plus device regions) and load parameters.
//! 3. **Loading:** Deserialisation from JSON strings or files.
//!
//! The loader functions themselves take their parameters explicitly; this configuration is
//! consumed by drivers such as the `rvload` CLI.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::common::Result as LoadResult;
use crate::formats::ImageFormat;
use crate::memory::MemoryMap;

/// Default configuration constants.
mod defaults {
    /// Base address of simulated RAM. Test programs are linked to run from zero.
    pub const RAM_BASE: u64 = 0x0;

    /// Total size of simulated RAM (128 MiB).
    pub const RAM_SIZE: usize = 128 * 1024 * 1024;

    /// Offset added to every load destination.
    pub const LOAD_OFFSET: u64 = 0x0;
}

/// Failure to read or parse a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("could not read config `{}`: {source}", path.display())]
    Io {
        /// Config path.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The contents are not valid configuration JSON.
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Root loader configuration.
///
/// # Examples
///
/// ```
/// use rvload_core::config::LoaderConfig;
/// use rvload_core::formats::ImageFormat;
///
/// let json = r#"{
///     "memory": {
///         "ram_base": 2147483648,
///         "ram_size": 1048576,
///         "devices": [{ "name": "UART0", "base": 268435456, "size": 256 }]
///     },
///     "load": { "offset": 4096, "format": "zbi" }
/// }"#;
///
/// let config = LoaderConfig::from_json_str(json).unwrap();
/// assert_eq!(config.memory.ram_base, 0x8000_0000);
/// assert_eq!(config.memory.devices.len(), 1);
/// assert_eq!(config.load.format, Some(ImageFormat::Zbi));
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Memory map the image is loaded into.
    pub memory: MemoryConfig,
    /// Load parameters.
    pub load: LoadConfig,
}

impl LoaderConfig {
    /// Parses a configuration from a JSON string; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Json`] on malformed input.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON configuration file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] if the file cannot be read, [`ConfigError::Json`] if it does not parse.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Builds the memory model described by [`LoaderConfig::memory`].
    ///
    /// # Errors
    ///
    /// [`LoadError::Range`](crate::LoadError::Range) if regions overlap or overflow.
    pub fn build_memory(&self) -> LoadResult<MemoryMap> {
        let mut map = MemoryMap::with_ram(self.memory.ram_base, self.memory.ram_size)?;
        for dev in &self.memory.devices {
            map.add_device(&dev.name, dev.base, dev.size)?;
        }
        Ok(map)
    }
}

/// Simulated memory layout.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// RAM base address
    pub ram_base: u64,
    /// RAM size in bytes
    pub ram_size: usize,
    /// Device regions the loader must never write
    pub devices: Vec<DeviceRegion>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            ram_base: defaults::RAM_BASE,
            ram_size: defaults::RAM_SIZE,
            devices: Vec::new(),
        }
    }
}

/// A device (MMIO) region.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceRegion {
    /// Device name, used in error messages
    pub name: String,
    /// Base address
    pub base: u64,
    /// Size in bytes
    pub size: u64,
}

/// How the image is loaded.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Offset added to every destination address
    pub offset: u64,
    /// Image format; detected from the file contents when absent
    pub format: Option<ImageFormat>,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            offset: defaults::LOAD_OFFSET,
            format: None,
        }
    }
}
