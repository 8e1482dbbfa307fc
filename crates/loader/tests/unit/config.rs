//! # Configuration Tests
//!
//! JSON parsing with defaults, file loading and the memory map built from a config.

use std::io::Write;

use pretty_assertions::assert_eq;
use rvload_core::config::{ConfigError, LoaderConfig};
use rvload_core::memory::MemorySink;
use rvload_core::{ErrorKind, ImageFormat};
use tempfile::NamedTempFile;

#[test]
fn test_empty_object_uses_defaults() {
    let config = LoaderConfig::from_json_str("{}").unwrap();
    assert_eq!(config.memory.ram_base, 0);
    assert_eq!(config.memory.ram_size, 128 * 1024 * 1024);
    assert!(config.memory.devices.is_empty());
    assert_eq!(config.load.offset, 0);
    assert_eq!(config.load.format, None);
}

#[test]
fn test_partial_sections_keep_other_defaults() {
    let config = LoaderConfig::from_json_str(r#"{ "memory": { "ram_size": 4096 } }"#).unwrap();
    assert_eq!(config.memory.ram_size, 4096);
    assert_eq!(config.memory.ram_base, 0);
}

#[test]
fn test_full_config() {
    let json = r#"{
        "memory": {
            "ram_base": 2147483648,
            "ram_size": 65536,
            "devices": [
                { "name": "UART0", "base": 268435456, "size": 256 },
                { "name": "CLINT", "base": 33554432, "size": 65536 }
            ]
        },
        "load": { "offset": 2147483648, "format": "elf" }
    }"#;
    let config = LoaderConfig::from_json_str(json).unwrap();
    assert_eq!(config.memory.devices[1].name, "CLINT");
    assert_eq!(config.load.format, Some(ImageFormat::Elf));

    let mut memory = config.build_memory().unwrap();
    assert_eq!(memory.regions().len(), 3);
    assert!(memory.in_range(0x8000_0000, 65536));
    assert_eq!(
        memory.write(0x1000_0000, &[0]).unwrap_err().kind(),
        ErrorKind::Range
    );
}

#[test]
fn test_unknown_format_rejected() {
    let err = LoaderConfig::from_json_str(r#"{ "load": { "format": "pe" } }"#).unwrap_err();
    assert!(matches!(err, ConfigError::Json(_)));
}

#[test]
fn test_overlapping_devices_fail_to_build() {
    let json = r#"{
        "memory": {
            "ram_base": 0,
            "ram_size": 4096,
            "devices": [{ "name": "ROM", "base": 2048, "size": 16 }]
        }
    }"#;
    let config = LoaderConfig::from_json_str(json).unwrap();
    assert_eq!(config.build_memory().unwrap_err().kind(), ErrorKind::Range);
}

#[test]
fn test_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(br#"{ "load": { "offset": 4096, "format": "raw" } }"#)
        .unwrap();
    let config = LoaderConfig::from_file(file.path()).unwrap();
    assert_eq!(config.load.offset, 4096);
    assert_eq!(config.load.format, Some(ImageFormat::Raw));
}

#[test]
fn test_from_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = LoaderConfig::from_file(&dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}
