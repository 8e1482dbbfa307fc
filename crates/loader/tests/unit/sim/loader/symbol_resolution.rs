//! # Symbol Resolution Tests
//!
//! Entry-point and symbol-address queries against executables on disk. None of these
//! queries need a memory sink.

use pretty_assertions::assert_eq;
use rvload_core::common::ErrorKind;
use rvload_core::sim::loader;

use crate::common::builder::{ElfBuilder, SymbolSpec};
use crate::common::create_temp_image;

#[test]
fn test_entry_point() {
    let file = create_temp_image(&ElfBuilder::new64().entry(0x8000_0000).build());
    assert_eq!(loader::entry_point(file.path()).unwrap(), 0x8000_0000);
}

#[test]
fn test_entry_point_elf32_big_endian() {
    let file = create_temp_image(&ElfBuilder::new32().big_endian().entry(0x2000_0010).build());
    assert_eq!(loader::entry_point(file.path()).unwrap(), 0x2000_0010);
}

#[test]
fn test_entry_point_of_non_elf() {
    let file = create_temp_image(b"not an executable");
    assert_eq!(
        loader::entry_point(file.path()).unwrap_err().kind(),
        ErrorKind::Format
    );
}

#[test]
fn test_symbol_location() {
    let data = ElfBuilder::new64()
        .symbol(SymbolSpec::global("_start", 0x8000_0000))
        .symbol(SymbolSpec::global("tohost", 0x8000_1000).sized(8))
        .build();
    let file = create_temp_image(&data);
    assert_eq!(
        loader::symbol_location(file.path(), "tohost").unwrap(),
        0x8000_1000
    );
}

#[test]
fn test_symbol_not_found() {
    crate::common::init_tracing();
    let data = ElfBuilder::new64()
        .symbol(SymbolSpec::global("_start", 0x1000))
        .build();
    let file = create_temp_image(&data);
    let err = loader::symbol_location(file.path(), "fromhost").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SymbolNotFound);
}

#[test]
fn test_undefined_reference_is_not_found() {
    let data = ElfBuilder::new64()
        .symbol(SymbolSpec::undefined("printf"))
        .build();
    let file = create_temp_image(&data);
    assert_eq!(
        loader::symbol_location(file.path(), "printf").unwrap_err().kind(),
        ErrorKind::SymbolNotFound
    );
}

#[test]
fn test_symbol_query_without_symtab_is_format_error() {
    let file = create_temp_image(&ElfBuilder::new64().segment(0x1000, &[0; 4]).build());
    assert_eq!(
        loader::symbol_location(file.path(), "main").unwrap_err().kind(),
        ErrorKind::Format
    );
}

#[test]
fn test_symbol_query_ignores_segment_problems() {
    let data = ElfBuilder::new64()
        .segment(0x1000, &[0; 16])
        .segment(0x1008, &[0; 16])
        .symbol(SymbolSpec::global("main", 0x1000))
        .build();
    let file = create_temp_image(&data);
    assert_eq!(loader::symbol_location(file.path(), "main").unwrap(), 0x1000);
}

#[test]
fn test_duplicate_symbol_prefers_global() {
    let data = ElfBuilder::new64()
        .symbol(SymbolSpec::local("dup", 0x10))
        .symbol(SymbolSpec::weak("dup", 0x20))
        .symbol(SymbolSpec::global("dup", 0x30))
        .build();
    let file = create_temp_image(&data);
    assert_eq!(loader::symbol_location(file.path(), "dup").unwrap(), 0x30);
}

#[test]
fn test_symbols_listing() {
    let data = ElfBuilder::new32()
        .symbol(SymbolSpec::local("a", 1))
        .symbol(SymbolSpec::global("b", 2))
        .build();
    let file = create_temp_image(&data);
    let names: Vec<String> = loader::symbols(file.path())
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.elf");
    assert_eq!(loader::entry_point(&path).unwrap_err().kind(), ErrorKind::Io);
    assert_eq!(
        loader::symbol_location(&path, "main").unwrap_err().kind(),
        ErrorKind::Io
    );
}
