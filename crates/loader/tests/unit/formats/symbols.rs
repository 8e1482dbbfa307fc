//! # Symbol Table Tests
//!
//! Decoding `SHT_SYMTAB` in both classes and byte orders, filtering of undefined and
//! unnamed entries, and the lookup preference among duplicate names.

use pretty_assertions::assert_eq;
use rstest::rstest;
use rvload_core::common::ErrorKind;
use rvload_core::formats::elf::{
    self, ElfImage, SymbolBinding, SymbolEntry, SymbolVisibility, symbol_table,
};

use crate::common::builder::{ElfBuilder, SymbolSpec};

fn entry(name: &str, value: u64, binding: SymbolBinding) -> SymbolEntry {
    SymbolEntry {
        name: name.to_string(),
        value,
        size: None,
        binding,
        visibility: SymbolVisibility::Default,
    }
}

#[rstest]
#[case::elf64_le(ElfBuilder::new64())]
#[case::elf64_be(ElfBuilder::new64().big_endian())]
#[case::elf32_le(ElfBuilder::new32())]
#[case::elf32_be(ElfBuilder::new32().big_endian())]
fn test_symbols_decoded_in_every_layout(#[case] builder: ElfBuilder) {
    let data = builder
        .symbol(SymbolSpec::local("helper", 0x1010).sized(8))
        .symbol(SymbolSpec::global("_start", 0x1000).sized(16))
        .symbol(SymbolSpec::global("tohost", 0x2000))
        .build();
    let symbols = symbol_table(&data).unwrap();
    assert_eq!(
        symbols,
        vec![
            SymbolEntry {
                size: Some(8),
                ..entry("helper", 0x1010, SymbolBinding::Local)
            },
            SymbolEntry {
                size: Some(16),
                ..entry("_start", 0x1000, SymbolBinding::Global)
            },
            entry("tohost", 0x2000, SymbolBinding::Global),
        ]
    );
}

#[test]
fn test_undefined_symbols_are_omitted() {
    let data = ElfBuilder::new64()
        .symbol(SymbolSpec::undefined("printf"))
        .symbol(SymbolSpec::global("main", 0x1000))
        .build();
    let names: Vec<String> = symbol_table(&data)
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names, vec!["main".to_string()]);
}

#[test]
fn test_missing_symbol_table_is_format_error() {
    let data = ElfBuilder::new64().segment(0x1000, &[0; 4]).build();
    let err = symbol_table(&data).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format);
    assert!(err.to_string().contains("no symbol table"), "{err}");
}

#[test]
fn test_empty_symbol_table_is_not_an_error() {
    let data = ElfBuilder::new64().with_symtab().build();
    assert!(symbol_table(&data).unwrap().is_empty());
}

#[test]
fn test_find_symbol_on_image() {
    let data = ElfBuilder::new64()
        .segment(0x1000, &[0; 4])
        .symbol(SymbolSpec::global("_start", 0x1000))
        .build();
    let image = ElfImage::parse(&data).unwrap();
    assert_eq!(image.find_symbol("_start").unwrap().value, 0x1000);
    assert_eq!(
        image.find_symbol("missing").unwrap_err().kind(),
        ErrorKind::SymbolNotFound
    );
}

// ══════════════════════════════════════════════════════════
// Lookup preference
// ══════════════════════════════════════════════════════════

#[test]
fn test_lookup_prefers_global_over_earlier_local() {
    let symbols = vec![
        entry("dup", 0x10, SymbolBinding::Local),
        entry("dup", 0x20, SymbolBinding::Weak),
        entry("dup", 0x30, SymbolBinding::Global),
        entry("dup", 0x40, SymbolBinding::Global),
    ];
    assert_eq!(elf::lookup(&symbols, "dup").unwrap().value, 0x30);
}

#[test]
fn test_lookup_prefers_weak_over_local() {
    let symbols = vec![
        entry("dup", 0x10, SymbolBinding::Local),
        entry("dup", 0x20, SymbolBinding::Weak),
    ];
    assert_eq!(elf::lookup(&symbols, "dup").unwrap().value, 0x20);
}

#[test]
fn test_lookup_first_of_equal_rank_wins() {
    let symbols = vec![
        entry("dup", 0x10, SymbolBinding::Local),
        entry("dup", 0x20, SymbolBinding::Other(10)),
    ];
    assert_eq!(elf::lookup(&symbols, "dup").unwrap().value, 0x10);
}

#[test]
fn test_lookup_is_exact_match() {
    let symbols = vec![entry("tohost", 0x10, SymbolBinding::Global)];
    assert!(elf::lookup(&symbols, "toho").is_none());
    assert!(elf::lookup(&symbols, "TOHOST").is_none());
}

#[test]
fn test_duplicate_preference_through_file() {
    let data = ElfBuilder::new32()
        .symbol(SymbolSpec::local("dup", 0x100))
        .symbol(SymbolSpec::weak("dup", 0x200))
        .symbol(SymbolSpec::global("dup", 0x300))
        .build();
    let symbols = symbol_table(&data).unwrap();
    assert_eq!(elf::lookup(&symbols, "dup").unwrap().value, 0x300);
}
