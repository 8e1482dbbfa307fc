//! # Address Arithmetic Tests
//!
//! Checked range construction across both address widths, overlap and containment, and
//! alignment round-up.

use proptest::prelude::*;
use rstest::rstest;
use rvload_core::common::addr::offset_by;
use rvload_core::common::{AddrRange, AddressWidth, ErrorKind, align_up};

#[test]
fn test_range_end_at_top_of_64bit_space() {
    let r = AddrRange::new(u64::MAX - 3, 4, AddressWidth::Bits64).unwrap();
    assert_eq!(r.end(), 1u128 << 64);
}

#[test]
fn test_range_past_top_of_64bit_space_is_range_error() {
    let err = AddrRange::new(u64::MAX - 3, 5, AddressWidth::Bits64).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Range);
}

#[rstest]
#[case(0xFFFF_FFFC, 4, true)]
#[case(0xFFFF_FFFC, 5, false)]
#[case(0x1_0000_0000, 1, false)]
#[case(0, 0x1_0000_0000, true)]
fn test_range_in_32bit_space(#[case] start: u64, #[case] len: u64, #[case] ok: bool) {
    assert_eq!(AddrRange::new(start, len, AddressWidth::Bits32).is_ok(), ok);
}

#[rstest]
#[case((0x1000, 0x10), (0x100F, 1), true)]
#[case((0x1000, 0x10), (0x1010, 1), false)]
#[case((0x1000, 0x10), (0x0FF0, 0x10), false)]
#[case((0x1000, 0x10), (0x0FF0, 0x11), true)]
#[case((0x1000, 0x10), (0x1008, 0), false)]
fn test_range_overlaps(#[case] a: (u64, u64), #[case] b: (u64, u64), #[case] expected: bool) {
    let a = AddrRange { start: a.0, len: a.1 };
    let b = AddrRange { start: b.0, len: b.1 };
    assert_eq!(a.overlaps(&b), expected);
    assert_eq!(b.overlaps(&a), expected);
}

#[test]
fn test_range_contains() {
    let outer = AddrRange { start: 0x8000_0000, len: 0x1000 };
    assert!(outer.contains(&AddrRange { start: 0x8000_0000, len: 0x1000 }));
    assert!(outer.contains(&AddrRange { start: 0x8000_0FFF, len: 1 }));
    assert!(!outer.contains(&AddrRange { start: 0x8000_0FFF, len: 2 }));
    assert!(!outer.contains(&AddrRange { start: 0x7FFF_FFFF, len: 1 }));
}

#[test]
fn test_offset_by_overflow_is_range_error() {
    assert_eq!(offset_by(0x1000, 0x8000_0000).unwrap(), 0x8000_1000);
    assert_eq!(offset_by(u64::MAX, 1).unwrap_err().kind(), ErrorKind::Range);
}

#[rstest]
#[case(0, 8, Some(0))]
#[case(1, 8, Some(8))]
#[case(8, 8, Some(8))]
#[case(0x1001, 0x1000, Some(0x2000))]
#[case(u64::MAX, 8, None)]
fn test_align_up(#[case] value: u64, #[case] align: u64, #[case] expected: Option<u64>) {
    assert_eq!(align_up(value, align), expected);
}

proptest! {
    #[test]
    fn prop_align_up_is_smallest_aligned_bound(value in 0u64..u64::MAX / 2, shift in 0u32..16) {
        let align = 1u64 << shift;
        let aligned = align_up(value, align).unwrap();
        prop_assert_eq!(aligned % align, 0);
        prop_assert!(aligned >= value);
        prop_assert!(aligned - value < align);
    }
}
