//! DRAM Buffer Unit Tests.
//!
//! Verifies allocation, slice reads and writes, fills and boundary checks.

use rvload_core::memory::DramBuffer;

// ══════════════════════════════════════════════════════════
// 1. Allocation and size
// ══════════════════════════════════════════════════════════

#[test]
fn buffer_allocation_size() {
    let buf = DramBuffer::new(4096);
    assert_eq!(buf.len(), 4096);
    assert!(!buf.is_empty());
}

#[test]
fn buffer_initial_zeroed() {
    let buf = DramBuffer::new(256);
    assert!(buf.as_slice().iter().all(|&b| b == 0));
}

#[test]
fn buffer_zero_sized() {
    let buf = DramBuffer::new(0);
    assert!(buf.is_empty());
    assert_eq!(buf.read_slice(0, 0), Some(&[][..]));
    assert_eq!(buf.read_slice(0, 1), None);
}

// ══════════════════════════════════════════════════════════
// 2. Slice access
// ══════════════════════════════════════════════════════════

#[test]
fn buffer_write_read_slice() {
    let mut buf = DramBuffer::new(256);
    assert!(buf.write_slice(16, &[0xDE, 0xAD, 0xBE, 0xEF]));
    assert_eq!(buf.read_slice(16, 4), Some(&[0xDE, 0xAD, 0xBE, 0xEF][..]));
    assert_eq!(buf.as_slice()[15], 0);
    assert_eq!(buf.as_slice()[20], 0);
}

#[test]
fn buffer_write_at_end() {
    let mut buf = DramBuffer::new(16);
    assert!(buf.write_slice(12, &[1, 2, 3, 4]));
    assert_eq!(buf.as_slice()[15], 4);
}

#[test]
fn buffer_write_past_end_rejected_without_partial_write() {
    let mut buf = DramBuffer::new(16);
    assert!(!buf.write_slice(14, &[1, 2, 3, 4]));
    assert!(buf.as_slice().iter().all(|&b| b == 0));
}

#[test]
fn buffer_read_past_end() {
    let buf = DramBuffer::new(16);
    assert_eq!(buf.read_slice(15, 2), None);
    assert_eq!(buf.read_slice(usize::MAX, 2), None);
}

#[test]
fn buffer_fill_range() {
    let mut buf = DramBuffer::new(64);
    buf.as_mut_slice().fill(0xFF);
    assert!(buf.fill(8, 16, 0));
    assert!(buf.as_slice()[8..24].iter().all(|&b| b == 0));
    assert_eq!(buf.as_slice()[7], 0xFF);
    assert_eq!(buf.as_slice()[24], 0xFF);
    assert!(!buf.fill(60, 8, 0));
}

#[test]
fn buffer_large_allocation() {
    let mut buf = DramBuffer::new(16 << 20);
    assert!(buf.write_slice((16 << 20) - 1, &[0xAB]));
    assert_eq!(buf.read_slice((16 << 20) - 1, 1), Some(&[0xAB][..]));
}
