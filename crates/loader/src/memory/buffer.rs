//! DRAM Buffer Implementation.
//!
//! This module provides a safe wrapper around raw memory allocation for simulated RAM.
//! It supports lazy allocation via `mmap` on Unix systems so that large RAM sizes cost
//! nothing until the loader (or the simulation) touches them.

use std::slice;

/// A fixed-size, zero-initialised byte buffer.
///
/// On Unix systems, this uses `mmap` to allocate anonymous memory, which allows
/// for lazy allocation (pages are only allocated by the OS when accessed).
#[derive(Debug)]
pub struct DramBuffer {
    ptr: *mut u8,
    size: usize,
    is_mmap: bool,
}

// SAFETY: the buffer owns its allocation exclusively and every mutation goes
// through `&mut self`.
unsafe impl Send for DramBuffer {}
// SAFETY: shared references only permit reads.
unsafe impl Sync for DramBuffer {}

impl DramBuffer {
    /// Creates a new zeroed buffer of the specified size.
    ///
    /// On Unix, uses `mmap` for lazy allocation and falls back to a heap
    /// allocation if the mapping fails; on other platforms, allocates a `Vec`.
    ///
    /// # Arguments
    ///
    /// * `size` - Size of the buffer in bytes.
    pub fn new(size: usize) -> Self {
        #[cfg(unix)]
        {
            if size > 0 {
                // SAFETY: anonymous private mapping with no address hint; the result
                // is checked against MAP_FAILED before use.
                let ptr = unsafe {
                    libc::mmap(
                        std::ptr::null_mut(),
                        size,
                        libc::PROT_READ | libc::PROT_WRITE,
                        libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                        -1,
                        0,
                    )
                };
                if ptr != libc::MAP_FAILED {
                    return Self {
                        ptr: ptr as *mut u8,
                        size,
                        is_mmap: true,
                    };
                }
                tracing::warn!(size, "mmap of DRAM buffer failed, falling back to heap");
            }
        }

        let mut vec = vec![0u8; size].into_boxed_slice();
        let ptr = vec.as_mut_ptr();
        std::mem::forget(vec);
        Self {
            ptr,
            size,
            is_mmap: false,
        }
    }

    /// Returns the size of the buffer in bytes.
    pub const fn len(&self) -> usize {
        self.size
    }

    /// Returns `true` if the buffer has zero capacity.
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Returns the whole buffer as a slice.
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: `ptr` is valid for `size` initialised bytes for the lifetime of `self`.
        unsafe { slice::from_raw_parts(self.ptr, self.size) }
    }

    /// Returns the whole buffer as a mutable slice.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above, and `&mut self` guarantees exclusive access.
        unsafe { slice::from_raw_parts_mut(self.ptr, self.size) }
    }

    /// Reads a slice of memory, or `None` if it runs past the end of the buffer.
    pub fn read_slice(&self, offset: usize, len: usize) -> Option<&[u8]> {
        let end = offset.checked_add(len)?;
        self.as_slice().get(offset..end)
    }

    /// Writes a slice of memory. Returns `false` without writing if it does not fit.
    pub fn write_slice(&mut self, offset: usize, data: &[u8]) -> bool {
        let Some(end) = offset.checked_add(data.len()) else {
            return false;
        };
        match self.as_mut_slice().get_mut(offset..end) {
            Some(dest) => {
                dest.copy_from_slice(data);
                true
            }
            None => false,
        }
    }

    /// Sets `len` bytes starting at `offset` to `byte`. Returns `false` without writing if out of bounds.
    pub fn fill(&mut self, offset: usize, len: usize, byte: u8) -> bool {
        let Some(end) = offset.checked_add(len) else {
            return false;
        };
        match self.as_mut_slice().get_mut(offset..end) {
            Some(dest) => {
                dest.fill(byte);
                true
            }
            None => false,
        }
    }
}

impl Drop for DramBuffer {
    /// Unmaps the mmap'd memory, or rebuilds and drops the boxed slice.
    fn drop(&mut self) {
        if self.is_mmap {
            #[cfg(unix)]
            // SAFETY: `ptr`/`size` describe the mapping created in `new`.
            unsafe {
                let _ = libc::munmap(self.ptr as *mut libc::c_void, self.size);
            }
        } else {
            // SAFETY: `ptr`/`size` came from a leaked `Box<[u8]>` of exactly this length.
            unsafe {
                drop(Box::from_raw(slice::from_raw_parts_mut(self.ptr, self.size)));
            }
        }
    }
}
