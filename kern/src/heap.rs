// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A general-purpose first-fit heap, for application tasks that need an
//! allocation shape the fixed-block [`crate::pool`] can't give them.
//!
//! This is not part of the kernel's core invariants and must never be
//! called from interrupt or scheduler context — it exists purely so task
//! code has a `kmalloc`/`kfree` escape hatch.
//!
//! The free list is singly-linked with no back-pointers, so `kfree` can
//! only coalesce with the block immediately *following* a freed one, never
//! the one before it. This mirrors the source's own limitation.

use core::cell::UnsafeCell;
use core::mem::{align_of, size_of};

use crate::err::{KernelError, Result};
use crate::sync::Mutex;

#[repr(C)]
struct BlockHeader {
    size: usize,
    next: *mut BlockHeader,
    free: bool,
}

struct HeapState {
    free_list: *mut BlockHeader,
}

const HEADER_SIZE: usize = size_of::<BlockHeader>();
const MIN_PAYLOAD: usize = size_of::<usize>();

impl HeapState {
    const fn empty() -> Self {
        HeapState {
            free_list: core::ptr::null_mut(),
        }
    }

    /// Places the single initial free block's header at the buffer's own
    /// base address, before publishing it as `free_list` — unlike the
    /// source, which assigned through `free_list` while it was still null.
    fn init(&mut self, buffer: &mut [u8]) -> Result<()> {
        if buffer.len() <= HEADER_SIZE {
            return Err(KernelError::InvalidPoolConfig);
        }
        let header = buffer.as_mut_ptr() as *mut BlockHeader;
        // Safety: `buffer` is at least `HEADER_SIZE` bytes and properly
        // aligned for `usize`-sized fields (caller's responsibility, as
        // with any raw buffer handed to a pool/heap).
        unsafe {
            (*header).size = buffer.len() - HEADER_SIZE;
            (*header).next = core::ptr::null_mut();
            (*header).free = true;
        }
        self.free_list = header;
        Ok(())
    }

    fn alloc(&mut self, requested: usize) -> Option<*mut u8> {
        let requested = align_up(requested.max(MIN_PAYLOAD), align_of::<usize>());

        let mut cursor = self.free_list;
        while !cursor.is_null() {
            // Safety: every pointer in this list was written by `init` or
            // by this same function and points at a live `BlockHeader`.
            let block = unsafe { &mut *cursor };
            if block.free && block.size >= requested {
                let remainder = block.size - requested;
                if remainder > HEADER_SIZE + MIN_PAYLOAD {
                    // Safety: `remainder` bytes past the payload are still
                    // inside the original allocation handed to `init`.
                    unsafe {
                        let split =
                            (cursor as *mut u8).add(HEADER_SIZE + requested) as *mut BlockHeader;
                        (*split).size = remainder - HEADER_SIZE;
                        (*split).free = true;
                        (*split).next = block.next;
                        block.next = split;
                        block.size = requested;
                    }
                }
                block.free = false;
                // Safety: the payload immediately follows the header.
                return Some(unsafe { (cursor as *mut u8).add(HEADER_SIZE) });
            }
            cursor = block.next;
        }
        None
    }

    /// Safety: `ptr` must have come from [`HeapState::alloc`] on this heap
    /// and must not already be free.
    unsafe fn free(&mut self, ptr: *mut u8) {
        let header = ptr.sub(HEADER_SIZE) as *mut BlockHeader;
        (*header).free = true;

        // Coalesce forward only: this free list has no back-pointers.
        let next = (*header).next;
        if !next.is_null() && (*next).free {
            (*header).size += HEADER_SIZE + (*next).size;
            (*header).next = (*next).next;
        }
    }

    /// Safety: `ptr` must have come from [`HeapState::alloc`] on this heap.
    unsafe fn block_size(&self, ptr: *mut u8) -> usize {
        let header = ptr.sub(HEADER_SIZE) as *mut BlockHeader;
        (*header).size
    }
}

fn align_up(size: usize, align: usize) -> usize {
    (size + align - 1) & !(align - 1)
}

/// The kernel-global handle application code declares a `static` of.
///
/// Metadata is protected by the same blocking mutex discipline as
/// [`crate::pool::Pool`], rather than an interrupts-disabled critical
/// section: `kmalloc`/`kfree`/etc. must only be called from task context.
pub struct Heap {
    mutex: Mutex,
    state: UnsafeCell<HeapState>,
}

// Safety: every access to `state` is bracketed by `mutex.acquire()` /
// `mutex.release()`, which admits only one task at a time.
unsafe impl Sync for Heap {}

impl Heap {
    pub const fn new() -> Self {
        Heap {
            mutex: Mutex::new(),
            state: UnsafeCell::new(HeapState::empty()),
        }
    }

    pub fn init(&self, buffer: &mut [u8]) -> Result<()> {
        self.mutex.acquire();
        // Safety: `mutex` is held for the duration of this access.
        let result = unsafe { (*self.state.get()).init(buffer) };
        self.mutex.release();
        result
    }

    pub fn kmalloc(&self, size: usize) -> Option<*mut u8> {
        self.mutex.acquire();
        // Safety: `mutex` is held for the duration of this access.
        let block = unsafe { (*self.state.get()).alloc(size) };
        self.mutex.release();
        block
    }

    pub fn kcalloc(&self, count: usize, size: usize) -> Option<*mut u8> {
        let total = count.checked_mul(size)?;
        let ptr = self.kmalloc(total)?;
        // Safety: `kmalloc` just returned a fresh block of at least
        // `total` bytes.
        unsafe { core::ptr::write_bytes(ptr, 0, total) };
        Some(ptr)
    }

    /// # Safety
    ///
    /// `ptr` must have come from this heap and must not be freed twice.
    pub unsafe fn kfree(&self, ptr: *mut u8) {
        self.mutex.acquire();
        // Safety: `mutex` is held for the duration of this access; `ptr`
        // satisfies this function's own safety contract.
        unsafe { (*self.state.get()).free(ptr) };
        self.mutex.release();
    }

    /// Grows (or shrinks) an existing allocation by copying into a freshly
    /// allocated block; there is no in-place growth, matching the absence
    /// of backward coalescing in the free list this is built on.
    ///
    /// Acquires and releases the mutex separately for each of its three
    /// sub-steps (size lookup, `kmalloc`, `kfree`) rather than holding it
    /// across the whole operation, since `kmalloc`/`kfree` each acquire it
    /// themselves and the mutex isn't reentrant.
    ///
    /// # Safety
    ///
    /// `ptr` must have come from this heap and must not be freed twice.
    pub unsafe fn krealloc(&self, ptr: *mut u8, new_size: usize) -> Option<*mut u8> {
        self.mutex.acquire();
        // Safety: `mutex` is held for the duration of this access; `ptr`
        // satisfies this function's own safety contract.
        let old_size = unsafe { (*self.state.get()).block_size(ptr) };
        self.mutex.release();

        let new_ptr = self.kmalloc(new_size)?;
        let copy_len = old_size.min(new_size);
        // Safety: `ptr` has at least `old_size` bytes, `new_ptr` has at
        // least `new_size` bytes, and the two blocks never overlap.
        unsafe {
            core::ptr::copy_nonoverlapping(ptr, new_ptr, copy_len);
            self.kfree(ptr);
        }
        Some(new_ptr)
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_rejects_a_buffer_too_small_for_one_header() {
        let heap = Heap::new();
        let mut buf = [0u8; HEADER_SIZE];
        assert_eq!(
            heap.init(&mut buf).unwrap_err(),
            KernelError::InvalidPoolConfig
        );
    }

    #[test]
    fn alloc_and_free_round_trip() {
        let heap = Heap::new();
        let mut buf = [0u8; 256];
        heap.init(&mut buf).unwrap();

        let a = heap.kmalloc(32).unwrap();
        let b = heap.kmalloc(32).unwrap();
        assert_ne!(a, b);
        unsafe {
            heap.kfree(a);
            heap.kfree(b);
        }
    }

    #[test]
    fn alloc_past_capacity_returns_none() {
        let heap = Heap::new();
        let mut buf = [0u8; 64];
        heap.init(&mut buf).unwrap();
        assert!(heap.kmalloc(1024).is_none());
    }

    #[test]
    fn freeing_adjacent_blocks_coalesces_them() {
        let heap = Heap::new();
        let mut buf = [0u8; 256];
        heap.init(&mut buf).unwrap();

        let a = heap.kmalloc(32).unwrap();
        let b = heap.kmalloc(32).unwrap();
        unsafe {
            heap.kfree(a);
            heap.kfree(b);
        }
        // The two freed, now-coalesced blocks plus the never-touched
        // remainder should satisfy an allocation bigger than either alone.
        assert!(heap.kmalloc(80).is_some());
    }

    #[test]
    fn krealloc_growing_preserves_contents() {
        let heap = Heap::new();
        let mut buf = [0u8; 256];
        heap.init(&mut buf).unwrap();

        let ptr = heap.kmalloc(8).unwrap();
        unsafe { core::ptr::copy_nonoverlapping(b"hi there".as_ptr(), ptr, 8) };

        let grown = unsafe { heap.krealloc(ptr, 32).unwrap() };
        let bytes = unsafe { core::slice::from_raw_parts(grown, 8) };
        assert_eq!(bytes, b"hi there");
        unsafe { heap.kfree(grown) };
    }

    #[test]
    fn kcalloc_zeroes_the_returned_block() {
        let heap = Heap::new();
        let mut buf = [0u8; 256];
        heap.init(&mut buf).unwrap();

        let ptr = heap.kcalloc(8, 4).unwrap();
        let bytes = unsafe { core::slice::from_raw_parts(ptr, 32) };
        assert!(bytes.iter().all(|&b| b == 0));
    }
}
