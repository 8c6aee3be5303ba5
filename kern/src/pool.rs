// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A fixed-block memory pool: O(1) alloc/free via a free list threaded
//! through the unused blocks themselves, so it costs no memory beyond the
//! buffer it's handed.

use core::cell::UnsafeCell;
use core::mem::{align_of, size_of};
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::err::{KernelError, Result};
use crate::sync::Mutex;

/// The pure allocator logic. Not `Send`/`Sync` on its own — `Pool` below
/// supplies the blocking-mutex discipline that makes sharing it safe.
struct PoolState {
    block_size: usize,
    num_blocks: usize,
    free_head: *mut u8,
}

impl PoolState {
    const fn empty() -> Self {
        PoolState {
            block_size: 0,
            num_blocks: 0,
            free_head: core::ptr::null_mut(),
        }
    }

    fn init(&mut self, buffer: &mut [u8], requested_block_size: usize) -> Result<()> {
        let align = align_of::<usize>();
        let block_size = align_up(requested_block_size.max(size_of::<usize>()), align);
        let num_blocks = buffer.len() / block_size;
        if requested_block_size == 0 || num_blocks == 0 {
            return Err(KernelError::InvalidPoolConfig);
        }

        let base = buffer.as_mut_ptr();
        for i in 0..num_blocks {
            // Safety: `i < num_blocks` and `block_size * num_blocks <=
            // buffer.len()`, so every block and its header word lie
            // entirely within `buffer`.
            unsafe {
                let block = base.add(i * block_size);
                let next = if i + 1 < num_blocks {
                    base.add((i + 1) * block_size)
                } else {
                    core::ptr::null_mut()
                };
                (block as *mut *mut u8).write(next);
            }
        }

        self.block_size = block_size;
        self.num_blocks = num_blocks;
        self.free_head = base;
        Ok(())
    }

    fn alloc(&mut self) -> Option<*mut u8> {
        if self.free_head.is_null() {
            return None;
        }
        let block = self.free_head;
        // Safety: `block` is either the buffer base from `init` or a
        // previously-freed block, both of which had their leading word
        // written with the next free block's address (or null).
        self.free_head = unsafe { *(block as *const *mut u8) };
        Some(block)
    }

    /// Safety: `block` must have come from `alloc` on this same pool and
    /// must not already be on the free list.
    unsafe fn free(&mut self, block: *mut u8) {
        (block as *mut *mut u8).write(self.free_head);
        self.free_head = block;
    }
}

fn align_up(size: usize, align: usize) -> usize {
    (size + align - 1) & !(align - 1)
}

/// The kernel-global handle application code declares a `static` of.
///
/// Metadata is protected by a real blocking mutex rather than an
/// interrupts-disabled critical section, so a pool operation never has to
/// mask interrupts globally — it only excludes other tasks contending for
/// this same pool. `pool_alloc`/`pool_free` must therefore only be called
/// from task context, never from an interrupt handler.
pub struct Pool {
    mutex: Mutex,
    state: UnsafeCell<PoolState>,
    /// Tracked outside the mutex: a quick, non-locking read is sufficient
    /// for diagnostics, and tearing is tolerated.
    used_count: AtomicUsize,
}

// Safety: every access to `state` is bracketed by `mutex.acquire()` /
// `mutex.release()`, which admits only one task at a time.
unsafe impl Sync for Pool {}

impl Pool {
    pub const fn new() -> Self {
        Pool {
            mutex: Mutex::new(),
            state: UnsafeCell::new(PoolState::empty()),
            used_count: AtomicUsize::new(0),
        }
    }

    pub fn init(&self, buffer: &mut [u8], block_size: usize) -> Result<()> {
        self.used_count.store(0, Ordering::Relaxed);
        self.mutex.acquire();
        // Safety: `mutex` is held for the duration of this access.
        let result = unsafe { (*self.state.get()).init(buffer, block_size) };
        self.mutex.release();
        result
    }

    pub fn deinit(&self) {
        self.used_count.store(0, Ordering::Relaxed);
        self.mutex.acquire();
        // Safety: `mutex` is held for the duration of this access.
        unsafe { *self.state.get() = PoolState::empty() };
        self.mutex.release();
    }

    pub fn alloc(&self) -> Option<*mut u8> {
        self.mutex.acquire();
        // Safety: `mutex` is held for the duration of this access.
        let block = unsafe { (*self.state.get()).alloc() };
        self.mutex.release();
        if block.is_some() {
            self.used_count.fetch_add(1, Ordering::Relaxed);
        }
        block
    }

    /// # Safety
    ///
    /// `block` must have come from [`Pool::alloc`] on this pool and must not
    /// be freed twice.
    pub unsafe fn free(&self, block: *mut u8) {
        self.mutex.acquire();
        // Safety: `mutex` is held for the duration of this access; `block`
        // satisfies this function's own safety contract.
        unsafe { (*self.state.get()).free(block) };
        self.mutex.release();
        self.used_count.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn used_count(&self) -> usize {
        self.used_count.load(Ordering::Relaxed)
    }
}

impl Default for Pool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_rejects_zero_block_size_and_undersized_buffers() {
        let pool = Pool::new();
        let mut buf = [0u8; 64];
        assert_eq!(
            pool.init(&mut buf, 0).unwrap_err(),
            KernelError::InvalidPoolConfig
        );
        assert_eq!(
            pool.init(&mut buf, 128).unwrap_err(),
            KernelError::InvalidPoolConfig
        );
    }

    #[test]
    fn alloc_hands_out_every_block_then_returns_none() {
        let pool = Pool::new();
        let mut buf = [0u8; 64];
        pool.init(&mut buf, 16).unwrap();

        let mut blocks = Vec::new();
        while let Some(b) = pool.alloc() {
            blocks.push(b);
        }
        assert_eq!(blocks.len(), 4);
        assert_eq!(pool.used_count(), 4);
        assert!(pool.alloc().is_none());

        for b in blocks {
            unsafe { pool.free(b) };
        }
        assert_eq!(pool.used_count(), 0);
    }

    #[test]
    fn freed_blocks_are_reusable() {
        let pool = Pool::new();
        let mut buf = [0u8; 32];
        pool.init(&mut buf, 16).unwrap();

        let a = pool.alloc().unwrap();
        unsafe { pool.free(a) };
        let b = pool.alloc().unwrap();
        assert_eq!(a, b);
    }
}
