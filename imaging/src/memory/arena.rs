use std::{
    cell::UnsafeCell,
    ops::{Deref, DerefMut},
    sync::{Arc, Mutex},
};

use log::warn;

use super::buddy_allocator::{AllocError, BuddyAllocator, MIN_BLOCK_SIZE};

/// A fixed-capacity byte arena managed by a buddy allocator.
///
/// Live blocks are disjoint byte ranges by allocator invariant, so each
/// [`ArenaBlock`] can expose `&mut [u8]` into the shared storage without
/// aliasing. All free-list mutation goes through the mutex, which makes
/// allocate/release safe to call from parallel pixel fills.
pub struct BuddyArena {
    buf: Box<[UnsafeCell<u8>]>,
    state: Mutex<BuddyAllocator>,
}

// Blocks never overlap and the allocator state is mutex-guarded.
unsafe impl Send for BuddyArena {}
unsafe impl Sync for BuddyArena {}

impl BuddyArena {
    /// Allocate the backing store once; `capacity` is rounded up to a power
    /// of two. The arena never grows.
    pub fn new(capacity: usize) -> Arc<Self> {
        let state = BuddyAllocator::new(capacity, MIN_BLOCK_SIZE);
        let buf = (0..state.capacity())
            .map(|_| UnsafeCell::new(0u8))
            .collect();

        Arc::new(BuddyArena {
            buf,
            state: Mutex::new(state),
        })
    }

    /// Allocate a zero-filled block of `len` bytes.
    pub fn allocate_zeroed(self: Arc<Self>, len: usize) -> Result<ArenaBlock, AllocError> {
        let offset = {
            let mut state = self.state.lock().expect("arena mutex poisoned");
            match state.allocate(len) {
                Ok(offset) => offset,
                Err(err) => {
                    warn!(
                        "arena allocation of {} bytes failed: {} ({} of {} bytes in use)",
                        len,
                        err,
                        state.used_bytes(),
                        state.capacity()
                    );
                    return Err(err);
                }
            }
        };

        let mut block = ArenaBlock {
            arena: self,
            offset,
            len,
        };
        // Blocks are recycled, so a fresh one may hold stale pixel data.
        block.fill(0);
        Ok(block)
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().expect("arena mutex poisoned").capacity()
    }

    pub fn used_bytes(&self) -> usize {
        self.state.lock().expect("arena mutex poisoned").used_bytes()
    }
}

/// An exclusively owned byte range inside a [`BuddyArena`].
///
/// Dropping the block returns it to the arena's free lists, so every
/// buffer-replacement point in a transform releases its old storage.
/// The `Arc` keeps the arena alive for as long as any block references it.
pub struct ArenaBlock {
    arena: Arc<BuddyArena>,
    offset: usize,
    len: usize,
}

impl ArenaBlock {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    // The pointer must be derived from the whole buffer, not a single
    // element, so its provenance covers all `len` bytes of the block.
    fn base_ptr(&self) -> *mut u8 {
        let buffer = self.arena.buf.as_ptr().cast::<u8>().cast_mut();
        unsafe { buffer.add(self.offset) }
    }
}

impl Deref for ArenaBlock {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.base_ptr(), self.len) }
    }
}

impl DerefMut for ArenaBlock {
    fn deref_mut(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.base_ptr(), self.len) }
    }
}

impl Drop for ArenaBlock {
    fn drop(&mut self) {
        let mut state = self.arena.state.lock().expect("arena mutex poisoned");
        if let Err(err) = state.release(self.offset) {
            warn!(
                "failed to return arena block at {:#x}: {}",
                self.offset, err
            );
        }
    }
}
