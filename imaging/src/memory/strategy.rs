use std::{
    ops::{Deref, DerefMut},
    sync::Arc,
};

use super::{
    arena::{ArenaBlock, BuddyArena},
    buddy_allocator::AllocError,
};

/// Backing storage for one pixel buffer.
///
/// Teardown is decided by the variant: heap buffers free on drop, arena
/// blocks return to their arena's free lists.
pub enum PixelBuf {
    Heap(Box<[u8]>),
    Arena(ArenaBlock),
}

impl Deref for PixelBuf {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            PixelBuf::Heap(bytes) => bytes,
            PixelBuf::Arena(block) => block,
        }
    }
}

impl DerefMut for PixelBuf {
    fn deref_mut(&mut self) -> &mut [u8] {
        match self {
            PixelBuf::Heap(bytes) => bytes,
            PixelBuf::Arena(block) => block,
        }
    }
}

/// Allocation strategy injected into a [`PixelStore`](crate::raster::PixelStore).
///
/// Making the strategy an explicit constructor parameter keeps ownership and
/// teardown responsibility unambiguous; there is no "null allocator means
/// heap" convention anywhere.
pub trait PixelAllocator: Send + Sync {
    fn allocate_zeroed(&self, len: usize) -> Result<PixelBuf, AllocError>;

    /// Short label for benchmark reports.
    fn name(&self) -> &'static str;
}

/// Default strategy: plain heap allocations.
pub struct HeapAllocator;

impl PixelAllocator for HeapAllocator {
    fn allocate_zeroed(&self, len: usize) -> Result<PixelBuf, AllocError> {
        if len == 0 {
            // Keep the contract uniform with the arena path.
            return Err(AllocError::InvalidSize);
        }
        Ok(PixelBuf::Heap(vec![0u8; len].into_boxed_slice()))
    }

    fn name(&self) -> &'static str {
        "heap"
    }
}

impl PixelAllocator for Arc<BuddyArena> {
    fn allocate_zeroed(&self, len: usize) -> Result<PixelBuf, AllocError> {
        Ok(PixelBuf::Arena(BuddyArena::allocate_zeroed(
            self.clone(),
            len,
        )?))
    }

    fn name(&self) -> &'static str {
        "buddy arena"
    }
}
