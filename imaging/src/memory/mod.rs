pub mod arena;
pub mod buddy_allocator;
pub mod strategy;

pub use arena::{ArenaBlock, BuddyArena};
pub use buddy_allocator::{AllocError, BuddyAllocator, MIN_BLOCK_SIZE};
pub use strategy::{HeapAllocator, PixelAllocator, PixelBuf};
