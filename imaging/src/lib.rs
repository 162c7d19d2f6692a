pub mod memory;
pub mod raster;

pub use memory::{AllocError, BuddyArena, HeapAllocator, PixelAllocator, PixelBuf};
pub use raster::PixelStore;
