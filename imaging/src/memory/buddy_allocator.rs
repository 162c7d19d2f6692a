use std::collections::HashMap;

use thiserror::Error;

/// Errors surfaced by the arena allocation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
    /// A zero-sized allocation was requested.
    #[error("allocation size must be greater than zero")]
    InvalidSize,
    /// No free block of sufficient order exists, even after coalescing.
    #[error("arena is out of memory")]
    OutOfMemory,
    /// The offset does not name a live allocation (double or foreign release).
    #[error("offset {0:#x} is not an allocated block")]
    NotAllocated(usize),
}

/// Smallest block the allocator hands out. Pixel buffers are whole images,
/// so a finer granularity would only bloat the free lists.
pub const MIN_BLOCK_SIZE: usize = 64;

/// Classic buddy allocator over a fixed power-of-two capacity.
///
/// This is pure bookkeeping: allocations are identified by byte offsets into
/// an externally owned region, which is what lets the same allocator manage
/// an in-process arena here and would let it manage e.g. a GPU buffer.
pub struct BuddyAllocator {
    unit: usize,
    max_order: u8,
    /// Free block offsets per order. Unordered within an order.
    free_lists: Vec<Vec<usize>>,
    /// Offset -> order for every live allocation. Doubles as the
    /// double-release check.
    allocated: HashMap<usize, u8>,
    used_bytes: usize,
}

impl BuddyAllocator {
    /// Create an allocator for `capacity` bytes, rounded up to a power of two.
    /// `unit` is the smallest allocatable block size and must be a power of two.
    pub fn new(capacity: usize, unit: usize) -> Self {
        assert!(unit.is_power_of_two(), "unit must be a power of two");
        assert!(capacity > 0, "capacity must be greater than zero");

        let capacity = capacity.next_power_of_two().max(unit);
        let max_order = (capacity / unit).trailing_zeros() as u8;

        let mut free_lists = vec![Vec::new(); max_order as usize + 1];
        // Initially there's just a single large free block.
        free_lists[max_order as usize].push(0);

        BuddyAllocator {
            unit,
            max_order,
            free_lists,
            allocated: HashMap::new(),
            used_bytes: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.unit << self.max_order
    }

    pub fn used_bytes(&self) -> usize {
        self.used_bytes
    }

    pub fn available_bytes(&self) -> usize {
        self.capacity() - self.used_bytes
    }

    /// Size of the block granted for the live allocation at `offset`.
    pub fn block_size(&self, offset: usize) -> Option<usize> {
        self.allocated.get(&offset).map(|&order| self.unit << order)
    }

    /// True when nothing is allocated and all blocks have coalesced back
    /// into the single top-order block.
    pub fn is_pristine(&self) -> bool {
        self.allocated.is_empty()
            && self.free_lists[self.max_order as usize].len() == 1
            && self.free_lists[..self.max_order as usize]
                .iter()
                .all(Vec::is_empty)
    }

    /// Allocate a block of at least `size` bytes and return its offset.
    pub fn allocate(&mut self, size: usize) -> Result<usize, AllocError> {
        if size == 0 {
            return Err(AllocError::InvalidSize);
        }

        let target = self.order_for_size(size);

        // First non-empty free list at or above the target order. A target
        // above the top order makes the range empty, which reports the
        // oversized request as exhaustion rather than touching any state.
        let found = (target..=self.max_order)
            .find(|&order| !self.free_lists[order as usize].is_empty())
            .ok_or(AllocError::OutOfMemory)?;

        let offset = self.free_lists[found as usize]
            .pop()
            .expect("free list checked non-empty");

        // Split down to the target order, parking the right half at each level.
        let mut order = found;
        while order > target {
            order -= 1;
            self.free_lists[order as usize].push(offset + (self.unit << order));
        }

        self.allocated.insert(offset, target);
        self.used_bytes += self.unit << target;
        Ok(offset)
    }

    /// Return the block at `offset` to the free lists, coalescing with its
    /// buddy at each order while possible.
    pub fn release(&mut self, offset: usize) -> Result<(), AllocError> {
        let order = self
            .allocated
            .remove(&offset)
            .ok_or(AllocError::NotAllocated(offset))?;
        self.used_bytes -= self.unit << order;

        let mut offset = offset;
        let mut order = order;
        while order < self.max_order {
            let buddy = offset ^ (self.unit << order);
            let list = &mut self.free_lists[order as usize];
            match list.iter().position(|&free| free == buddy) {
                Some(index) => {
                    // Buddy is free at the same order: merge into the parent.
                    list.swap_remove(index);
                    offset = offset.min(buddy);
                    order += 1;
                }
                None => break,
            }
        }

        self.free_lists[order as usize].push(offset);
        Ok(())
    }

    // Smallest order whose block fits `size` bytes.
    fn order_for_size(&self, size: usize) -> u8 {
        let units = size.div_ceil(self.unit).next_power_of_two();
        units.trailing_zeros() as u8
    }
}
