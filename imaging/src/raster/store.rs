use log::info;
use rayon::prelude::*;

use crate::memory::{AllocError, PixelAllocator, PixelBuf};

/// Dense pixel buffer in row-major, channel-minor order, with an injected
/// allocation strategy.
///
/// Transforms that change the shape (rotate, scale) build a whole new buffer
/// from the same strategy and replace the old one; dropping the old buffer
/// releases its storage, so arena memory is recycled across transforms.
pub struct PixelStore {
    width: usize,
    height: usize,
    channels: usize,
    data: PixelBuf,
    allocator: Box<dyn PixelAllocator>,
}

impl PixelStore {
    /// Build a store by copying a decoded flat buffer into storage obtained
    /// from `allocator`.
    pub fn from_flat(
        pixels: &[u8],
        width: usize,
        height: usize,
        channels: usize,
        allocator: Box<dyn PixelAllocator>,
    ) -> Result<Self, AllocError> {
        assert_eq!(
            pixels.len(),
            width * height * channels,
            "flat buffer does not match the stated dimensions"
        );

        let mut data = allocator.allocate_zeroed(pixels.len())?;
        data.copy_from_slice(pixels);

        Ok(PixelStore {
            width,
            height,
            channels,
            data,
            allocator,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn allocator_name(&self) -> &'static str {
        self.allocator.name()
    }

    /// Byte offset of `(row, col, channel)` in the flat buffer.
    fn index(&self, row: usize, col: usize, channel: usize) -> usize {
        if row >= self.height || col >= self.width || channel >= self.channels {
            panic!(
                "pixel coordinates out of bounds: ({}, {}, {})",
                row, col, channel
            );
        }

        (row * self.width + col) * self.channels + channel
    }

    pub fn get(&self, row: usize, col: usize, channel: usize) -> u8 {
        self.data[self.index(row, col, channel)]
    }

    pub fn set(&mut self, row: usize, col: usize, channel: usize, value: u8) {
        let index = self.index(row, col, channel);
        self.data[index] = value;
    }

    /// Replace every channel value `v` with `255 - v`, in place.
    pub fn invert(&mut self) {
        let row_stride = self.width * self.channels;
        let bytes: &mut [u8] = &mut self.data;
        bytes.par_chunks_mut(row_stride).for_each(|row| {
            for value in row {
                *value = 255 - *value;
            }
        });
    }

    /// Rotate by `degrees` about the image center into a grown bounding box.
    ///
    /// Each destination pixel pulls from its inverse-mapped source
    /// coordinate (nearest neighbor), so the rotated image has no holes;
    /// destinations that map outside the source stay black.
    pub fn rotate(&mut self, degrees: f32) -> Result<(), AllocError> {
        let radians = degrees.to_radians();
        let (sin, cos) = radians.sin_cos();

        let new_width =
            (self.width as f32 * cos.abs() + self.height as f32 * sin.abs()) as usize;
        let new_height =
            (self.width as f32 * sin.abs() + self.height as f32 * cos.abs()) as usize;

        let mut dest = self
            .allocator
            .allocate_zeroed(new_width * new_height * self.channels)?;

        let cx_old = self.width as f32 / 2.0;
        let cy_old = self.height as f32 / 2.0;
        let cx_new = new_width as f32 / 2.0;
        let cy_new = new_height as f32 / 2.0;

        let width = self.width;
        let height = self.height;
        let channels = self.channels;
        let src: &[u8] = &self.data;

        let row_stride = new_width * channels;
        let dest_bytes: &mut [u8] = &mut dest;
        dest_bytes
            .par_chunks_mut(row_stride)
            .enumerate()
            .for_each(|(y, dest_row)| {
                let dy = y as f32 - cy_new;
                for x in 0..new_width {
                    let dx = x as f32 - cx_new;

                    let src_x = (cos * dx + sin * dy + cx_old) as i64;
                    let src_y = (-sin * dx + cos * dy + cy_old) as i64;

                    if src_x >= 0
                        && (src_x as usize) < width
                        && src_y >= 0
                        && (src_y as usize) < height
                    {
                        let src_index = (src_y as usize * width + src_x as usize) * channels;
                        let dest_index = x * channels;
                        dest_row[dest_index..dest_index + channels]
                            .copy_from_slice(&src[src_index..src_index + channels]);
                    }
                }
            });

        // Replacing the buffer drops the old one, which releases its storage.
        self.data = dest;
        self.width = new_width;
        self.height = new_height;

        info!(
            "rotated image by {} degrees ({}x{})",
            degrees, new_width, new_height
        );
        Ok(())
    }

    /// Nearest-neighbor scale by `factor`.
    pub fn scale(&mut self, factor: f32) -> Result<(), AllocError> {
        let new_width = (self.width as f32 * factor) as usize;
        let new_height = (self.height as f32 * factor) as usize;

        // A non-positive factor, or one small enough to collapse a dimension
        // to zero, yields a zero-length request here and surfaces as an
        // allocation error rather than a zero-sized store.
        let mut dest = self
            .allocator
            .allocate_zeroed(new_width * new_height * self.channels)?;

        let width = self.width;
        let height = self.height;
        let channels = self.channels;
        let src: &[u8] = &self.data;

        let row_stride = new_width * channels;
        let dest_bytes: &mut [u8] = &mut dest;
        dest_bytes
            .par_chunks_mut(row_stride)
            .enumerate()
            .for_each(|(y, dest_row)| {
                let src_y = ((y as f32 / factor) as usize).min(height - 1);
                for x in 0..new_width {
                    let src_x = ((x as f32 / factor) as usize).min(width - 1);

                    let src_index = (src_y * width + src_x) * channels;
                    let dest_index = x * channels;
                    dest_row[dest_index..dest_index + channels]
                        .copy_from_slice(&src[src_index..src_index + channels]);
                }
            });

        self.data = dest;
        self.width = new_width;
        self.height = new_height;

        info!("scaled image by {} ({}x{})", factor, new_width, new_height);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{BuddyArena, HeapAllocator};

    fn heap_store(pixels: &[u8], width: usize, height: usize, channels: usize) -> PixelStore {
        PixelStore::from_flat(pixels, width, height, channels, Box::new(HeapAllocator)).unwrap()
    }

    fn white_store(width: usize, height: usize, channels: usize) -> PixelStore {
        let pixels = vec![255u8; width * height * channels];
        heap_store(&pixels, width, height, channels)
    }

    #[test]
    fn test_invert_is_idempotent() {
        let pixels: Vec<u8> = (0..4 * 4 * 3).map(|i| (i * 7 % 256) as u8).collect();
        let mut store = heap_store(&pixels, 4, 4, 3);

        store.invert();
        store.invert();

        assert_eq!(store.as_bytes(), pixels.as_slice());
    }

    #[test]
    fn test_invert_white_becomes_black() {
        let mut store = white_store(4, 4, 3);
        store.invert();

        assert_eq!((store.width(), store.height(), store.channels()), (4, 4, 3));
        assert!(store.as_bytes().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_rotate_zero_is_identity() {
        let pixels: Vec<u8> = (0..8 * 6 * 3).map(|i| (i % 251) as u8).collect();
        let mut store = heap_store(&pixels, 8, 6, 3);

        store.rotate(0.0).unwrap();

        assert_eq!((store.width(), store.height()), (8, 6));
        assert_eq!(store.as_bytes(), pixels.as_slice());
    }

    #[test]
    fn test_rotate_90_swaps_dimensions() {
        let mut store = white_store(8, 4, 1);
        store.rotate(90.0).unwrap();

        assert_eq!((store.width(), store.height()), (4, 8));
    }

    #[test]
    fn test_scale_round_trip_restores_dimensions() {
        let mut store = white_store(6, 4, 3);

        store.scale(2.0).unwrap();
        assert_eq!((store.width(), store.height()), (12, 8));

        store.scale(0.5).unwrap();
        assert_eq!((store.width(), store.height()), (6, 4));
    }

    #[test]
    fn test_scale_half_is_nearest_neighbor() {
        let pixels: Vec<u8> = (0..16).collect();
        let mut store = heap_store(&pixels, 4, 4, 1);

        store.scale(0.5).unwrap();

        assert_eq!((store.width(), store.height()), (2, 2));
        // Each destination pixel maps back to source (2x, 2y).
        assert_eq!(store.as_bytes(), &[0, 2, 8, 10]);
    }

    #[test]
    fn test_scale_half_white_stays_white() {
        let mut store = white_store(4, 4, 3);
        store.scale(0.5).unwrap();

        assert_eq!((store.width(), store.height(), store.channels()), (2, 2, 3));
        assert!(store.as_bytes().iter().all(|&v| v == 255));
    }

    #[test]
    fn test_non_positive_scale_is_an_error() {
        let mut store = white_store(4, 4, 3);

        assert!(matches!(store.scale(-1.0), Err(AllocError::InvalidSize)));
        assert!(matches!(store.scale(0.0), Err(AllocError::InvalidSize)));

        // The failed transform leaves the store untouched.
        assert_eq!((store.width(), store.height()), (4, 4));
        assert!(store.as_bytes().iter().all(|&v| v == 255));
    }

    #[test]
    fn test_arena_backed_store_matches_heap() {
        let pixels: Vec<u8> = (0..10 * 7 * 3).map(|i| (i % 255) as u8).collect();
        let arena = BuddyArena::new(1 << 20);

        let mut heap = heap_store(&pixels, 10, 7, 3);
        let mut buddy =
            PixelStore::from_flat(&pixels, 10, 7, 3, Box::new(arena.clone())).unwrap();

        for store in [&mut heap, &mut buddy] {
            store.invert();
            store.rotate(30.0).unwrap();
            store.scale(1.5).unwrap();
        }

        assert_eq!((heap.width(), heap.height()), (buddy.width(), buddy.height()));
        assert_eq!(heap.as_bytes(), buddy.as_bytes());
    }

    #[test]
    fn test_arena_memory_is_recycled_across_transforms() {
        let pixels = vec![128u8; 32 * 32 * 3];
        let arena = BuddyArena::new(1 << 16);

        let mut store =
            PixelStore::from_flat(&pixels, 32, 32, 3, Box::new(arena.clone())).unwrap();
        let after_construction = arena.used_bytes();

        // Each transform drops its old buffer, so usage stays bounded by
        // one live buffer (plus transient old+new overlap inside a call).
        store.scale(0.5).unwrap();
        store.scale(2.0).unwrap();
        assert_eq!(arena.used_bytes(), after_construction);

        drop(store);
        assert_eq!(arena.used_bytes(), 0);
    }

    #[test]
    fn test_allocation_failure_propagates() {
        let arena = BuddyArena::new(1024);
        let pixels = vec![0u8; 64 * 64 * 3];

        let result = PixelStore::from_flat(&pixels, 64, 64, 3, Box::new(arena));
        assert!(matches!(result, Err(AllocError::OutOfMemory)));
    }

    #[test]
    fn test_get_set_round_trip() {
        let mut store = white_store(3, 2, 2);
        store.set(1, 2, 1, 42);
        assert_eq!(store.get(1, 2, 1), 42);
        assert_eq!(store.get(0, 0, 0), 255);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_out_of_bounds_panics() {
        let store = white_store(2, 2, 1);
        store.get(2, 0, 0);
    }
}
