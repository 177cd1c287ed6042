//! Load-time pointer relocation.
//!
//! When the archive maps at a different address than it was dumped at,
//! every word the pointer map tracks is off by the same delta. The
//! relocator walks the persisted bitmap and rewrites those words in the
//! mapped image, validating each value on the way so a corrupt map or
//! image fails loudly instead of planting wild pointers.

use std::ops::Range;

use crate::bitmap::Bitmap;
use crate::error::{ArchiveError, ArchiveResult};
use crate::WORD_SIZE;

/// Rewrites marked words by a fixed delta.
#[derive(Debug, Clone)]
pub struct Relocator {
    window_base: usize,
    delta: isize,
    valid_old: Range<usize>,
    valid_new: Range<usize>,
}

impl Relocator {
    /// Create a relocator.
    ///
    /// `window_base` is the byte offset in the image where the pointer
    /// window starts (bit 0 of the map refers to it). `valid_old` bounds
    /// the values the dump produced; `valid_new` bounds the values after
    /// applying `delta`.
    pub fn new(
        window_base: usize,
        delta: isize,
        valid_old: Range<usize>,
        valid_new: Range<usize>,
    ) -> Self {
        Self {
            window_base,
            delta,
            valid_old,
            valid_new,
        }
    }

    /// The delta applied to each marked word.
    #[inline]
    pub fn delta(&self) -> isize {
        self.delta
    }

    /// Rewrite every word marked in `map` inside the mapped `image`.
    /// Returns the number of words rewritten.
    ///
    /// A compacted map holds no null slots, so a null or out-of-range
    /// value here means the map and the image do not belong together.
    pub fn apply(&self, image: &mut [u8], map: &Bitmap) -> ArchiveResult<usize> {
        let mut relocated = 0;
        for index in map.iter_set() {
            let offset = self.window_base + index * WORD_SIZE;
            let end = offset + WORD_SIZE;
            if end > image.len() {
                return Err(ArchiveError::Truncated { position: index });
            }

            let mut buf = [0u8; WORD_SIZE];
            buf.copy_from_slice(&image[offset..end]);
            let old = usize::from_ne_bytes(buf);
            if !self.valid_old.contains(&old) {
                return Err(ArchiveError::StrayPointer { offset, value: old });
            }

            let new = old.wrapping_add_signed(self.delta);
            if !self.valid_new.contains(&new) {
                return Err(ArchiveError::StrayPointer { offset, value: new });
            }
            image[offset..end].copy_from_slice(&new.to_ne_bytes());
            relocated += 1;
        }
        Ok(relocated)
    }
}
