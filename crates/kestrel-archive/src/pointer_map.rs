//! Tracking of pointer-bearing slots in the dump arena.
//!
//! Every word slot that holds an archive address gets one bit here, indexed
//! by its word distance from the start of the pointer window. The map is
//! populated while the archive is written, compacted once when writing is
//! done, then persisted next to the image. At load time the same bits tell
//! [`crate::Relocator`] which words to rewrite.

use std::ops::Range;

use crate::align::is_aligned;
use crate::arena::Arena;
use crate::bitmap::Bitmap;
use crate::error::{ArchiveError, ArchiveResult};
use crate::WORD_SIZE;

/// Bitmap over the pointer-bearing window of a dump arena.
#[derive(Debug)]
pub struct PointerMap {
    map: Bitmap,
    window: Range<usize>,
    compacted: bool,
}

impl PointerMap {
    /// Create a map over the byte-offset `window`, presized for an archive
    /// of `estimated_bytes`. The estimate is a hint: marking past it grows
    /// the map.
    ///
    /// # Panics
    ///
    /// Panics if the window bounds are not word-aligned or are inverted.
    pub fn new(window: Range<usize>, estimated_bytes: usize) -> Self {
        assert!(window.start <= window.end, "inverted pointer window");
        assert!(
            is_aligned(window.start, WORD_SIZE) && is_aligned(window.end, WORD_SIZE),
            "pointer window must be word-aligned"
        );
        Self {
            map: Bitmap::new(estimated_bytes / WORD_SIZE),
            window,
            compacted: false,
        }
    }

    /// Number of bits the map currently spans.
    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the map spans zero bits.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Number of marked slots.
    #[inline]
    pub fn count_set(&self) -> usize {
        self.map.count_set()
    }

    /// Whether the slot at `offset` is marked.
    pub fn is_marked(&self, offset: usize) -> bool {
        if !self.window.contains(&offset) {
            return false;
        }
        let index = (offset - self.window.start) / WORD_SIZE;
        index < self.map.len() && self.map.get(index)
    }

    /// The byte-offset window this map covers.
    #[inline]
    pub fn window(&self) -> Range<usize> {
        self.window.clone()
    }

    /// Whether the map has been compacted and sealed.
    #[inline]
    pub fn is_compacted(&self) -> bool {
        self.compacted
    }

    /// The underlying bitmap, for persistence and relocation.
    #[inline]
    pub fn bitmap(&self) -> &Bitmap {
        &self.map
    }

    /// Record that the slot at byte `offset` holds an archive address.
    ///
    /// Slots outside the window are ignored: callers serialize fields
    /// without caring which of them landed in the pointer-bearing part of
    /// the dump. A null slot is skipped, the map grows on demand, and a
    /// slot holding the arena's base address is rejected so null stays
    /// unambiguous.
    pub fn mark(&mut self, arena: &Arena, offset: usize) -> ArchiveResult<()> {
        if self.compacted {
            return Err(ArchiveError::MapSealed);
        }
        if !self.window.contains(&offset) {
            return Ok(());
        }
        if !is_aligned(offset, WORD_SIZE) {
            return Err(ArchiveError::UnalignedSlot { offset });
        }
        let value = self.slot_value(arena, offset);
        if value == arena.base_address() {
            return Err(ArchiveError::BasePointer { offset });
        }
        if value == 0 {
            return Ok(());
        }
        let index = (offset - self.window.start) / WORD_SIZE;
        if index >= self.map.len() {
            self.map.resize((index + 1) * 2);
        }
        self.map.set(index);
        Ok(())
    }

    /// Drop the mark for the slot at byte `offset`.
    ///
    /// Unlike [`PointerMap::mark`], clearing is strict: a slot outside the
    /// window or past the map was never marked, and saying so is an error.
    pub fn clear(&mut self, offset: usize) -> ArchiveResult<()> {
        if self.compacted {
            return Err(ArchiveError::MapSealed);
        }
        if !self.window.contains(&offset) {
            return Err(ArchiveError::NotMarked { offset });
        }
        if !is_aligned(offset, WORD_SIZE) {
            return Err(ArchiveError::UnalignedSlot { offset });
        }
        let index = (offset - self.window.start) / WORD_SIZE;
        if index >= self.map.len() {
            return Err(ArchiveError::NotMarked { offset });
        }
        self.map.clear(index);
        Ok(())
    }

    /// Finish the map once writing is done.
    ///
    /// Walks every marked slot and trusts its live value: slots that became
    /// null since marking lose their bit, and any surviving value must be
    /// an archive address inside `relocatable` (a byte-offset range within
    /// the arena). The map is then truncated to the highest surviving bit
    /// plus one and sealed.
    pub fn compact(&mut self, arena: &Arena, relocatable: Range<usize>) -> ArchiveResult<()> {
        if self.compacted {
            return Err(ArchiveError::AlreadyCompacted);
        }
        let lo = arena.base_address() + relocatable.start;
        let hi = arena.base_address() + relocatable.end;
        let mut highest = 0usize;
        let marked: Vec<usize> = self.map.iter_set().collect();
        for index in marked {
            let offset = self.window.start + index * WORD_SIZE;
            let value = self.slot_value(arena, offset);
            if value == 0 {
                self.map.clear(index);
            } else if value < lo || value >= hi {
                return Err(ArchiveError::StrayPointer { offset, value });
            } else {
                highest = index;
            }
        }
        self.map.resize(highest + 1);
        self.compacted = true;
        Ok(())
    }

    /// Read the slot's current value. A slot past the committed prefix was
    /// never written, so its value is null.
    fn slot_value(&self, arena: &Arena, offset: usize) -> usize {
        if offset + WORD_SIZE <= arena.committed() {
            arena.word_at(offset)
        } else {
            0
        }
    }
}
