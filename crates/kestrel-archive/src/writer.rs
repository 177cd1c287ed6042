//! Dump-side field visitor.
//!
//! Appends one word per visited field to a region, registering the
//! pointer-bearing slots with the pointer map as it goes. The stream it
//! produces is consumed by [`crate::ArchiveReader`] running the same
//! traversal.

use crate::arena::Arena;
use crate::error::{ArchiveError, ArchiveResult};
use crate::heap::{HeapRef, ObjectHeap};
use crate::pointer_map::PointerMap;
use crate::region::Region;
use crate::visit::FieldVisitor;
use crate::WORD_SIZE;

/// Serializes visited fields into a region of the dump arena.
pub struct ArchiveWriter<'a> {
    region: &'a mut Region,
    arena: &'a mut Arena,
    marker: &'a mut PointerMap,
    heap: &'a dyn ObjectHeap,
}

impl<'a> ArchiveWriter<'a> {
    /// Write into `region`, marking pointer slots in `marker`.
    pub fn new(
        region: &'a mut Region,
        arena: &'a mut Arena,
        marker: &'a mut PointerMap,
        heap: &'a dyn ObjectHeap,
    ) -> Self {
        Self {
            region,
            arena,
            marker,
            heap,
        }
    }

    fn append(&mut self, value: usize, mark: bool) -> ArchiveResult<()> {
        self.region.append_word(self.arena, self.marker, value, mark)
    }
}

impl FieldVisitor for ArchiveWriter<'_> {
    fn reading(&self) -> bool {
        false
    }

    fn visit_u32(&mut self, value: &mut u32) -> ArchiveResult<()> {
        self.append(*value as usize, false)
    }

    fn visit_bool(&mut self, value: &mut bool) -> ArchiveResult<()> {
        self.append(*value as usize, false)
    }

    fn visit_ptr(&mut self, slot: &mut usize) -> ArchiveResult<()> {
        self.append(*slot, true)
    }

    fn visit_tag(&mut self, tag: u32) -> ArchiveResult<()> {
        self.append(tag as usize, false)
    }

    fn visit_region(&mut self, words: &mut [usize]) -> ArchiveResult<()> {
        self.visit_tag((words.len() * WORD_SIZE) as u32)?;
        // Conservatively mark every payload slot; marking skips nulls and
        // compaction prunes the rest.
        for word in words.iter() {
            self.append(*word, true)?;
        }
        Ok(())
    }

    fn visit_reference(&mut self, slot: &mut Option<HeapRef>) -> ArchiveResult<()> {
        match *slot {
            None => self.append(0, false),
            Some(reference) => {
                if !self.heap.archiving_allowed(reference) {
                    return Err(ArchiveError::ArchivingDisallowed);
                }
                self.append(self.heap.encode_non_null(reference), true)
            }
        }
    }
}
