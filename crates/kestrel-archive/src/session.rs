//! Dump session: single owner of the arena and the pointer map.
//!
//! A dump is one session. Constructing it reserves the arena and sizes the
//! pointer map; every write path borrows through it, so there is no global
//! state to initialize twice or to leak between dumps.

use std::ops::Range;

use crate::arena::{Arena, ArenaConfig};
use crate::error::ArchiveResult;
use crate::heap::ObjectHeap;
use crate::pointer_map::PointerMap;
use crate::region::Region;
use crate::writer::ArchiveWriter;

/// Pointer-map presize for debug builds. Deliberately small so routine
/// test dumps exercise the map's grow path.
const DEBUG_MAP_ESTIMATE: usize = 64 * 1024;

/// Owner of one dump's arena and pointer map.
#[derive(Debug)]
pub struct DumpSession {
    arena: Arena,
    pointer_map: PointerMap,
}

impl DumpSession {
    /// Start a dump session over a fresh arena.
    ///
    /// The pointer window covers the whole reservation. In release builds
    /// the map is presized for it; debug builds start small and grow.
    pub fn new(config: ArenaConfig) -> Self {
        let arena = Arena::new(config);
        let estimate = if cfg!(debug_assertions) {
            DEBUG_MAP_ESTIMATE.min(arena.limit())
        } else {
            arena.limit()
        };
        let pointer_map = PointerMap::new(0..arena.limit(), estimate);
        Self { arena, pointer_map }
    }

    /// The session's arena.
    #[inline]
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Mutable access to the arena, for traversal code that fills
    /// allocations directly.
    #[inline]
    pub fn arena_mut(&mut self) -> &mut Arena {
        &mut self.arena
    }

    /// The session's pointer map.
    #[inline]
    pub fn pointer_map(&self) -> &PointerMap {
        &self.pointer_map
    }

    /// Mark the slot at byte `offset` as pointer-bearing. Used by code
    /// that stores archive addresses outside the serialized stream.
    pub fn mark(&mut self, offset: usize) -> ArchiveResult<()> {
        self.pointer_map.mark(&self.arena, offset)
    }

    /// Drop the mark for the slot at byte `offset`.
    pub fn clear(&mut self, offset: usize) -> ArchiveResult<()> {
        self.pointer_map.clear(offset)
    }

    /// A writer appending to `region` on behalf of this session.
    pub fn writer<'a>(
        &'a mut self,
        region: &'a mut Region,
        heap: &'a dyn ObjectHeap,
    ) -> ArchiveWriter<'a> {
        ArchiveWriter::new(region, &mut self.arena, &mut self.pointer_map, heap)
    }

    /// Compact and seal the pointer map once writing is done.
    /// `relocatable` is the byte-offset range archived pointers may target.
    pub fn compact(&mut self, relocatable: Range<usize>) -> ArchiveResult<()> {
        self.pointer_map.compact(&self.arena, relocatable)
    }

    /// Tear the session apart for persistence: the arena holding the
    /// image, and the compacted pointer map.
    pub fn into_parts(self) -> (Arena, PointerMap) {
        (self.arena, self.pointer_map)
    }
}
