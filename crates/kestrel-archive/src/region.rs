//! Archive regions: named bump allocators over a shared arena.
//!
//! A dump lays its content out in consecutive regions (read-write metadata,
//! read-only metadata, ...). Each region owns a `[base, end)` slice of the
//! arena and advances a `top` cursor through it. Packing a region rounds its
//! end down onto the region granule and hands the boundary to the next
//! region, so the finished image is a gapless sequence of aligned regions.

use std::fmt;

use crate::align::{align_up, is_aligned};
use crate::arena::Arena;
use crate::error::{ArchiveError, ArchiveResult};
use crate::pointer_map::PointerMap;
use crate::{MAX_ARCHIVE_DELTA, OBJECT_ALIGNMENT, WORD_SIZE};

/// A named bump-allocated span of the dump arena.
///
/// Invariant: `base <= top <= end` once the region is bound.
#[derive(Debug)]
pub struct Region {
    name: &'static str,
    base: usize,
    top: usize,
    end: usize,
    bound: bool,
    packed: bool,
}

impl Region {
    /// Create an unbound region. It cannot allocate until it is bound,
    /// either by [`Region::init`] or by a predecessor's [`Region::pack`].
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            base: 0,
            top: 0,
            end: 0,
            bound: false,
            packed: false,
        }
    }

    /// Bind the first region of a dump to the whole arena.
    pub fn init(&mut self, arena: &Arena) {
        debug_assert!(!self.bound, "region bound twice");
        self.base = 0;
        self.top = 0;
        self.end = arena.limit();
        self.bound = true;
    }

    /// Region name, used in diagnostics and errors.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Arena offset where the region starts.
    #[inline]
    pub fn base(&self) -> usize {
        self.base
    }

    /// Arena offset of the bump cursor.
    #[inline]
    pub fn top(&self) -> usize {
        self.top
    }

    /// Arena offset the region may grow to.
    #[inline]
    pub fn end(&self) -> usize {
        self.end
    }

    /// Bytes allocated so far.
    #[inline]
    pub fn used(&self) -> usize {
        self.top - self.base
    }

    /// Bytes remaining between the cursor and the region's bound.
    #[inline]
    pub fn available(&self) -> usize {
        self.end - self.top
    }

    /// Whether the region has been bound to an arena.
    #[inline]
    pub fn is_bound(&self) -> bool {
        self.bound
    }

    /// Whether the region has been packed.
    #[inline]
    pub fn is_packed(&self) -> bool {
        self.packed
    }

    /// Advance the cursor to `new_top`, committing arena memory as needed.
    ///
    /// Commit stays lazy: memory is only committed when the cursor passes
    /// the arena's committed prefix, and never before the bounds checks
    /// pass.
    pub fn grow_to(&mut self, arena: &mut Arena, new_top: usize) -> ArchiveResult<()> {
        if !self.bound {
            return Err(ArchiveError::RegionUnbound { region: self.name });
        }
        if self.packed {
            return Err(ArchiveError::RegionPacked { region: self.name });
        }
        if new_top > self.end {
            return Err(ArchiveError::OutOfSpace {
                region: self.name,
                requested: new_top - self.top,
                available: self.available(),
            });
        }
        // Offsets past this limit cannot be encoded by archived
        // cross-references, no matter how large the reservation is.
        if arena.is_bounded() && new_top > MAX_ARCHIVE_DELTA {
            return Err(ArchiveError::DeltaOverflow {
                region: self.name,
                offset: new_top,
                limit: MAX_ARCHIVE_DELTA,
            });
        }
        arena.commit_to(new_top);
        self.top = new_top;
        Ok(())
    }

    /// Allocate `num_bytes` and return the arena offset of the allocation.
    ///
    /// Both the start offset and the size are rounded up to
    /// [`OBJECT_ALIGNMENT`]. The returned range is zeroed.
    pub fn allocate(&mut self, arena: &mut Arena, num_bytes: usize) -> ArchiveResult<usize> {
        let p = align_up(self.top, OBJECT_ALIGNMENT);
        let aligned = align_up(num_bytes, OBJECT_ALIGNMENT);
        let new_top = match p.checked_add(aligned) {
            Some(t) => t,
            None => {
                return Err(ArchiveError::OutOfSpace {
                    region: self.name,
                    requested: aligned,
                    available: self.available(),
                })
            }
        };
        self.grow_to(arena, new_top)?;
        // Allocations are handed out zeroed.
        arena.zero_fill(p, new_top - p);
        Ok(p)
    }

    /// Append one word at the cursor, optionally registering the slot with
    /// the pointer map. The slot value is read back by `mark`, so the word
    /// is stored before marking.
    pub fn append_word(
        &mut self,
        arena: &mut Arena,
        marker: &mut PointerMap,
        value: usize,
        mark: bool,
    ) -> ArchiveResult<()> {
        let slot = self.top;
        debug_assert!(is_aligned(slot, WORD_SIZE), "append at unaligned top");
        self.grow_to(arena, slot + WORD_SIZE)?;
        arena.put_word(slot, value);
        if mark {
            marker.mark(arena, slot)?;
        }
        Ok(())
    }

    /// Seal the region: round its end up to the arena's region granule and
    /// seed `next` to start there.
    ///
    /// The committed prefix is untouched; the padding between `top` and the
    /// aligned end is only committed if the next region grows into it.
    pub fn pack(&mut self, next: Option<&mut Region>, arena: &Arena) -> ArchiveResult<()> {
        if self.packed {
            return Err(ArchiveError::AlreadyPacked { region: self.name });
        }
        if !self.bound {
            return Err(ArchiveError::RegionUnbound { region: self.name });
        }
        if let Some(n) = next.as_deref() {
            if n.packed {
                return Err(ArchiveError::RegionPacked { region: n.name });
            }
        }
        self.end = align_up(self.top, arena.region_alignment());
        debug_assert!(self.end <= arena.limit());
        self.packed = true;
        if let Some(next) = next {
            next.base = self.end;
            next.top = self.end;
            next.end = arena.limit();
            next.bound = true;
        }
        Ok(())
    }

    /// Snapshot of the region's utilization for reporting.
    pub fn stats(&self) -> RegionStats {
        RegionStats {
            name: self.name,
            base: self.base,
            used: self.used(),
            reserved: self.end - self.base,
        }
    }
}

/// Utilization snapshot of one region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionStats {
    /// Region name.
    pub name: &'static str,
    /// Arena offset where the region starts.
    pub base: usize,
    /// Bytes allocated.
    pub used: usize,
    /// Bytes reserved for the region.
    pub reserved: usize,
}

impl RegionStats {
    /// Percentage of the reservation in use.
    pub fn utilization(&self) -> f64 {
        if self.reserved == 0 {
            0.0
        } else {
            self.used as f64 * 100.0 / self.reserved as f64
        }
    }
}

impl fmt::Display for RegionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} space: {:9} bytes [{:5.1}% used] out of {:9} reserved at +{:#x}",
            self.name,
            self.used,
            self.utilization(),
            self.reserved,
            self.base
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::ArenaConfig;

    fn small_arena(reserved: usize) -> Arena {
        Arena::new(ArenaConfig {
            reserved,
            ..Default::default()
        })
    }

    #[test]
    fn test_allocate_aligns_offsets_and_sizes() {
        let mut arena = small_arena(8192);
        let mut region = Region::new("rw");
        region.init(&arena);

        let a = region.allocate(&mut arena, 10).unwrap();
        let b = region.allocate(&mut arena, 10).unwrap();
        assert_eq!(a, 0);
        assert_eq!(b, 16);
        assert_eq!(region.top(), 32);
    }

    #[test]
    fn test_allocate_commits_lazily() {
        let mut arena = small_arena(8192);
        let mut region = Region::new("rw");
        region.init(&arena);
        assert_eq!(arena.committed(), 0);

        region.allocate(&mut arena, 100).unwrap();
        assert_eq!(arena.committed(), 104);
        assert!(arena.bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_out_of_space_names_region() {
        let mut arena = small_arena(4096);
        let mut region = Region::new("core");
        region.init(&arena);

        region.allocate(&mut arena, 4096).unwrap();
        let err = region.allocate(&mut arena, 8).unwrap_err();
        assert_eq!(
            err,
            ArchiveError::OutOfSpace {
                region: "core",
                requested: 8,
                available: 0,
            }
        );
    }

    #[test]
    fn test_unbound_region_cannot_allocate() {
        let mut arena = small_arena(4096);
        let mut region = Region::new("loose");
        let err = region.allocate(&mut arena, 8).unwrap_err();
        assert_eq!(err, ArchiveError::RegionUnbound { region: "loose" });
    }

    #[test]
    fn test_pack_aligns_end_and_seeds_next() {
        let mut arena = small_arena(8192);
        let mut rw = Region::new("rw");
        let mut ro = Region::new("ro");
        rw.init(&arena);

        rw.allocate(&mut arena, 10).unwrap();
        assert_eq!(rw.top(), 16);

        rw.pack(Some(&mut ro), &arena).unwrap();
        assert_eq!(rw.end(), 4096);
        assert!(rw.is_packed());
        assert_eq!(ro.base(), 4096);
        assert_eq!(ro.top(), 4096);
        assert_eq!(ro.end(), 8192);
        assert!(ro.is_bound());

        // The padding between top and the packed end stays uncommitted.
        assert_eq!(arena.committed(), 16);

        let err = rw.allocate(&mut arena, 8).unwrap_err();
        assert_eq!(err, ArchiveError::RegionPacked { region: "rw" });
        let err = rw.pack(None, &arena).unwrap_err();
        assert_eq!(err, ArchiveError::AlreadyPacked { region: "rw" });
    }

    #[test]
    fn test_next_region_allocates_from_aligned_base() {
        let mut arena = small_arena(8192);
        let mut rw = Region::new("rw");
        let mut ro = Region::new("ro");
        rw.init(&arena);

        rw.allocate(&mut arena, 24).unwrap();
        rw.pack(Some(&mut ro), &arena).unwrap();

        let p = ro.allocate(&mut arena, 8).unwrap();
        assert_eq!(p, 4096);
        assert_eq!(arena.committed(), 4104);
    }

    #[test]
    fn test_delta_overflow_checked_before_commit() {
        let mut arena = Arena::new(ArenaConfig {
            reserved: MAX_ARCHIVE_DELTA + 4096,
            ..Default::default()
        });
        let mut region = Region::new("rw");
        region.init(&arena);

        let err = region.grow_to(&mut arena, MAX_ARCHIVE_DELTA + 1).unwrap_err();
        assert_eq!(
            err,
            ArchiveError::DeltaOverflow {
                region: "rw",
                offset: MAX_ARCHIVE_DELTA + 1,
                limit: MAX_ARCHIVE_DELTA,
            }
        );
        assert_eq!(arena.committed(), 0);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "unaligned")]
    fn test_append_word_panics_on_unaligned_top() {
        let mut arena = small_arena(4096);
        let mut map = PointerMap::new(0..4096, 4096);
        let mut region = Region::new("rw");
        region.init(&arena);

        // grow_to places the cursor freely; appends require word alignment.
        region.grow_to(&mut arena, 3).unwrap();
        let _ = region.append_word(&mut arena, &mut map, 7, false);
    }

    #[test]
    fn test_stats_display() {
        let mut arena = small_arena(8192);
        let mut region = Region::new("rw");
        region.init(&arena);
        region.allocate(&mut arena, 1024).unwrap();

        let stats = region.stats();
        assert_eq!(stats.used, 1024);
        assert_eq!(stats.reserved, 8192);
        let line = stats.to_string();
        assert!(line.contains("rw space:"));
        assert!(line.contains("12.5"));
    }
}
