//! Error types for archive building and loading.
//!
//! Every failure is detected at the violating call and returned to the
//! caller; the crate never aborts the process. The orchestrator decides
//! what a failed dump or load means for the embedding runtime.

use thiserror::Error;

/// Result alias used throughout the archive crate.
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Broad classification of an [`ArchiveError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// A region or offset limit was exhausted. Remediation is a larger
    /// reservation, not a code fix.
    CapacityExhaustion,
    /// The caller broke a lifecycle or stream contract (marking a sealed
    /// map, reading past the end, mismatched tags, ...).
    ProtocolViolation,
    /// The object heap's archiving policy rejected a reference.
    PolicyViolation,
}

/// Errors surfaced while building or reading a relocatable archive.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArchiveError {
    /// A region's bump cursor would pass its bound.
    #[error("{region} region out of space: requested {requested} bytes, {available} available")]
    OutOfSpace {
        /// Name of the exhausted region.
        region: &'static str,
        /// Bytes the failed growth asked for, measured from the cursor.
        requested: usize,
        /// Bytes remaining between the cursor and the region's bound.
        available: usize,
    },

    /// An allocation would push a region past the bounded-delta limit, so
    /// cross-references into it could no longer be encoded.
    #[error("{region} region grew past the relocatable limit: offset {offset:#x} exceeds {limit:#x}")]
    DeltaOverflow {
        /// Name of the overflowing region.
        region: &'static str,
        /// Offset the growth would have reached.
        offset: usize,
        /// Largest encodable offset.
        limit: usize,
    },

    /// The region was never bound to an arena.
    #[error("{region} region is not bound to an arena")]
    RegionUnbound {
        /// Name of the unbound region.
        region: &'static str,
    },

    /// Allocation was attempted on a packed region.
    #[error("{region} region is already packed")]
    RegionPacked {
        /// Name of the packed region.
        region: &'static str,
    },

    /// The region was packed a second time.
    #[error("{region} region was packed twice")]
    AlreadyPacked {
        /// Name of the region.
        region: &'static str,
    },

    /// Mark or clear was attempted after the pointer map was compacted.
    #[error("pointer map is sealed after compaction")]
    MapSealed,

    /// Clear of a slot that was never marked.
    #[error("slot at offset {offset:#x} was never marked")]
    NotMarked {
        /// Byte offset of the slot.
        offset: usize,
    },

    /// A slot offset inside the pointer window is not word-aligned.
    #[error("slot offset {offset:#x} is not word-aligned")]
    UnalignedSlot {
        /// Byte offset of the slot.
        offset: usize,
    },

    /// A marked slot holds the archive's base address. That value is
    /// reserved so null and "first byte of the archive" stay distinct.
    #[error("slot at offset {offset:#x} holds the archive base address")]
    BasePointer {
        /// Byte offset of the slot.
        offset: usize,
    },

    /// A marked slot survived to compaction or relocation with a value
    /// outside the relocatable range.
    #[error("slot at offset {offset:#x} holds {value:#x}, outside the relocatable range")]
    StrayPointer {
        /// Byte offset of the slot.
        offset: usize,
        /// The offending value.
        value: usize,
    },

    /// The pointer map was compacted a second time.
    #[error("pointer map was already compacted")]
    AlreadyCompacted,

    /// A tag word in the stream did not match the expected value.
    #[error("tag mismatch at word {position}: expected {expected:#x}, found {found:#x}")]
    TagMismatch {
        /// Word index of the tag in the stream.
        position: usize,
        /// Tag the traversal expected.
        expected: usize,
        /// Word actually present.
        found: usize,
    },

    /// The image ended before the requested word.
    #[error("archive truncated at word {position}")]
    Truncated {
        /// Word index of the failed read.
        position: usize,
    },

    /// A read destination already holds a value. Destinations are
    /// write-once so a desynchronized traversal cannot silently clobber
    /// live state.
    #[error("destination for word {position} is already occupied")]
    SlotOccupied {
        /// Word index about to be read into the destination.
        position: usize,
    },

    /// The object heap's policy forbids archiving the reference.
    #[error("object reference is not archivable")]
    ArchivingDisallowed,
}

impl ArchiveError {
    /// Classify this error per the failure taxonomy.
    pub fn kind(&self) -> FailureKind {
        match self {
            ArchiveError::OutOfSpace { .. } | ArchiveError::DeltaOverflow { .. } => {
                FailureKind::CapacityExhaustion
            }
            ArchiveError::ArchivingDisallowed => FailureKind::PolicyViolation,
            _ => FailureKind::ProtocolViolation,
        }
    }
}
