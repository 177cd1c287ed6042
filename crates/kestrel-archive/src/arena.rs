//! Dump-time arena: a reserved address range with a lazily committed prefix.
//!
//! The arena is the single backing store for every region in a dump. It is
//! addressed by byte offsets from the start of the reservation; the word
//! values *stored in* the arena are archive addresses, i.e.
//! `base_address + offset`. Keeping the two coordinate systems separate is
//! what makes the image relocatable: offsets never change, and every stored
//! archive address is tracked by the pointer map so it can be rewritten
//! when the image maps somewhere else.
//!
//! Commit is lazy. The backing buffer only grows when a region's cursor
//! passes the committed prefix, so peak dump memory tracks the bytes
//! actually written, not the reservation.

use crate::align::{align_up, is_aligned};
use crate::WORD_SIZE;

/// Default reservation for an arena (64 MiB). Reservation is an upper
/// bound, not an allocation; untouched space costs nothing.
pub const DEFAULT_RESERVATION: usize = 64 * 1024 * 1024;

/// Default dump-time base address for the archive.
pub const DEFAULT_BASE_ADDRESS: usize = 0x8_0000_0000;

/// Default granule regions are packed to.
pub const DEFAULT_REGION_ALIGNMENT: usize = 4096;

/// Configuration for a dump-time [`Arena`].
#[derive(Debug, Clone)]
pub struct ArenaConfig {
    /// Size of the reservation in bytes. Rounded up to `region_alignment`.
    pub reserved: usize,
    /// Address the archive pretends to occupy at dump time. Must be
    /// non-zero and word-aligned; zero would make a stored null
    /// indistinguishable from a pointer to the archive's first byte.
    pub base_address: usize,
    /// Granule regions are packed to. Must be a power of two no smaller
    /// than the word size.
    pub region_alignment: usize,
    /// Whether this is the archive's primary reservation. Regions backed
    /// by a bounded arena refuse to grow past the offset limit that
    /// archived cross-references can encode.
    pub bounded: bool,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            reserved: DEFAULT_RESERVATION,
            base_address: DEFAULT_BASE_ADDRESS,
            region_alignment: DEFAULT_REGION_ALIGNMENT,
            bounded: true,
        }
    }
}

/// A reserved byte range with a zero-filled committed prefix.
#[derive(Debug)]
pub struct Arena {
    /// Committed prefix of the reservation. `bytes.len()` is the commit
    /// high-water mark; everything past it is reserved but untouched.
    bytes: Vec<u8>,
    /// Total reservation in bytes.
    limit: usize,
    base_address: usize,
    region_alignment: usize,
    bounded: bool,
}

impl Arena {
    /// Reserve an arena per `config`. Nothing is committed yet.
    ///
    /// # Panics
    ///
    /// Panics if the base address is zero or not word-aligned, or if the
    /// region alignment is not a power of two at least the word size.
    pub fn new(config: ArenaConfig) -> Self {
        assert!(config.base_address != 0, "arena base address must be non-zero");
        assert!(
            is_aligned(config.base_address, WORD_SIZE),
            "arena base address must be word-aligned"
        );
        assert!(
            config.region_alignment.is_power_of_two() && config.region_alignment >= WORD_SIZE,
            "region alignment must be a power of two >= word size"
        );
        Self {
            bytes: Vec::new(),
            limit: align_up(config.reserved, config.region_alignment),
            base_address: config.base_address,
            region_alignment: config.region_alignment,
            bounded: config.bounded,
        }
    }

    /// Size of the reservation in bytes.
    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Bytes committed so far.
    #[inline]
    pub fn committed(&self) -> usize {
        self.bytes.len()
    }

    /// Dump-time base address of the archive.
    #[inline]
    pub fn base_address(&self) -> usize {
        self.base_address
    }

    /// Granule regions are packed to.
    #[inline]
    pub fn region_alignment(&self) -> usize {
        self.region_alignment
    }

    /// Whether regions backed by this arena enforce the encodable-offset
    /// limit.
    #[inline]
    pub fn is_bounded(&self) -> bool {
        self.bounded
    }

    /// The committed image, ready to be persisted.
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Grow the committed prefix to cover `new_top`. New bytes are zero.
    /// No-op when `new_top` is already committed; the commit never
    /// retreats.
    pub(crate) fn commit_to(&mut self, new_top: usize) {
        debug_assert!(new_top <= self.limit, "commit past the reservation");
        if new_top > self.bytes.len() {
            self.bytes.resize(new_top, 0);
        }
    }

    /// Zero `len` bytes starting at `offset`. The range must be committed.
    pub(crate) fn zero_fill(&mut self, offset: usize, len: usize) {
        self.bytes[offset..offset + len].fill(0);
    }

    /// Read the word slot at byte `offset`.
    ///
    /// # Panics
    ///
    /// Panics if the slot is not fully committed.
    #[inline]
    pub fn word_at(&self, offset: usize) -> usize {
        let mut buf = [0u8; WORD_SIZE];
        buf.copy_from_slice(&self.bytes[offset..offset + WORD_SIZE]);
        usize::from_ne_bytes(buf)
    }

    /// Overwrite the word slot at byte `offset`.
    ///
    /// # Panics
    ///
    /// Panics if the slot is not fully committed.
    #[inline]
    pub fn put_word(&mut self, offset: usize, value: usize) {
        self.bytes[offset..offset + WORD_SIZE].copy_from_slice(&value.to_ne_bytes());
    }

    /// Copy `data` into the arena at byte `offset`.
    ///
    /// # Panics
    ///
    /// Panics if the destination range is not fully committed.
    pub fn write_bytes(&mut self, offset: usize, data: &[u8]) {
        self.bytes[offset..offset + data.len()].copy_from_slice(data);
    }
}
