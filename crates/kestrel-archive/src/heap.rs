//! Seam between the archive and the embedding object heap.
//!
//! Object references cross the archive boundary as single words chosen by
//! the heap. The archive never interprets those words beyond two rules: a
//! zero word is the null reference, and non-null words are marked for
//! relocation like any other archive address.

/// Opaque handle to a heap object. The heap owns its meaning; the archive
/// only moves it around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapRef(usize);

impl HeapRef {
    /// Wrap a raw handle value.
    #[inline]
    pub fn new(raw: usize) -> Self {
        Self(raw)
    }

    /// The raw handle value.
    #[inline]
    pub fn raw(&self) -> usize {
        self.0
    }
}

/// Capabilities the archive needs from the object heap.
///
/// Implemented by the embedding runtime's heap subsystem; the archive holds
/// it as `&dyn ObjectHeap` for exactly the calls below.
pub trait ObjectHeap {
    /// Whether the heap's policy allows archiving `reference`.
    fn archiving_allowed(&self, reference: HeapRef) -> bool;

    /// Whether the archived heap region was successfully mapped at load
    /// time. When it was not, every archived reference reads back as null.
    fn heap_region_mapped(&self) -> bool;

    /// Encode a non-null reference as an archive word. Must never return
    /// zero; zero is the null encoding.
    fn encode_non_null(&self, reference: HeapRef) -> usize;

    /// Decode an archive word back into a reference. `base_bias` is the
    /// load-time displacement of the archived heap region; a decoded null
    /// yields `None`.
    fn decode_from_archive(&self, word: usize, base_bias: isize) -> Option<HeapRef>;
}
