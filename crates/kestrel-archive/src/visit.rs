//! Symmetric field traversal.
//!
//! Code that archives a data structure describes its fields once, as a
//! function over `&mut dyn FieldVisitor`. Driving that function with an
//! [`crate::ArchiveWriter`] serializes the fields; driving it with an
//! [`crate::ArchiveReader`] restores them in the same order. Keeping both
//! directions behind one interface is what guarantees the stream layouts
//! agree.

use crate::error::ArchiveResult;
use crate::heap::HeapRef;

/// Visitor over the archivable fields of a data structure.
///
/// Every visit consumes or produces whole words in the archive stream;
/// scalars narrower than a word are widened so the stream stays
/// word-indexed.
pub trait FieldVisitor {
    /// `true` while restoring from an image, `false` while dumping.
    ///
    /// Traversal code uses this for the rare asymmetric step, like
    /// rebuilding a cache only on the read side.
    fn reading(&self) -> bool;

    /// Visit a 32-bit scalar field.
    fn visit_u32(&mut self, value: &mut u32) -> ArchiveResult<()>;

    /// Visit a boolean field.
    fn visit_bool(&mut self, value: &mut bool) -> ArchiveResult<()>;

    /// Visit a field holding an archive address. The slot is relocated
    /// when the image maps at a different base.
    fn visit_ptr(&mut self, slot: &mut usize) -> ArchiveResult<()>;

    /// Visit a structural tag. Written as-is; verified on read, so a
    /// desynchronized traversal stops at the next tag instead of
    /// misreading everything after it.
    fn visit_tag(&mut self, tag: u32) -> ArchiveResult<()>;

    /// Visit a raw run of words. The byte length travels as a leading tag.
    fn visit_region(&mut self, words: &mut [usize]) -> ArchiveResult<()>;

    /// Visit an object reference field. Null is encoded as a zero word;
    /// non-null encodings come from the object heap.
    fn visit_reference(&mut self, slot: &mut Option<HeapRef>) -> ArchiveResult<()>;
}
