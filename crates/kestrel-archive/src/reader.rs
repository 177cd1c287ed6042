//! Load-side field visitor.
//!
//! Walks a mapped image with a strictly sequential word cursor, restoring
//! the fields the matching [`crate::ArchiveWriter`] traversal wrote. All
//! reads are bounds-checked and all destinations are write-once, so a
//! truncated image or a desynchronized traversal surfaces as an error at
//! the first bad word.

use crate::error::{ArchiveError, ArchiveResult};
use crate::heap::{HeapRef, ObjectHeap};
use crate::visit::FieldVisitor;
use crate::WORD_SIZE;

/// Restores visited fields from a mapped archive image.
pub struct ArchiveReader<'a> {
    image: &'a [u8],
    heap: &'a dyn ObjectHeap,
    position: usize,
    heap_bias: isize,
}

impl<'a> ArchiveReader<'a> {
    /// Read from `image`, decoding references through `heap`.
    ///
    /// The image must start at the first word the traversal wrote;
    /// pointer slots in it must already be relocated.
    pub fn new(image: &'a [u8], heap: &'a dyn ObjectHeap) -> Self {
        Self {
            image,
            heap,
            position: 0,
            heap_bias: 0,
        }
    }

    /// Set the displacement of the archived heap region, handed to the
    /// heap when decoding references.
    pub fn set_heap_bias(&mut self, bias: isize) {
        self.heap_bias = bias;
    }

    /// Word index of the next read, for diagnostics.
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    fn next_word(&mut self) -> ArchiveResult<usize> {
        let offset = self.position * WORD_SIZE;
        let end = offset + WORD_SIZE;
        if end > self.image.len() {
            return Err(ArchiveError::Truncated {
                position: self.position,
            });
        }
        let mut buf = [0u8; WORD_SIZE];
        buf.copy_from_slice(&self.image[offset..end]);
        self.position += 1;
        Ok(usize::from_ne_bytes(buf))
    }
}

impl FieldVisitor for ArchiveReader<'_> {
    fn reading(&self) -> bool {
        true
    }

    fn visit_u32(&mut self, value: &mut u32) -> ArchiveResult<()> {
        *value = self.next_word()? as u32;
        Ok(())
    }

    fn visit_bool(&mut self, value: &mut bool) -> ArchiveResult<()> {
        *value = self.next_word()? != 0;
        Ok(())
    }

    fn visit_ptr(&mut self, slot: &mut usize) -> ArchiveResult<()> {
        if *slot != 0 {
            return Err(ArchiveError::SlotOccupied {
                position: self.position,
            });
        }
        *slot = self.next_word()?;
        Ok(())
    }

    fn visit_tag(&mut self, tag: u32) -> ArchiveResult<()> {
        let position = self.position;
        let found = self.next_word()?;
        if found != tag as usize {
            return Err(ArchiveError::TagMismatch {
                position,
                expected: tag as usize,
                found,
            });
        }
        Ok(())
    }

    fn visit_region(&mut self, words: &mut [usize]) -> ArchiveResult<()> {
        self.visit_tag((words.len() * WORD_SIZE) as u32)?;
        for word in words.iter_mut() {
            *word = self.next_word()?;
        }
        Ok(())
    }

    fn visit_reference(&mut self, slot: &mut Option<HeapRef>) -> ArchiveResult<()> {
        if slot.is_some() {
            return Err(ArchiveError::SlotOccupied {
                position: self.position,
            });
        }
        let word = self.next_word()?;
        if word == 0 || !self.heap.heap_region_mapped() {
            *slot = None;
            return Ok(());
        }
        match self.heap.decode_from_archive(word, self.heap_bias) {
            None => *slot = None,
            Some(reference) => {
                if !self.heap.archiving_allowed(reference) {
                    return Err(ArchiveError::ArchivingDisallowed);
                }
                *slot = Some(reference);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: usize = 0x10_0000;

    struct FixedHeap {
        base: usize,
        mapped: bool,
        allow: bool,
    }

    impl FixedHeap {
        fn new() -> Self {
            Self {
                base: BASE,
                mapped: true,
                allow: true,
            }
        }
    }

    impl ObjectHeap for FixedHeap {
        fn archiving_allowed(&self, _reference: HeapRef) -> bool {
            self.allow
        }

        fn heap_region_mapped(&self) -> bool {
            self.mapped
        }

        fn encode_non_null(&self, reference: HeapRef) -> usize {
            self.base + reference.raw()
        }

        fn decode_from_archive(&self, word: usize, base_bias: isize) -> Option<HeapRef> {
            let raw = word.wrapping_sub(self.base).wrapping_add_signed(-base_bias);
            if raw == 0 {
                None
            } else {
                Some(HeapRef::new(raw))
            }
        }
    }

    fn image_of(words: &[usize]) -> Vec<u8> {
        let mut image = Vec::with_capacity(words.len() * WORD_SIZE);
        for w in words {
            image.extend_from_slice(&w.to_ne_bytes());
        }
        image
    }

    #[test]
    fn test_reads_scalars_in_order() {
        let heap = FixedHeap::new();
        let image = image_of(&[7, 1, 0x33]);
        let mut reader = ArchiveReader::new(&image, &heap);
        assert!(reader.reading());

        let mut v = 0u32;
        let mut b = false;
        reader.visit_u32(&mut v).unwrap();
        reader.visit_bool(&mut b).unwrap();
        reader.visit_tag(0x33).unwrap();

        assert_eq!(v, 7);
        assert!(b);
        assert_eq!(reader.position(), 3);
    }

    #[test]
    fn test_scalars_narrow_from_full_words() {
        let heap = FixedHeap::new();
        // Words are stored full-width: u32 keeps the low 32 bits, bool
        // treats any non-zero value as true.
        let image = image_of(&[0x1_0000_0007, 0x33, 0]);
        let mut reader = ArchiveReader::new(&image, &heap);

        let mut v = 0u32;
        reader.visit_u32(&mut v).unwrap();
        assert_eq!(v, 7);

        let mut b = false;
        reader.visit_bool(&mut b).unwrap();
        assert!(b);
        reader.visit_bool(&mut b).unwrap();
        assert!(!b);
    }

    #[test]
    fn test_tag_mismatch_reports_both_values() {
        let heap = FixedHeap::new();
        let image = image_of(&[0x33]);
        let mut reader = ArchiveReader::new(&image, &heap);

        let err = reader.visit_tag(0x44).unwrap_err();
        assert_eq!(
            err,
            ArchiveError::TagMismatch {
                position: 0,
                expected: 0x44,
                found: 0x33,
            }
        );
    }

    #[test]
    fn test_truncated_image() {
        let heap = FixedHeap::new();
        let image = image_of(&[1]);
        let mut reader = ArchiveReader::new(&image, &heap);

        let mut v = 0u32;
        reader.visit_u32(&mut v).unwrap();
        let err = reader.visit_u32(&mut v).unwrap_err();
        assert_eq!(err, ArchiveError::Truncated { position: 1 });
    }

    #[test]
    fn test_ptr_destination_is_write_once() {
        let heap = FixedHeap::new();
        let image = image_of(&[0x5000]);
        let mut reader = ArchiveReader::new(&image, &heap);

        let mut occupied = 0x9999;
        let err = reader.visit_ptr(&mut occupied).unwrap_err();
        assert_eq!(err, ArchiveError::SlotOccupied { position: 0 });
        assert_eq!(occupied, 0x9999);

        let mut slot = 0;
        reader.visit_ptr(&mut slot).unwrap();
        assert_eq!(slot, 0x5000);
    }

    #[test]
    fn test_reference_null_word() {
        let heap = FixedHeap::new();
        let image = image_of(&[0]);
        let mut reader = ArchiveReader::new(&image, &heap);

        let mut slot = None;
        reader.visit_reference(&mut slot).unwrap();
        assert_eq!(slot, None);
        assert_eq!(reader.position(), 1);
    }

    #[test]
    fn test_reference_with_unmapped_heap_reads_null() {
        let heap = FixedHeap {
            mapped: false,
            ..FixedHeap::new()
        };
        let image = image_of(&[BASE + 0x10]);
        let mut reader = ArchiveReader::new(&image, &heap);

        let mut slot = None;
        reader.visit_reference(&mut slot).unwrap();
        assert_eq!(slot, None);
        // The word is still consumed so the stream stays in sync.
        assert_eq!(reader.position(), 1);
    }

    #[test]
    fn test_reference_decodes_with_bias() {
        let heap = FixedHeap::new();
        // The stored word moved by 0x20 when the image was relocated; the
        // bias lets the heap undo it.
        let image = image_of(&[BASE + 0x10 + 0x20]);
        let mut reader = ArchiveReader::new(&image, &heap);
        reader.set_heap_bias(0x20);

        let mut slot = None;
        reader.visit_reference(&mut slot).unwrap();
        assert_eq!(slot, Some(HeapRef::new(0x10)));
    }

    #[test]
    fn test_reference_decoded_null() {
        let heap = FixedHeap::new();
        let image = image_of(&[BASE]);
        let mut reader = ArchiveReader::new(&image, &heap);

        let mut slot = None;
        reader.visit_reference(&mut slot).unwrap();
        assert_eq!(slot, None);
    }

    #[test]
    fn test_reference_destination_is_write_once() {
        let heap = FixedHeap::new();
        let image = image_of(&[BASE + 0x10]);
        let mut reader = ArchiveReader::new(&image, &heap);

        let mut slot = Some(HeapRef::new(1));
        let err = reader.visit_reference(&mut slot).unwrap_err();
        assert_eq!(err, ArchiveError::SlotOccupied { position: 0 });
    }

    #[test]
    fn test_reference_policy_applies_after_decode() {
        let heap = FixedHeap {
            allow: false,
            ..FixedHeap::new()
        };
        let image = image_of(&[BASE + 0x10]);
        let mut reader = ArchiveReader::new(&image, &heap);

        let mut slot = None;
        let err = reader.visit_reference(&mut slot).unwrap_err();
        assert_eq!(err, ArchiveError::ArchivingDisallowed);
    }

    #[test]
    fn test_region_verifies_length_tag() {
        let heap = FixedHeap::new();
        let image = image_of(&[2 * WORD_SIZE, 0xAA, 0xBB]);
        let mut reader = ArchiveReader::new(&image, &heap);

        let mut wrong = [0usize; 3];
        let err = reader.visit_region(&mut wrong).unwrap_err();
        assert_eq!(
            err,
            ArchiveError::TagMismatch {
                position: 0,
                expected: 3 * WORD_SIZE,
                found: 2 * WORD_SIZE,
            }
        );

        let mut reader = ArchiveReader::new(&image, &heap);
        let mut right = [0usize; 2];
        reader.visit_region(&mut right).unwrap();
        assert_eq!(right, [0xAA, 0xBB]);
    }
}
