//! Growable bit array backing the pointer map.
//!
//! Bits are packed into platform words. Bits past `len()` inside the last
//! storage word are always zero, so shrinking and regrowing never
//! resurrects stale bits.

const BITS_PER_WORD: usize = usize::BITS as usize;

/// A resizable array of bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    words: Vec<usize>,
    bits: usize,
}

impl Bitmap {
    /// Create a bitmap with `bits` bits, all zero.
    pub fn new(bits: usize) -> Self {
        Self {
            words: vec![0; bits.div_ceil(BITS_PER_WORD)],
            bits,
        }
    }

    /// Reconstruct a bitmap from its raw storage words.
    ///
    /// Bits past `bits` in the last word are cleared.
    ///
    /// # Panics
    ///
    /// Panics if `words` cannot hold `bits` bits.
    pub fn from_words(words: Vec<usize>, bits: usize) -> Self {
        assert!(
            bits <= words.len() * BITS_PER_WORD,
            "bitmap storage too small for {} bits",
            bits
        );
        let mut map = Self { words, bits };
        map.words.truncate(bits.div_ceil(BITS_PER_WORD));
        map.mask_tail();
        map
    }

    /// Number of bits.
    #[inline]
    pub fn len(&self) -> usize {
        self.bits
    }

    /// Whether the bitmap has zero bits.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Raw storage words, for persistence.
    #[inline]
    pub fn as_words(&self) -> &[usize] {
        &self.words
    }

    /// Resize to `bits` bits. Growth zero-extends; shrinking truncates and
    /// clears the bits past the new length.
    pub fn resize(&mut self, bits: usize) {
        self.words.resize(bits.div_ceil(BITS_PER_WORD), 0);
        self.bits = bits;
        self.mask_tail();
    }

    /// Set the bit at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[inline]
    pub fn set(&mut self, index: usize) {
        assert!(index < self.bits, "bit index {} out of bounds", index);
        self.words[index / BITS_PER_WORD] |= 1usize << (index % BITS_PER_WORD);
    }

    /// Clear the bit at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[inline]
    pub fn clear(&mut self, index: usize) {
        assert!(index < self.bits, "bit index {} out of bounds", index);
        self.words[index / BITS_PER_WORD] &= !(1usize << (index % BITS_PER_WORD));
    }

    /// Read the bit at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[inline]
    pub fn get(&self, index: usize) -> bool {
        assert!(index < self.bits, "bit index {} out of bounds", index);
        self.words[index / BITS_PER_WORD] & (1usize << (index % BITS_PER_WORD)) != 0
    }

    /// Number of set bits.
    pub fn count_set(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Iterate the indices of set bits in ascending order.
    pub fn iter_set(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.bits).filter(move |&i| self.get(i))
    }

    /// Zero the bits past `self.bits` in the last storage word.
    fn mask_tail(&mut self) {
        let rem = self.bits % BITS_PER_WORD;
        if rem != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1usize << rem) - 1;
            }
        }
    }
}
