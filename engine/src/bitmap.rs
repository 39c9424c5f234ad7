//! Fixed-capacity allocation bitmap, backed by an array of `u64` words.
//!
//! Used by both the inode table and the block pool to track which slots are
//! in use. Bit manipulation goes through the `bit_field` crate rather than
//! hand-rolled shifts, the same crate the teacher project's `Cargo.toml`
//! pulls in for this exact purpose.

use bit_field::BitField;

const WORD_BITS: usize = 64;

/// A fixed-size bitmap of `capacity` bits, all initially clear.
#[derive(Debug, Clone)]
pub struct Bitmap {
    words: Vec<u64>,
    capacity: usize,
}

impl Bitmap {
    /// Create a bitmap with room for `capacity` bits, all clear.
    pub fn new(capacity: usize) -> Bitmap {
        let nwords = capacity.div_ceil(WORD_BITS).max(1);
        Bitmap {
            words: vec![0u64; nwords],
            capacity,
        }
    }

    /// Number of bits this bitmap tracks.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Is bit `i` set?
    pub fn is_set(&self, i: usize) -> bool {
        assert!(i < self.capacity, "bitmap index out of bounds");
        self.words[i / WORD_BITS].get_bit(i % WORD_BITS)
    }

    /// Set bit `i`.
    pub fn set(&mut self, i: usize) {
        assert!(i < self.capacity, "bitmap index out of bounds");
        self.words[i / WORD_BITS].set_bit(i % WORD_BITS, true);
    }

    /// Clear bit `i`.
    pub fn clear(&mut self, i: usize) {
        assert!(i < self.capacity, "bitmap index out of bounds");
        self.words[i / WORD_BITS].set_bit(i % WORD_BITS, false);
    }

    /// Find and set the first clear bit, returning its index. `None` if
    /// every bit is already set.
    pub fn alloc_first_clear(&mut self) -> Option<usize> {
        for i in 0..self.capacity {
            if !self.is_set(i) {
                self.set(i);
                return Some(i);
            }
        }
        None
    }
}
