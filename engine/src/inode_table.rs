//! Fixed-capacity table of inode records.
//!
//! Mirrors spec §4.2. Unlike the block pool, this table carries no locks of
//! its own: it lives inside `fs::Metadata`, which is entirely guarded by
//! the engine's single global metadata mutex, so plain `&mut self` methods
//! suffice.

use crate::bitmap::Bitmap;
use tfs_types::types::{FType, Inode};

/// The fixed-capacity inode table.
pub struct InodeTable {
    bitmap: Bitmap,
    inodes: Vec<Inode>,
}

impl InodeTable {
    /// Create a table with room for `count` inodes, all free.
    pub fn new(count: u64) -> InodeTable {
        InodeTable {
            bitmap: Bitmap::new(count as usize),
            inodes: vec![Inode::new(FType::File); count as usize],
        }
    }

    /// Total number of inode slots.
    pub fn capacity(&self) -> u64 {
        self.bitmap.capacity() as u64
    }

    /// Allocate the first free inode slot as a fresh inode of kind `kind`.
    /// `None` if the table is full.
    pub fn create(&mut self, kind: FType) -> Option<u64> {
        let i = self.bitmap.alloc_first_clear()?;
        self.inodes[i] = Inode::new(kind);
        Some(i as u64)
    }

    /// Free inode `i`.
    ///
    /// Panics if `i` is the root inode (inumber `0`, never freed for the
    /// lifetime of the file system) or is not currently allocated.
    pub fn delete(&mut self, i: u64) {
        assert_ne!(i, tfs_types::types::ROOT_INUM, "attempted to free the root inode");
        assert!(
            self.bitmap.is_set(i as usize),
            "inode_table: delete() on unallocated inode {i}"
        );
        self.bitmap.clear(i as usize);
    }

    /// Is inode `i` currently allocated?
    pub fn is_allocated(&self, i: u64) -> bool {
        i < self.capacity() && self.bitmap.is_set(i as usize)
    }

    /// Read inode `i`.
    ///
    /// Panics if `i` is not currently allocated.
    pub fn get(&self, i: u64) -> Inode {
        assert!(
            self.is_allocated(i),
            "inode_table: get() on unallocated inode {i}"
        );
        self.inodes[i as usize]
    }

    /// Overwrite inode `i`.
    ///
    /// Panics if `i` is not currently allocated.
    pub fn put(&mut self, i: u64, inode: Inode) {
        assert!(
            self.is_allocated(i),
            "inode_table: put() on unallocated inode {i}"
        );
        self.inodes[i as usize] = inode;
    }
}
