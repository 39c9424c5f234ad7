//! Byte storage for the fixed-capacity block pool.
//!
//! Mirrors spec §4.1's `get` (`alloc`/`free` live on the allocation bitmap
//! in `fs::Metadata`, since spec §5 puts both bitmaps under the global
//! metadata mutex). This module only owns the bytes: one `RwLock<Buffer>`
//! per block slot, so that I/O on one block never contends with I/O on
//! another.
//!
//! A block is, at any moment, owned by at most one inode (files are capped
//! at one block, and hard links share an *inode*, never a *block*, so two
//! inodes never alias the same block index), so this per-block lock
//! protects an inode's byte content exactly where spec §5's "per-inode
//! readers/writer lock array" protects data-block bytes. But it only
//! exists once a block has actually been allocated: a still-empty file has
//! no block index to lock. The metadata-level decisions that happen before
//! that — whether a first write needs to allocate a fresh block, whether a
//! truncate needs to free the current one — are serialized by a second,
//! genuinely inumber-indexed lock array (`fs::Tfs::inode_locks`), not by
//! anything here.
//!
//! The root directory's entries are the one exception: spec §5 puts those
//! under the global metadata mutex directly, so they are *not* routed
//! through this pool — see `fs::Metadata::root_dir`.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tfs_types::types::Buffer;

/// Byte storage for every block slot in the pool.
pub struct BlockStore {
    block_size: u64,
    blocks: Vec<RwLock<Buffer>>,
}

impl BlockStore {
    /// Create storage for `count` blocks of `block_size` bytes, all zeroed.
    pub fn new(count: u64, block_size: u64) -> BlockStore {
        let blocks = (0..count)
            .map(|_| RwLock::new(Buffer::new_zero(block_size)))
            .collect();
        BlockStore { block_size, blocks }
    }

    /// Size of each block, in bytes.
    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    /// Reset block `i` to all zeros. Called right after a fresh allocation.
    pub fn zero(&self, i: u64) {
        *self.blocks[i as usize].write().unwrap() = Buffer::new_zero(self.block_size);
    }

    /// Take a reader lock on block `i`'s contents.
    pub fn get(&self, i: u64) -> RwLockReadGuard<'_, Buffer> {
        self.blocks[i as usize].read().unwrap()
    }

    /// Take a writer lock on block `i`'s contents.
    pub fn get_mut(&self, i: u64) -> RwLockWriteGuard<'_, Buffer> {
        self.blocks[i as usize].write().unwrap()
    }
}
