//! The public TFS engine: table wiring, the concurrency layer, and the
//! `open`/`close`/`read`/`write`/`link`/`symlink`/`unlink`/`copy_from_host`
//! API surface (spec §4.6).

use std::io;
use std::sync::{Mutex, RwLock};

use tfs_types::error::{Result, TfsError};
use tfs_types::types::{FType, Inode, Params, ROOT_INUM};

use crate::bitmap::Bitmap;
use crate::block_pool::BlockStore;
use crate::dir;
use crate::host::{HostFile, HostSource};
use crate::inode_table::InodeTable;
use crate::open_file_table::OpenFileTable;
use crate::path::{self, MAX_SYMLINK_HOPS};

bitflags::bitflags! {
    /// `open` mode bit flags (spec §4.6 / §6). Combinable.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenMode: u32 {
        /// Create the file if it does not already exist.
        const CREATE = 1 << 0;
        /// Discard the file's existing contents on open.
        const TRUNCATE = 1 << 1;
        /// Start the handle's offset at the file's current size.
        const APPEND = 1 << 2;
    }
}

/// A handle returned by `open`, consumed by `read`/`write`/`close`.
///
/// Valid only between its `open` and its matching `close`; using it
/// afterwards yields `TfsError::InvalidHandle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHandle(u64);

/// Everything the global metadata mutex guards: both allocation bitmaps,
/// the root directory's entry table, every inode's `kind`/`size`/
/// `data_block`/`hard_links` fields, and the open-file table.
///
/// Deliberately does *not* include the byte contents of non-root data
/// blocks — those live in `Tfs::blocks`, guarded by one `RwLock` per block
/// slot instead, per spec §5.
struct Metadata {
    inode_table: InodeTable,
    block_bitmap: Bitmap,
    open_file_table: OpenFileTable,
    /// The root directory's entry table. Spec §5 puts this under the
    /// global mutex directly rather than under a per-inode lock, unlike
    /// every other inode's data block, so it is stored here rather than
    /// routed through `Tfs::blocks`.
    root_dir: tfs_types::types::Buffer,
}

impl Metadata {
    /// Fetch the inode a still-open handle refers to, without panicking
    /// if the handle has outlived its inode. `unlink` frees an inode as
    /// soon as its last hard link is gone, regardless of open handles
    /// (spec §9), so a handle opened earlier can legitimately point at a
    /// now-free slot; that surfaces here as `InvalidHandle` rather than
    /// tripping `InodeTable::get`'s allocated-slot assertion.
    fn live_inode(&self, inum: u64) -> Result<Inode> {
        if !self.inode_table.is_allocated(inum) {
            return Err(TfsError::InvalidHandle);
        }
        Ok(self.inode_table.get(inum))
    }
}

/// A single TFS instance: fixed-capacity inode table, block pool,
/// open-file table, and root directory, all reachable through one value.
///
/// Construct with `Tfs::init`; dropping it is `destroy` (spec §6) — Rust's
/// ownership model means there is no separate teardown step to get wrong.
pub struct Tfs {
    params: Params,
    state: Mutex<Metadata>,
    blocks: BlockStore,
    /// Spec §5's "per-inode readers/writer lock array", one slot per inode.
    ///
    /// Unlike `blocks`' per-block locks, this array is indexed by inumber
    /// and exists independently of whether the inode currently has a data
    /// block allocated at all. It closes the one race the block-indexed
    /// locks can't: a still-empty inode (`size == 0`, no block yet) has no
    /// block lock to take, so without this array two concurrent first
    /// writes to the same inode could each decide a fresh block is needed
    /// and each install their own, leaking whichever one loses. `write`
    /// takes the writer half for its whole body (decision through the
    /// size commit that follows it); truncating on `open` takes the same
    /// writer half around its block-free, so the two can never interleave.
    inode_locks: Vec<RwLock<()>>,
}

impl Tfs {
    /// Initialize a fresh TFS instance. `params` defaults per spec §3 if
    /// `None`.
    pub fn init(params: Option<Params>) -> Result<Tfs> {
        let params = params.unwrap_or_default();

        let mut inode_table = InodeTable::new(params.max_inode_count);
        let mut block_bitmap = Bitmap::new(params.max_block_count as usize);
        let open_file_table = OpenFileTable::new(params.max_open_files_count);
        let blocks = BlockStore::new(params.max_block_count, params.block_size);

        let root = inode_table
            .create(FType::Directory)
            .ok_or(TfsError::NoSpace("inode table too small to hold the root"))?;
        debug_assert_eq!(root, ROOT_INUM);

        let root_block = block_bitmap
            .alloc_first_clear()
            .ok_or(TfsError::NoSpace("block pool too small to hold the root"))? as u64;

        let mut root_dir = tfs_types::types::Buffer::new_zero(params.block_size);
        dir::init(&mut root_dir);

        inode_table.put(
            root,
            Inode {
                kind: FType::Directory,
                size: params.block_size,
                data_block: Some(root_block),
                hard_links: 0,
            },
        );

        let inode_locks = (0..params.max_inode_count).map(|_| RwLock::new(())).collect();

        Ok(Tfs {
            params,
            state: Mutex::new(Metadata {
                inode_table,
                block_bitmap,
                open_file_table,
                root_dir,
            }),
            blocks,
            inode_locks,
        })
    }

    /// Release this instance's state. A plain `drop`, since Rust has no
    /// separate teardown step to forget.
    pub fn destroy(self) {}

    /// The parameters this instance was initialized with.
    pub fn params(&self) -> Params {
        self.params
    }

    /// Open `name`, following symlinks per spec §4.5.
    pub fn open(&self, name: &str, mode: OpenMode) -> Result<FileHandle> {
        self.open_at_depth(name, mode, 0)
    }

    fn open_at_depth(&self, name: &str, mode: OpenMode, depth: u32) -> Result<FileHandle> {
        if depth >= MAX_SYMLINK_HOPS {
            return Err(TfsError::Loop);
        }
        let seg = path::segment(name)?;

        let mut guard = self.state.lock().unwrap();
        let inum = match dir::find(&guard.root_dir, seg) {
            Some(inum) => {
                let inode = guard.inode_table.get(inum);

                if inode.kind == FType::Symlink {
                    drop(guard);
                    let target = self.read_symlink_body(inum)?;
                    return self.open_at_depth(&target, mode, depth + 1);
                }

                if mode.contains(OpenMode::TRUNCATE) && inode.size > 0 {
                    drop(guard);
                    self.truncate_inode(inum);
                    guard = self.state.lock().unwrap();
                }

                inum
            }
            None => {
                if !mode.contains(OpenMode::CREATE) {
                    return Err(TfsError::NotFound("no such file"));
                }
                let new_inum = guard
                    .inode_table
                    .create(FType::File)
                    .ok_or(TfsError::NoSpace("inode table full"))?;
                if let Err(e) = dir::add(&mut guard.root_dir, seg, new_inum) {
                    guard.inode_table.delete(new_inum);
                    return Err(e);
                }
                new_inum
            }
        };

        let offset = if mode.contains(OpenMode::APPEND) {
            guard.inode_table.get(inum).size
        } else {
            0
        };

        // Documented wart (spec §4.6): if this allocation fails after a
        // successful create, the file remains created.
        let handle = guard
            .open_file_table
            .insert(inum, offset)
            .ok_or(TfsError::NoSpace("open file table full"))?;
        Ok(FileHandle(handle))
    }

    /// Read a symlink's body (its stored target pathname) with the body's
    /// own block lock, without holding the metadata mutex.
    fn read_symlink_body(&self, inum: u64) -> Result<String> {
        let (blk, size) = {
            let guard = self.state.lock().unwrap();
            let inode = guard.inode_table.get(inum);
            (inode.data_block, inode.size)
        };
        let blk = blk.expect("symlink with size > 0 has no data block");
        let mut buf = vec![0u8; size as usize];
        self.blocks.get(blk).read_data(&mut buf, 0)?;
        let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        let candidate = String::from_utf8_lossy(&buf[..end]).into_owned();
        if !path::is_valid_path(&candidate) {
            return Err(TfsError::InvalidArg("symlink body is not a valid pathname"));
        }
        Ok(candidate)
    }

    /// Discard `inum`'s current data block, freeing it back to the pool,
    /// and reset the inode to `size == 0` / no data block.
    ///
    /// Takes `inum`'s writer lock for the whole check-and-free so it can
    /// never interleave with a concurrent `write` on the same inode — see
    /// `inode_locks`. Re-checks `size > 0` once the lock is held, since
    /// another thread may have already truncated or emptied the inode
    /// between the caller's initial check and this call.
    fn truncate_inode(&self, inum: u64) {
        let _writer = self.inode_locks[inum as usize].write().unwrap();
        let mut guard = self.state.lock().unwrap();
        let mut inode = guard.inode_table.get(inum);
        if inode.size > 0 {
            if let Some(blk) = inode.data_block {
                guard.block_bitmap.clear(blk as usize);
            }
            inode.size = 0;
            inode.data_block = None;
            guard.inode_table.put(inum, inode);
        }
    }

    /// Close `handle`, freeing its open-file slot.
    pub fn close(&self, handle: FileHandle) -> Result<()> {
        let mut guard = self.state.lock().unwrap();
        if guard.open_file_table.get(handle.0).is_none() {
            return Err(TfsError::InvalidHandle);
        }
        guard.open_file_table.remove(handle.0);
        Ok(())
    }

    /// Read up to `buf.len()` bytes from `handle`'s current offset,
    /// advancing it. Returns the number of bytes actually read (`0` at
    /// end of file).
    pub fn read(&self, handle: FileHandle, buf: &mut [u8]) -> Result<u64> {
        let (offset, size, data_block) = {
            let guard = self.state.lock().unwrap();
            let entry = guard
                .open_file_table
                .get(handle.0)
                .ok_or(TfsError::InvalidHandle)?;
            let inode = guard.live_inode(entry.inumber)?;
            (entry.offset, inode.size, inode.data_block)
        };

        let to_read = size.saturating_sub(offset).min(buf.len() as u64);
        if to_read == 0 {
            return Ok(0);
        }
        let blk = data_block.expect("file with size > 0 has no data block");

        self.blocks
            .get(blk)
            .read_data(&mut buf[..to_read as usize], offset)?;

        let mut guard = self.state.lock().unwrap();
        if let Some(mut entry) = guard.open_file_table.get(handle.0) {
            entry.offset += to_read;
            guard.open_file_table.put(handle.0, entry);
        }
        Ok(to_read)
    }

    /// Write up to `buf.len()` bytes to `handle`'s current offset,
    /// allocating a data block on the first write, advancing the offset
    /// and extending the file's size as needed. Returns the number of
    /// bytes actually written, which may be fewer than `buf.len()` because
    /// files are capped at one block.
    pub fn write(&self, handle: FileHandle, buf: &[u8]) -> Result<u64> {
        let block_size = self.params.block_size;

        let (inum, offset) = {
            let guard = self.state.lock().unwrap();
            let entry = guard
                .open_file_table
                .get(handle.0)
                .ok_or(TfsError::InvalidHandle)?;
            (entry.inumber, entry.offset)
        };

        let to_write = (buf.len() as u64).min(block_size.saturating_sub(offset));
        if to_write == 0 {
            return Ok(0);
        }

        // Held for the rest of this call: the "does this inode still need
        // a fresh block" decision below and the size commit that follows
        // the byte copy must act as one critical section relative to any
        // other writer of the same inode (spec §5's per-inode writer
        // lock). Without it, two concurrent first writes to the same
        // still-empty inode could each decide a block is needed and each
        // install their own, leaking whichever one the last commit
        // overwrites.
        let _writer = self.inode_locks[inum as usize].write().unwrap();

        let (blk, freshly_allocated) = {
            let mut guard = self.state.lock().unwrap();
            let mut inode = guard.live_inode(inum)?;
            if inode.size == 0 {
                let idx = guard
                    .block_bitmap
                    .alloc_first_clear()
                    .ok_or(TfsError::NoSpace("block pool full"))? as u64;
                inode.data_block = Some(idx);
                guard.inode_table.put(inum, inode);
                (idx, true)
            } else {
                (
                    inode
                        .data_block
                        .expect("file with size > 0 has no data block"),
                    false,
                )
            }
        };

        if freshly_allocated {
            self.blocks.zero(blk);
        }
        self.blocks
            .get_mut(blk)
            .write_data(&buf[..to_write as usize], offset)?;

        let mut guard = self.state.lock().unwrap();
        let mut entry = guard
            .open_file_table
            .get(handle.0)
            .ok_or(TfsError::InvalidHandle)?;
        entry.offset += to_write;
        guard.open_file_table.put(handle.0, entry);

        let mut inode = guard.live_inode(inum)?;
        if entry.offset > inode.size {
            inode.size = entry.offset;
            guard.inode_table.put(inum, inode);
        }

        Ok(to_write)
    }

    /// Add a hard link named `link_name` to the inode `target_name` refers
    /// to. Fails if the target is absent, is a symlink, or `link_name`
    /// already exists.
    pub fn link(&self, target_name: &str, link_name: &str) -> Result<()> {
        let target_seg = path::segment(target_name)?;
        let link_seg = path::segment(link_name)?;

        let mut guard = self.state.lock().unwrap();
        let target_inum = dir::find(&guard.root_dir, target_seg)
            .ok_or(TfsError::NotFound("link target does not exist"))?;
        let mut target_inode = guard.inode_table.get(target_inum);
        if target_inode.kind == FType::Symlink {
            return Err(TfsError::Unsupported("cannot hard-link a symlink"));
        }

        dir::add(&mut guard.root_dir, link_seg, target_inum)?;
        target_inode.hard_links += 1;
        guard.inode_table.put(target_inum, target_inode);
        Ok(())
    }

    /// Create a symlink named `link_name` whose body is `target_name`,
    /// stored verbatim and unresolved until a later `open` traverses it.
    /// Fails if `target_name` does not currently exist.
    pub fn symlink(&self, target_name: &str, link_name: &str) -> Result<()> {
        let target_seg = path::segment(target_name)?;
        let link_seg = path::segment(link_name)?;

        if target_name.len() as u64 + 1 > self.params.block_size {
            return Err(TfsError::InvalidArg(
                "symlink target path does not fit in one block",
            ));
        }

        let mut guard = self.state.lock().unwrap();
        if dir::find(&guard.root_dir, target_seg).is_none() {
            return Err(TfsError::NotFound("symlink target does not exist"));
        }

        let inum = guard
            .inode_table
            .create(FType::Symlink)
            .ok_or(TfsError::NoSpace("inode table full"))?;
        if let Err(e) = dir::add(&mut guard.root_dir, link_seg, inum) {
            guard.inode_table.delete(inum);
            return Err(e);
        }

        let body_len = target_name.len() as u64 + 1;
        let idx = match guard.block_bitmap.alloc_first_clear() {
            Some(i) => i as u64,
            None => {
                let _ = dir::clear(&mut guard.root_dir, link_seg);
                guard.inode_table.delete(inum);
                return Err(TfsError::NoSpace("block pool full"));
            }
        };
        let mut inode = guard.inode_table.get(inum);
        inode.data_block = Some(idx);
        inode.size = body_len;
        guard.inode_table.put(inum, inode);
        drop(guard);

        self.blocks.zero(idx);
        let mut body = target_name.as_bytes().to_vec();
        body.push(0);
        self.blocks.get_mut(idx).write_data(&body, 0)?;

        Ok(())
    }

    /// Remove the directory entry `name`. A symlink's inode is always
    /// freed immediately; a regular file's inode is freed once its
    /// `hard_links` count reaches zero.
    pub fn unlink(&self, name: &str) -> Result<()> {
        let seg = path::segment(name)?;

        let mut guard = self.state.lock().unwrap();
        let inum = dir::find(&guard.root_dir, seg).ok_or(TfsError::NotFound("no such file"))?;
        let inode = guard.inode_table.get(inum);

        match inode.kind {
            FType::Symlink => {
                if let Some(blk) = inode.data_block {
                    guard.block_bitmap.clear(blk as usize);
                }
                guard.inode_table.delete(inum);
            }
            FType::File => {
                let mut inode = inode;
                inode.hard_links -= 1;
                if inode.hard_links == 0 {
                    if let Some(blk) = inode.data_block {
                        guard.block_bitmap.clear(blk as usize);
                    }
                    guard.inode_table.delete(inum);
                } else {
                    guard.inode_table.put(inum, inode);
                }
            }
            FType::Directory => {
                unreachable!("the root directory has no directory entry pointing at it")
            }
        }

        dir::clear(&mut guard.root_dir, seg)?;
        Ok(())
    }

    /// Open `dest_name` with `CREATE | TRUNCATE`, read up to one block's
    /// worth of bytes out of `source`, write them into the destination,
    /// close.
    pub fn copy_from_host<S: HostSource>(&self, mut source: S, dest_name: &str) -> Result<()> {
        let len = source.len()?;
        let cap = len.min(self.params.block_size);

        let mut buf = vec![0u8; cap as usize];
        let n = source.read_all(&mut buf)? as u64;
        if n < cap {
            return Err(TfsError::HostIo(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "short read from host source",
            )));
        }

        let handle = self.open(dest_name, OpenMode::CREATE | OpenMode::TRUNCATE)?;
        let write_result = self.write(handle, &buf[..n as usize]);
        self.close(handle)?;
        let written = write_result?;
        if written != n {
            return Err(TfsError::HostIo(io::Error::new(
                io::ErrorKind::WriteZero,
                "short write during host copy",
            )));
        }
        Ok(())
    }

    /// Convenience wrapper around `copy_from_host` that reads from a file
    /// on the host filesystem.
    pub fn copy_from_host_path<P: AsRef<std::path::Path>>(
        &self,
        source_path: P,
        dest_name: &str,
    ) -> Result<()> {
        let source = HostFile::open(source_path).map_err(TfsError::HostIo)?;
        self.copy_from_host(source, dest_name)
    }
}
