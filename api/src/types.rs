//! Value types shared between the engine's tables and its public API.
//!
//! None of the types here know about locking or about the tables that own
//! them; they are plain data plus the handful of byte-level operations that
//! make the directory-entry (de)serialization in `tfs_engine::dir` possible.

use super::error::{self, TfsError};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::io::prelude::*;
use std::io::{Cursor, SeekFrom};

/// A fixed-size byte region, used both for the contents of a data block and
/// as a scratch buffer for `read`/`write` callers.
///
/// Backed by a boxed slice, since buffers never need to grow or shrink once
/// created: a block's size is fixed for the lifetime of the file system.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Buffer {
    contents: Box<[u8]>,
}

impl Buffer {
    /// Create a new buffer with the given contents.
    pub fn new(data: Box<[u8]>) -> Buffer {
        Buffer { contents: data }
    }

    /// Create an all-zero buffer of the given length.
    pub fn new_zero(len: u64) -> Buffer {
        Buffer {
            contents: vec![0; len as usize].into_boxed_slice(),
        }
    }

    /// Length of the buffer, in bytes.
    pub fn len(&self) -> u64 {
        self.contents.len() as u64
    }

    /// Is this buffer empty?
    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    /// Borrow the buffer's contents.
    pub fn contents_as_ref(&self) -> &[u8] {
        &self.contents
    }

    /// Read `data.len()` bytes out of this buffer starting at `offset`.
    ///
    /// Errors rather than partially filling `data` if the read would run
    /// past the end of the buffer.
    pub fn read_data(&self, data: &mut [u8], offset: u64) -> error::Result<()> {
        if offset + data.len() as u64 > self.len() {
            return Err(TfsError::InvalidArg(
                "trying to read beyond the bounds of the block",
            ));
        }
        let mut c = Cursor::new(&self.contents[..]);
        c.seek(SeekFrom::Start(offset))?;
        c.read_exact(data).map_err(TfsError::from)
    }

    /// Write `data` into this buffer starting at `offset`.
    ///
    /// Errors rather than partially writing if the write would run past the
    /// end of the buffer.
    pub fn write_data(&mut self, data: &[u8], offset: u64) -> error::Result<()> {
        if offset + data.len() as u64 > self.len() {
            return Err(TfsError::InvalidArg(
                "trying to write beyond the bounds of the block",
            ));
        }
        let mut c = Cursor::new(&mut self.contents[..]);
        c.seek(SeekFrom::Start(offset))?;
        c.write_all(data).map_err(TfsError::from)
    }

    /// Deserialize a value of type `S` starting at byte `offset`.
    pub fn deserialize_from<S>(&self, offset: u64) -> error::Result<S>
    where
        S: DeserializeOwned,
    {
        let mut c = Cursor::new(&self.contents[..]);
        c.seek(SeekFrom::Start(offset))?;
        Ok(bincode::deserialize_from(c)?)
    }

    /// Serialize `value` and write it starting at byte `offset`.
    ///
    /// Goes through `write_data` so that out-of-bounds writes get the usual
    /// bounds-checked error instead of growing the underlying allocation.
    pub fn serialize_into<S>(&mut self, value: &S, offset: u64) -> error::Result<()>
    where
        S: Serialize,
    {
        let bytes = bincode::serialize(value)?;
        self.write_data(&bytes, offset)
    }
}

/// Tunables fixed at `Tfs::init` time. All other limits are derived from
/// these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Params {
    /// Number of inode slots in the inode table, including the root.
    pub max_inode_count: u64,
    /// Number of block slots in the block pool.
    pub max_block_count: u64,
    /// Number of slots in the open-file table.
    pub max_open_files_count: u64,
    /// Size of a single data block, in bytes.
    pub block_size: u64,
}

impl Default for Params {
    /// The defaults from spec §3: 64 inodes, 1024 blocks, 16 open files,
    /// 1024-byte blocks.
    fn default() -> Params {
        Params {
            max_inode_count: 64,
            max_block_count: 1024,
            max_open_files_count: 16,
            block_size: 1024,
        }
    }
}

/// Inode number of the root directory. Allocated once at init and never
/// freed.
pub const ROOT_INUM: u64 = 0;

/// File type of an inode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FType {
    /// A directory. Only the root directory exists in this flat namespace.
    Directory,
    /// A regular file.
    File,
    /// A symbolic link: a file whose body is a null-terminated pathname.
    Symlink,
}

/// In-memory inode record, owned by the inode table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inode {
    /// The file type of this inode.
    pub kind: FType,
    /// Size of the file in bytes. Capped at `Params::block_size`.
    pub size: u64,
    /// The data block charged to this inode, if any. `None` whenever
    /// `size == 0` (no block is charged to an empty file).
    pub data_block: Option<u64>,
    /// Number of hard links pointing at this inode. Meaningful only for
    /// `FType::File`; ignored for directories and symlinks.
    pub hard_links: u32,
}

impl Inode {
    /// A freshly-allocated inode of the given kind, with no data block and
    /// the link count `Tfs::create` expects (`1` for files and symlinks,
    /// `0`/ignored for directories).
    pub fn new(kind: FType) -> Inode {
        let hard_links = match kind {
            FType::File | FType::Symlink => 1,
            FType::Directory => 0,
        };
        Inode {
            kind,
            size: 0,
            data_block: None,
            hard_links,
        }
    }
}

/// Maximum length, in bytes, of a single path segment / directory-entry
/// name (not counting the null terminator).
pub const MAX_NAME_LEN: usize = 28;

/// Sentinel `inum` marking an empty directory-entry slot. Distinct from any
/// real inumber, since inumber `0` is the (valid, allocated) root directory
/// in this spec.
pub const EMPTY_ENTRY: u64 = u64::MAX;

/// A single entry in the root directory's flat entry table.
///
/// Fixed-width so that the directory's data block can be addressed as a
/// dense array of entries: `serialize_into`/`deserialize_from` always
/// produce/consume exactly `DIRENTRY_SIZE` bytes, since `name` is a fixed
/// array and `inum` is a plain `u64`, not `Option<u64>` (which bincode would
/// encode at varying width).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    /// Inumber this entry points at, or `EMPTY_ENTRY` for an empty slot.
    pub inum: u64,
    /// Null-padded name bytes.
    pub name: [u8; MAX_NAME_LEN],
}

impl DirEntry {
    /// An empty directory-entry slot.
    pub fn empty() -> DirEntry {
        DirEntry {
            inum: EMPTY_ENTRY,
            name: [0; MAX_NAME_LEN],
        }
    }

    /// Build an entry for `name` pointing at `inum`.
    ///
    /// Returns `None` if `name` does not fit in `MAX_NAME_LEN` bytes, is
    /// empty, or contains a `/`.
    pub fn new(inum: u64, name: &str) -> Option<DirEntry> {
        if !is_valid_name(name) {
            return None;
        }
        let mut bytes = [0u8; MAX_NAME_LEN];
        bytes[..name.len()].copy_from_slice(name.as_bytes());
        Some(DirEntry { inum, name: bytes })
    }

    /// Is this slot empty?
    pub fn is_empty(&self) -> bool {
        self.inum == EMPTY_ENTRY
    }

    /// The entry's name as a `String`, stopping at the first null byte.
    pub fn name_str(&self) -> String {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(self.name.len());
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }
}

/// Is `name` a valid directory-entry / path-segment name: non-empty, no
/// embedded `/`, and short enough to fit a `DirEntry`?
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('/') && name.len() <= MAX_NAME_LEN
}

lazy_static::lazy_static! {
    /// Size of a serialized `DirEntry`, in bytes. Computed once at first
    /// use since it depends on `bincode`'s encoding, not just `size_of`.
    pub static ref DIRENTRY_SIZE: u64 =
        bincode::serialize(&DirEntry::empty()).unwrap().len() as u64;
}
