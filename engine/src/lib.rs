//! TFS engine: fixed-capacity tables, the two-tier locking discipline, and
//! the `Tfs` type that ties them into the public API.
//!
//! Module layout mirrors the component breakdown: `bitmap` is the shared
//! allocation primitive; `inode_table`, `open_file_table`, and `dir` are the
//! three metadata tables; `block_pool` is the per-block-locked byte store;
//! `path` validates pathnames and bounds symlink recursion; `host` is the
//! `copy_from_host` byte-stream contract; `fs` wires all of the above behind
//! one global metadata mutex and exposes `Tfs`.

#![deny(missing_docs)]

mod bitmap;
mod block_pool;
mod dir;
mod fs;
mod host;
mod inode_table;
mod open_file_table;
mod path;

pub use fs::{FileHandle, OpenMode, Tfs};
pub use host::{HostFile, HostSource};
pub use path::MAX_SYMLINK_HOPS;

pub use tfs_types::error::{Result, TfsError};
pub use tfs_types::types::{FType, Inode, Params};
