//! Shared value types and error type for TFS.
//!
//! Mirrors the split the engine crate depends on: this crate owns the types
//! that have no notion of a live table or a lock (`Buffer`, `Params`,
//! `Inode`, `DirEntry`) plus the crate-wide error type. The engine crate
//! (`tfs-engine`) owns the tables, the locking discipline and the public
//! `Tfs` API built on top of these.

#![deny(missing_docs)]

pub mod error;
pub mod types;

pub use error::{Result, TfsError};
