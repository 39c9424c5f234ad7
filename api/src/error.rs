//! Crate-wide error type.
//!
//! One variant per recoverable failure kind a caller of the public API can
//! observe. Internal invariant violations (a supposedly-allocated inode
//! missing, a data block vanishing mid-I/O) are *not* represented here: they
//! are bugs in the engine, not recoverable states, and are reported with a
//! process-terminating `panic!` instead (see `tfs_engine::fs`).

use thiserror::Error;

/// Errors surfaced by the public TFS API.
#[derive(Error, Debug)]
pub enum TfsError {
    /// Malformed pathname, invalid mode combination, or other caller input
    /// that is nonsensical on its face.
    #[error("invalid argument: {0}")]
    InvalidArg(&'static str),

    /// A name was looked up and not found where the operation required it
    /// to exist.
    #[error("not found: {0}")]
    NotFound(&'static str),

    /// A directory-entry insertion found the name already taken.
    #[error("already exists: {0}")]
    AlreadyExists(&'static str),

    /// The inode table, block pool, open-file table, or root directory is
    /// full.
    #[error("no space: {0}")]
    NoSpace(&'static str),

    /// A file handle is unknown, or was already closed.
    #[error("invalid file handle")]
    InvalidHandle,

    /// An operation was attempted against a kind of inode it does not
    /// support (e.g. hard-linking a symlink).
    #[error("unsupported: {0}")]
    Unsupported(&'static str),

    /// `copy_from_host` failed to read the requested byte count from the
    /// host byte-stream.
    #[error("host I/O error")]
    HostIo(#[from] std::io::Error),

    /// Symlink resolution exceeded the recursion-depth cap.
    #[error("symlink resolution loop")]
    Loop,

    /// (De)serializing a directory entry into/out of the root directory's
    /// data block failed.
    #[error("directory entry (de)serialization failure")]
    Serialize(#[from] bincode::Error),
}

/// Shorthand for `std::result::Result<T, TfsError>`, matching the rest of
/// the TFS codebase's error-handling convention.
pub type Result<T> = std::result::Result<T, TfsError>;
