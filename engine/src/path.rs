//! Pathname validation and symlink-resolution bookkeeping.
//!
//! Mirrors spec §4.5. This flat namespace has no hierarchical directories,
//! so "resolution" only ever means: validate the pathname, strip the
//! leading `/`, and look the remaining single segment up in the root
//! directory. The recursive symlink chase itself lives in `fs::Tfs::open`,
//! since it has to re-enter the engine's public API (spec §9's "recursive
//! locking" note: no lock may be held across that recursive call).

use tfs_types::error::{Result, TfsError};
use tfs_types::types::MAX_NAME_LEN;

/// Maximum number of symlink hops `open` will chase before failing with
/// `TfsError::Loop`. Matches the classic POSIX `MAXSYMLINKS` convention
/// (spec §9 calls for either a depth cap or cycle detection; we take the
/// depth cap, as does the C source this spec was distilled from).
pub const MAX_SYMLINK_HOPS: u32 = 40;

/// Is `path` a valid absolute single-segment pathname: starts with `/`, has
/// at least one character after the slash, and that remainder contains no
/// further `/`?
pub fn is_valid_path(path: &str) -> bool {
    path.starts_with('/') && path.len() >= 2 && !path[1..].contains('/')
}

/// Validate `path` and return the single name segment after the leading
/// `/`.
pub fn segment(path: &str) -> Result<&str> {
    if !is_valid_path(path) {
        return Err(TfsError::InvalidArg("pathname must be \"/<name>\""));
    }
    let name = &path[1..];
    if name.len() > MAX_NAME_LEN {
        return Err(TfsError::InvalidArg("pathname segment too long"));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_shape() {
        assert!(is_valid_path("/f0"));
        assert!(!is_valid_path(""));
        assert!(!is_valid_path("/"));
        assert!(!is_valid_path("f0"));
        assert!(!is_valid_path("/a/b"));
    }

    #[test]
    fn segment_strips_leading_slash() {
        assert_eq!(segment("/f0").unwrap(), "f0");
        assert!(segment("/").is_err());
        assert!(segment("nope").is_err());
    }

    #[test]
    fn segment_rejects_overlong_names() {
        let long = "/".to_string() + &"x".repeat(MAX_NAME_LEN + 1);
        assert!(segment(&long).is_err());
    }
}
