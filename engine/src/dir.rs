//! Flat root-directory entry table, stored inside the root inode's data
//! block.
//!
//! Mirrors spec §4.3. Operates directly on the `Buffer` holding the root
//! directory's bytes; callers (`fs::Tfs`) are expected to already be
//! holding the metadata mutex, since spec §5 puts the directory-entry array
//! under that lock, not under a per-inode one.

use tfs_types::error::{Result, TfsError};
use tfs_types::types::{is_valid_name, DirEntry, DIRENTRY_SIZE};

/// Number of entry slots that fit in a block of `block_size` bytes.
pub fn capacity(block_size: u64) -> u64 {
    block_size / *DIRENTRY_SIZE
}

fn entry_at(block: &tfs_types::types::Buffer, slot: u64) -> DirEntry {
    block
        .deserialize_from(slot * *DIRENTRY_SIZE)
        .expect("dir: corrupt directory entry")
}

fn put_entry(block: &mut tfs_types::types::Buffer, slot: u64, entry: &DirEntry) {
    block
        .serialize_into(entry, slot * *DIRENTRY_SIZE)
        .expect("dir: directory entry does not fit in block");
}

/// Zero-initialize every slot in `block` as an empty directory entry.
pub fn init(block: &mut tfs_types::types::Buffer) {
    let cap = capacity(block.len());
    let empty = DirEntry::empty();
    for slot in 0..cap {
        put_entry(block, slot, &empty);
    }
}

/// Look up `name` in the directory, returning the inumber it points at.
pub fn find(block: &tfs_types::types::Buffer, name: &str) -> Option<u64> {
    let cap = capacity(block.len());
    for slot in 0..cap {
        let e = entry_at(block, slot);
        if !e.is_empty() && e.name_str() == name {
            return Some(e.inum);
        }
    }
    None
}

/// Add an entry for `name` pointing at `inum` into the first empty slot.
///
/// Errors with `AlreadyExists` if `name` is already present, `InvalidArg`
/// if `name` is malformed, or `NoSpace` if every slot is taken.
pub fn add(block: &mut tfs_types::types::Buffer, name: &str, inum: u64) -> Result<()> {
    if !is_valid_name(name) {
        return Err(TfsError::InvalidArg("invalid directory entry name"));
    }
    let cap = capacity(block.len());
    let mut free_slot = None;
    for slot in 0..cap {
        let e = entry_at(block, slot);
        if e.is_empty() {
            if free_slot.is_none() {
                free_slot = Some(slot);
            }
        } else if e.name_str() == name {
            return Err(TfsError::AlreadyExists("name already exists in directory"));
        }
    }
    match free_slot {
        Some(slot) => {
            let entry = DirEntry::new(inum, name).ok_or(TfsError::InvalidArg(
                "invalid directory entry name",
            ))?;
            put_entry(block, slot, &entry);
            Ok(())
        }
        None => Err(TfsError::NoSpace("root directory is full")),
    }
}

/// Clear the entry named `name`.
///
/// Errors with `NotFound` if no such entry exists.
pub fn clear(block: &mut tfs_types::types::Buffer, name: &str) -> Result<()> {
    let cap = capacity(block.len());
    for slot in 0..cap {
        let e = entry_at(block, slot);
        if !e.is_empty() && e.name_str() == name {
            put_entry(block, slot, &DirEntry::empty());
            return Ok(());
        }
    }
    Err(TfsError::NotFound("directory entry not found"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tfs_types::types::Buffer;

    fn fresh_block() -> Buffer {
        let mut b = Buffer::new_zero(256);
        init(&mut b);
        b
    }

    #[test]
    fn add_find_clear_round_trip() {
        let mut b = fresh_block();
        add(&mut b, "f0", 3).unwrap();
        add(&mut b, "f1", 4).unwrap();
        assert_eq!(find(&b, "f0"), Some(3));
        assert_eq!(find(&b, "f1"), Some(4));
        assert_eq!(find(&b, "nope"), None);

        clear(&mut b, "f0").unwrap();
        assert_eq!(find(&b, "f0"), None);
        assert!(clear(&mut b, "f0").is_err());
    }

    #[test]
    fn add_rejects_duplicate_names() {
        let mut b = fresh_block();
        add(&mut b, "f0", 3).unwrap();
        assert!(matches!(add(&mut b, "f0", 7), Err(TfsError::AlreadyExists(_))));
    }

    #[test]
    fn add_fails_with_no_space_when_full() {
        let mut b = Buffer::new_zero(*DIRENTRY_SIZE * 2);
        init(&mut b);
        add(&mut b, "a", 1).unwrap();
        add(&mut b, "b", 2).unwrap();
        assert!(matches!(add(&mut b, "c", 3), Err(TfsError::NoSpace(_))));
    }

    #[test]
    fn add_reuses_cleared_slots() {
        let mut b = Buffer::new_zero(*DIRENTRY_SIZE * 2);
        init(&mut b);
        add(&mut b, "a", 1).unwrap();
        add(&mut b, "b", 2).unwrap();
        clear(&mut b, "a").unwrap();
        add(&mut b, "c", 3).unwrap();
        assert_eq!(find(&b, "c"), Some(3));
        assert_eq!(find(&b, "b"), Some(2));
    }
}
