//! End-to-end scenarios exercising the public API together, including the
//! concurrent cases the two-tier locking discipline exists for.

use std::io::Cursor;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tfs_engine::{OpenMode, Params, Tfs, TfsError};

fn fresh() -> Tfs {
    Tfs::init(None).unwrap()
}

#[test]
fn chained_hard_links_share_one_inode() {
    let fs = fresh();
    let h = fs.open("/a", OpenMode::CREATE).unwrap();
    fs.write(h, b"hello").unwrap();
    fs.close(h).unwrap();

    fs.link("/a", "/b").unwrap();
    fs.link("/b", "/c").unwrap();

    for name in ["/a", "/b", "/c"] {
        let h = fs.open(name, OpenMode::empty()).unwrap();
        let mut buf = [0u8; 5];
        assert_eq!(fs.read(h, &mut buf).unwrap(), 5);
        assert_eq!(&buf, b"hello");
        fs.close(h).unwrap();
    }

    // Unlinking two of the three names must leave the data reachable
    // through the third.
    fs.unlink("/a").unwrap();
    fs.unlink("/b").unwrap();
    let h = fs.open("/c", OpenMode::empty()).unwrap();
    let mut buf = [0u8; 5];
    fs.read(h, &mut buf).unwrap();
    assert_eq!(&buf, b"hello");
    fs.close(h).unwrap();
}

#[test]
fn transitive_symlinks_resolve_through_the_chain() {
    let fs = fresh();
    let h = fs.open("/target", OpenMode::CREATE).unwrap();
    fs.write(h, b"payload").unwrap();
    fs.close(h).unwrap();

    fs.symlink("/target", "/link1").unwrap();
    fs.symlink("/link1", "/link2").unwrap();
    fs.symlink("/link2", "/link3").unwrap();

    let h = fs.open("/link3", OpenMode::empty()).unwrap();
    let mut buf = [0u8; 7];
    assert_eq!(fs.read(h, &mut buf).unwrap(), 7);
    assert_eq!(&buf, b"payload");
    fs.close(h).unwrap();
}

#[test]
fn a_self_referential_symlink_chain_fails_with_loop() {
    let fs = fresh();
    let h = fs.open("/real", OpenMode::CREATE).unwrap();
    fs.close(h).unwrap();

    // Build a chain deeper than MAX_SYMLINK_HOPS by daisy-chaining symlinks
    // that each point at the previous one, terminating at a real file.
    fs.symlink("/real", "/s0").unwrap();
    let mut prev = "/s0".to_string();
    for i in 1..=(tfs_engine::MAX_SYMLINK_HOPS + 2) {
        let name = format!("/s{i}");
        fs.symlink(&prev, &name).unwrap();
        prev = name;
    }

    let err = fs.open(&prev, OpenMode::empty()).unwrap_err();
    assert!(matches!(err, tfs_engine::TfsError::Loop));
}

#[test]
fn truncate_on_open_discards_previous_contents() {
    let fs = fresh();
    let h = fs.open("/f", OpenMode::CREATE).unwrap();
    fs.write(h, b"0123456789").unwrap();
    fs.close(h).unwrap();

    let h = fs.open("/f", OpenMode::CREATE | OpenMode::TRUNCATE).unwrap();
    let mut buf = [0u8; 1];
    assert_eq!(fs.read(h, &mut buf).unwrap(), 0);
    fs.write(h, b"x").unwrap();
    fs.close(h).unwrap();

    let h = fs.open("/f", OpenMode::empty()).unwrap();
    let mut buf = [0u8; 10];
    assert_eq!(fs.read(h, &mut buf).unwrap(), 1);
    assert_eq!(&buf[..1], b"x");
    fs.close(h).unwrap();
}

#[test]
fn double_unlink_fails_the_second_time() {
    let fs = fresh();
    let h = fs.open("/f", OpenMode::CREATE).unwrap();
    fs.close(h).unwrap();

    fs.unlink("/f").unwrap();
    let err = fs.unlink("/f").unwrap_err();
    assert!(matches!(err, tfs_engine::TfsError::NotFound(_)));
}

#[test]
fn concurrent_unlink_of_the_same_name_succeeds_exactly_once() {
    let fs = Arc::new(fresh());
    let h = fs.open("/shared", OpenMode::CREATE).unwrap();
    fs.close(h).unwrap();

    let threads: Vec<_> = (0..8)
        .map(|_| {
            let fs = Arc::clone(&fs);
            thread::spawn(move || fs.unlink("/shared").is_ok())
        })
        .collect();

    let successes = threads
        .into_iter()
        .map(|t| t.join().unwrap())
        .filter(|ok| *ok)
        .count();
    assert_eq!(successes, 1);
}

#[test]
fn concurrent_bulk_import_to_distinct_names_all_land() {
    let fs = Arc::new(fresh());

    let threads: Vec<_> = (0..8)
        .map(|i| {
            let fs = Arc::clone(&fs);
            thread::spawn(move || {
                let src = Cursor::new(format!("payload-{i}").into_bytes());
                fs.copy_from_host(src, &format!("/imported{i}")).unwrap();
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    for i in 0..8 {
        let h = fs.open(&format!("/imported{i}"), OpenMode::empty()).unwrap();
        let mut buf = vec![0u8; format!("payload-{i}").len()];
        fs.read(h, &mut buf).unwrap();
        assert_eq!(buf, format!("payload-{i}").into_bytes());
        fs.close(h).unwrap();
    }
}

#[test]
fn concurrent_bulk_import_to_the_same_destination_is_consistent() {
    let fs = Arc::new(fresh());

    let threads: Vec<_> = (0..8)
        .map(|i| {
            let fs = Arc::clone(&fs);
            thread::spawn(move || {
                let src = Cursor::new(vec![i as u8; 4]);
                fs.copy_from_host(src, "/contested")
            })
        })
        .collect();
    for t in threads {
        // Every racer's own open/write/close sequence must succeed; they
        // just overwrite each other's results, never corrupt them.
        t.join().unwrap().unwrap();
    }

    let h = fs.open("/contested", OpenMode::empty()).unwrap();
    let mut buf = [0u8; 4];
    assert_eq!(fs.read(h, &mut buf).unwrap(), 4);
    // Whichever racer wrote last, its four bytes must all agree with each
    // other -- no interleaving of two different racers' payloads.
    assert!(buf.iter().all(|&b| b == buf[0]));
    fs.close(h).unwrap();
}

#[test]
fn opening_a_nonexistent_name_without_create_fails_not_found() {
    let fs = fresh();
    let err = fs.open("/nope", OpenMode::empty()).unwrap_err();
    assert!(matches!(err, TfsError::NotFound(_)));
}

#[test]
fn hard_linking_a_symlink_is_rejected() {
    let fs = fresh();
    let h = fs.open("/real", OpenMode::CREATE).unwrap();
    fs.close(h).unwrap();
    fs.symlink("/real", "/lnk").unwrap();

    let err = fs.link("/lnk", "/lnk2").unwrap_err();
    assert!(matches!(err, TfsError::Unsupported(_)));
}

#[test]
fn unlinking_a_symlink_frees_its_inode_immediately() {
    let fs = fresh();
    let h = fs.open("/real", OpenMode::CREATE).unwrap();
    fs.close(h).unwrap();
    fs.symlink("/real", "/lnk").unwrap();

    fs.unlink("/lnk").unwrap();
    // The name is gone, and so is the target (unaffected by the symlink's
    // removal -- the symlink never held a hard link on it).
    assert!(matches!(
        fs.open("/lnk", OpenMode::empty()).unwrap_err(),
        TfsError::NotFound(_)
    ));
    let h = fs.open("/real", OpenMode::empty()).unwrap();
    fs.close(h).unwrap();
}

#[test]
fn exhausting_the_inode_table_fails_with_no_space() {
    // One inode for the root, one spare slot for a single file.
    let fs = Tfs::init(Some(Params {
        max_inode_count: 2,
        ..Params::default()
    }))
    .unwrap();
    let h = fs.open("/a", OpenMode::CREATE).unwrap();
    fs.close(h).unwrap();

    let err = fs.open("/b", OpenMode::CREATE).unwrap_err();
    assert!(matches!(err, TfsError::NoSpace(_)));
}

#[test]
fn exhausting_the_block_pool_fails_with_no_space() {
    // One block for the root directory, one spare block for a single write.
    let fs = Tfs::init(Some(Params {
        max_block_count: 2,
        ..Params::default()
    }))
    .unwrap();
    let h0 = fs.open("/a", OpenMode::CREATE).unwrap();
    fs.write(h0, b"x").unwrap();
    fs.close(h0).unwrap();

    let h1 = fs.open("/b", OpenMode::CREATE).unwrap();
    let err = fs.write(h1, b"y").unwrap_err();
    assert!(matches!(err, TfsError::NoSpace(_)));
    fs.close(h1).unwrap();
}

#[test]
fn exhausting_the_open_file_table_fails_with_no_space() {
    let fs = Tfs::init(Some(Params {
        max_open_files_count: 1,
        ..Params::default()
    }))
    .unwrap();
    let h = fs.open("/a", OpenMode::CREATE).unwrap();

    let err = fs.open("/a", OpenMode::empty()).unwrap_err();
    assert!(matches!(err, TfsError::NoSpace(_)));
    fs.close(h).unwrap();
}

#[test]
fn exhausting_the_root_directory_fails_with_no_space() {
    // A block barely big enough for one directory entry; plenty of spare
    // inodes so the directory itself is the bottleneck.
    let fs = Tfs::init(Some(Params {
        max_inode_count: 16,
        block_size: 128,
        ..Params::default()
    }))
    .unwrap();
    let mut created = 0;
    loop {
        let name = format!("/f{created}");
        match fs.open(&name, OpenMode::CREATE) {
            Ok(h) => {
                fs.close(h).unwrap();
                created += 1;
                if created > fs.params().max_inode_count as usize + 1 {
                    panic!("root directory never reported NoSpace");
                }
            }
            Err(TfsError::NoSpace(_)) => break,
            Err(e) => panic!("unexpected error: {e:?}"),
        }
    }
}

#[test]
fn a_handle_opened_before_unlink_gets_invalid_handle_after_the_target_is_freed() {
    let fs = Arc::new(fresh());
    let h = fs.open("/f1", OpenMode::CREATE).unwrap();

    let fs2 = Arc::clone(&fs);
    let unlinker = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        fs2.unlink("/f1").unwrap();
    });
    unlinker.join().unwrap();

    // The stale handle no longer refers to a live inode.
    let mut buf = [0u8; 1];
    assert!(matches!(fs.read(h, &mut buf), Err(TfsError::InvalidHandle)));

    // Re-creating under the same name must hand back a fresh inumber and a
    // handle distinct from the stale one.
    let h2 = fs.open("/f1", OpenMode::CREATE).unwrap();
    assert_ne!(h, h2);
    fs.close(h2).unwrap();
}

#[test]
fn concurrent_first_writes_to_the_same_inode_do_not_leak_a_block() {
    // One block for the root directory, two spare blocks: enough for
    // `/shared` to consume one and `/other` to consume the other, but not
    // enough for `/shared`'s two racing first-writes to each grab one.
    let fs = Tfs::init(Some(Params {
        max_block_count: 3,
        ..Params::default()
    }))
    .unwrap();
    let h0 = fs.open("/shared", OpenMode::CREATE).unwrap();
    let h1 = fs.open("/shared", OpenMode::empty()).unwrap();

    let fs = Arc::new(fs);
    let (fs_a, fs_b) = (Arc::clone(&fs), Arc::clone(&fs));
    let a = thread::spawn(move || fs_a.write(h0, b"aaaa").unwrap());
    let b = thread::spawn(move || fs_b.write(h1, b"bbbb").unwrap());
    a.join().unwrap();
    b.join().unwrap();
    fs.close(h0).unwrap();
    fs.close(h1).unwrap();

    // If the race had leaked the loser's block, this would fail with
    // NoSpace instead of succeeding.
    let h2 = fs.open("/other", OpenMode::CREATE).unwrap();
    fs.write(h2, b"x").unwrap();
    fs.close(h2).unwrap();
}

#[test]
fn concurrent_truncate_and_write_never_violate_the_size_implies_block_invariant() {
    let fs = Arc::new(fresh());
    let h0 = fs.open("/race", OpenMode::CREATE).unwrap();
    fs.close(h0).unwrap();

    let fs_w = Arc::clone(&fs);
    let writer = thread::spawn(move || {
        for _ in 0..200 {
            let h = fs_w.open("/race", OpenMode::CREATE).unwrap();
            let _ = fs_w.write(h, b"payload");
            fs_w.close(h).unwrap();
        }
    });
    let fs_t = Arc::clone(&fs);
    let truncator = thread::spawn(move || {
        for _ in 0..200 {
            if let Ok(h) = fs_t.open("/race", OpenMode::TRUNCATE) {
                fs_t.close(h).unwrap();
            }
        }
    });
    writer.join().unwrap();
    truncator.join().unwrap();

    // If `size`/`data_block` had ever fallen out of sync, this cycle would
    // either panic on the invariant-violation `expect`s in `read`/`write`
    // or return corrupted bytes.
    let h = fs.open("/race", OpenMode::CREATE).unwrap();
    fs.write(h, b"done").unwrap();
    fs.close(h).unwrap();

    let h = fs.open("/race", OpenMode::empty()).unwrap();
    let mut buf = [0u8; 4];
    assert_eq!(fs.read(h, &mut buf).unwrap(), 4);
    assert_eq!(&buf, b"done");
    fs.close(h).unwrap();
}

#[test]
fn copy_from_host_creates_and_overwrites() {
    let fs = fresh();
    fs.copy_from_host(Cursor::new(b"first".to_vec()), "/h").unwrap();
    fs.copy_from_host(Cursor::new(b"second".to_vec()), "/h").unwrap();

    let h = fs.open("/h", OpenMode::empty()).unwrap();
    let mut buf = [0u8; 6];
    assert_eq!(fs.read(h, &mut buf).unwrap(), 6);
    assert_eq!(&buf, b"second");
    fs.close(h).unwrap();
}
