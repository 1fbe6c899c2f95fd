/*!
 * MemCabinet Tests
 * Exercises the in-memory backend through the public traits only
 */

use std::collections::BTreeSet;
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::Arc;
use std::thread;

use cabinet_fs::{lookup_path, Cabinet, FsError, FsPath, Kind, MemCabinet, Mode, Name, OpenMode};
use pretty_assertions::assert_eq;

fn name(s: &str) -> Name {
    Name::new(s).unwrap()
}

#[test]
fn test_memfs_write_then_read_back() {
    let cabinet = MemCabinet::new();
    let mut root = cabinet.open_root().unwrap();
    let mut file = root
        .as_dir()
        .unwrap()
        .create(&name("notes.txt"), Kind::RegularFile, Mode::FILE_DEFAULT)
        .unwrap();
    file.as_file().unwrap().write_all(b"hello cabinet").unwrap();
    file.close().unwrap();

    let mut again = root
        .as_dir()
        .unwrap()
        .open(&name("notes.txt"), OpenMode::read_only())
        .unwrap();
    let mut text = String::new();
    again.as_file().unwrap().read_to_string(&mut text).unwrap();
    assert_eq!(text, "hello cabinet");

    let mut buf = [0u8; 7];
    let n = again.as_file().unwrap().read_at(&mut buf, 6).unwrap();
    assert_eq!(&buf[..n], b"cabinet");

    let meta = again.metadata().unwrap();
    assert_eq!(meta.kind, Kind::RegularFile);
    assert_eq!(meta.size, 13);
    assert_eq!(meta.perms, Mode::FILE_DEFAULT);
}

#[test]
fn test_memfs_nested_lookup() {
    let cabinet = MemCabinet::new();
    let mut root = cabinet.open_root().unwrap();
    let mut a = root
        .as_dir()
        .unwrap()
        .create(&name("a"), Kind::Directory, Mode::DIR_DEFAULT)
        .unwrap();
    let mut b = a
        .as_dir()
        .unwrap()
        .create(&name("b"), Kind::Directory, Mode::DIR_DEFAULT)
        .unwrap();
    b.as_dir()
        .unwrap()
        .create(&name("c"), Kind::RegularFile, Mode::FILE_DEFAULT)
        .unwrap();
    drop((a, b));

    let c = lookup_path(root.as_mut(), FsPath::parse("/a/b/c").unwrap().names()).unwrap();
    assert_eq!(c.kind(), Kind::RegularFile);
    assert!(matches!(
        lookup_path(root.as_mut(), FsPath::parse("a/b/c/d").unwrap().names()),
        Err(FsError::NotADirectory { .. })
    ));
    drop(c);
    drop(root);
    assert_eq!(cabinet.open_handles(), 0);
}

#[test]
fn test_memfs_iteration_lists_every_entry_once() {
    let cabinet = MemCabinet::new();
    let mut root = cabinet.open_root().unwrap();
    let dir = root.as_dir().unwrap();
    for entry in ["zeta", "alpha", "mid"] {
        dir.create(&name(entry), Kind::RegularFile, Mode::FILE_DEFAULT).unwrap();
    }
    dir.symlink(&name("link"), "alpha").unwrap();

    let mut seen = BTreeSet::new();
    let mut iter = dir.read().unwrap();
    while let Some(entry) = iter.next_entry() {
        let (entry_name, meta) = entry.unwrap();
        if meta.kind == Kind::Symlink {
            assert_eq!(meta.linkname, "alpha");
        }
        assert!(seen.insert(entry_name.to_string()));
    }
    assert!(iter.done());
    assert!(iter.next_entry().is_none());
    assert_eq!(
        seen.into_iter().collect::<Vec<_>>(),
        vec!["alpha", "link", "mid", "zeta"]
    );
}

#[test]
fn test_memfs_seek_and_overwrite() {
    let cabinet = MemCabinet::new();
    let mut root = cabinet.open_root().unwrap();
    let mut handle = root
        .as_dir()
        .unwrap()
        .create(&name("f"), Kind::RegularFile, Mode::FILE_DEFAULT)
        .unwrap();
    let file = handle.as_file().unwrap();
    file.write_all(b"0123456789").unwrap();
    file.seek(SeekFrom::Start(2)).unwrap();
    file.write_all(b"ab").unwrap();
    assert_eq!(file.seek(SeekFrom::End(-1)).unwrap(), 9);
    file.set_len(4).unwrap();
    file.seek(SeekFrom::Start(0)).unwrap();

    let mut out = Vec::new();
    file.read_to_end(&mut out).unwrap();
    assert_eq!(out, b"01ab");
    assert_eq!(cabinet.used_bytes(), 4);
}

#[test]
fn test_memfs_capacity_shared_across_threads() {
    let cabinet = Arc::new(MemCabinet::with_capacity(64));
    let mut workers = Vec::new();
    for i in 0..8 {
        let cabinet = Arc::clone(&cabinet);
        workers.push(thread::spawn(move || {
            let mut root = cabinet.open_root().unwrap();
            let mut handle = root
                .as_dir()
                .unwrap()
                .create(&name(&format!("f{}", i)), Kind::RegularFile, Mode::FILE_DEFAULT)
                .unwrap();
            handle.as_file().unwrap().write_all(&[0u8; 16]).is_ok()
        }));
    }
    let written = workers
        .into_iter()
        .map(|w| w.join().unwrap())
        .filter(|ok| *ok)
        .count();
    assert_eq!(written, 4);
    assert_eq!(cabinet.used_bytes(), 64);
    assert_eq!(cabinet.open_handles(), 0);
}
