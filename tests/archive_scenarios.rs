//! End-to-end scenario tests for the byte-layout engine: build a small tree
//! of paths through the planner, write every entry's header and payload
//! through `SharedFile` exactly as a worker would, and check the resulting
//! archive against the S1-S4 scenarios.

use disttar::path_source::{ChainedSource, SinglePathSource};
use disttar::planner::Planner;
use disttar::sharedfile::{self, SharedFile};
use disttar::tar::Entry;
use disttar::worker::write_descriptor;
use disttar::metadata::NameCache;

fn write_all_entries(
    paths: &[&std::path::Path],
    archive_path: &std::path::Path,
    index_path: &std::path::Path,
) -> Vec<Entry> {
    let mut chain = ChainedSource::new();
    for p in paths {
        chain.push(Box::new(SinglePathSource::new(p.to_str().unwrap())));
    }

    let mut planner = Planner::new(chain, index_path.to_path_buf()).unwrap();
    let mut entries = Vec::new();
    while let Some(entry) = planner.next_entry().unwrap() {
        entries.push(entry);
    }
    let index_entry = planner.finish().unwrap();

    sharedfile::create_truncate(archive_path).unwrap();
    let mut shared = SharedFile::open_for_write(archive_path).unwrap();
    let mut names = NameCache::new();
    for entry in &entries {
        write_descriptor(&mut shared, entry, &mut names).unwrap();
    }
    write_descriptor(&mut shared, &index_entry, &mut names).unwrap();
    shared.write_trailer().unwrap();
    shared.finish().unwrap();

    entries.push(index_entry);
    entries
}

// S1: single regular file hello.txt, 5 bytes "hello".
#[test]
fn s1_single_regular_file() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("hello.txt");
    std::fs::write(&file, b"hello").unwrap();

    let archive = dir.path().join("out.tar");
    let index = dir.path().join("out.tar.idx");
    let entries = write_all_entries(&[&file], &archive, &index);

    assert_eq!(entries[0].footprint(), 1024);
    assert_eq!(entries[0].stat.size, 5);

    let bytes = std::fs::read(&archive).unwrap();
    // hello.txt header+payload (1024) + index entry's own header+payload + 1024 trailer.
    assert!(bytes.len() >= 1024 + 1024);
    assert_eq!(bytes[156], b'0');
    assert!(bytes.starts_with(b"hello.txt\0"));
    // the last 1024 bytes are the end-of-archive trailer.
    let trailer = &bytes[bytes.len() - 1024..];
    assert!(trailer.iter().all(|&b| b == 0));
}

// S2: one symlink link -> target.
#[test]
fn s2_symlink_entry() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("target");
    std::fs::write(&target, b"t").unwrap();
    let link = dir.path().join("link");
    std::os::unix::fs::symlink("target", &link).unwrap();

    let archive = dir.path().join("out.tar");
    let index = dir.path().join("out.tar.idx");
    let entries = write_all_entries(&[&link], &archive, &index);

    assert_eq!(entries[0].footprint(), 512);
    assert_eq!(entries[0].linkname, "target");

    let bytes = std::fs::read(&archive).unwrap();
    assert_eq!(bytes[156], b'2');
    assert_eq!(&bytes[124..136], b"00000000000\0");
    assert!(bytes[157..].starts_with(b"target\0"));
}

// S3: directory dir/ containing dir/a.
#[test]
fn s3_directory_and_child() {
    let dir = tempfile::tempdir().unwrap();
    let sub = dir.path().join("dir");
    std::fs::create_dir(&sub).unwrap();
    let child = sub.join("a");
    std::fs::write(&child, b"x").unwrap();

    let archive = dir.path().join("out.tar");
    let index = dir.path().join("out.tar.idx");
    let entries = write_all_entries(&[&sub, &child], &archive, &index);

    assert!(entries[0].filename.ends_with('/'));
    assert_eq!(entries[0].footprint(), 512);

    assert!(!entries[1].filename.ends_with('/'));
    assert_eq!(entries[1].footprint(), 1024);

    let bytes = std::fs::read(&archive).unwrap();
    assert_eq!(bytes[156], b'5');
    let second_header_start = entries[1].offset as usize;
    assert_eq!(bytes[second_header_start + 156], b'0');
}

// S4: a regular file whose path is exactly 101 bytes — triggers pax.
#[test]
fn s4_long_filename_triggers_pax() {
    let dir = tempfile::tempdir().unwrap();
    let long_name = "a".repeat(101);
    let file = dir.path().join(&long_name);
    std::fs::write(&file, b"x").unwrap();

    let archive = dir.path().join("out.tar");
    let index = dir.path().join("out.tar.idx");
    let entries = write_all_entries(&[&file], &archive, &index);

    assert!(entries[0].filename.len() > 100);
    // pax block (1024, since a ~120 byte record rounds up to 512) + ustar
    // header (512) + payload padded (512).
    assert!(entries[0].footprint() > 1024);

    let bytes = std::fs::read(&archive).unwrap();
    assert_eq!(bytes[156], b'x');
}

#[test]
fn offsets_are_disjoint_and_contiguous() {
    let dir = tempfile::tempdir().unwrap();
    let mut paths = Vec::new();
    for i in 0..5 {
        let p = dir.path().join(format!("f{i}.txt"));
        std::fs::write(&p, vec![b'a'; i * 37 + 1]).unwrap();
        paths.push(p);
    }
    let path_refs: Vec<&std::path::Path> = paths.iter().map(|p| p.as_path()).collect();

    let archive = dir.path().join("out.tar");
    let index = dir.path().join("out.tar.idx");
    let entries = write_all_entries(&path_refs, &archive, &index);

    for pair in entries.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        assert_eq!(prev.offset + prev.footprint(), next.offset);
    }
}

#[test]
fn index_side_file_is_appended_as_final_entry() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("only.txt");
    std::fs::write(&file, b"payload").unwrap();

    let archive = dir.path().join("out.tar");
    let index = dir.path().join("out.tar.idx");
    let entries = write_all_entries(&[&file], &archive, &index);

    let index_entry = entries.last().unwrap();
    assert!(index_entry.filename.ends_with(".idx"));

    let contents = std::fs::read_to_string(&index).unwrap();
    // one line per real entry plus the index's own self-describing line.
    assert_eq!(contents.lines().count(), 2);
}
