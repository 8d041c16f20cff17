//! SSTable boundary-behavior integration tests.
//!
//! Exercises the builder/reader/merge codec across directly-created files,
//! rather than through a `Db`/`Shard`, to pin down the on-disk format's
//! edge cases independent of the engine around it.

use std::path::PathBuf;

use shardkv::sstable::{merge, Lookup, SSTableBuilder, SSTableReader};
use tempfile::TempDir;

fn temp_path() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.sst");
    (dir, path)
}

#[test]
fn many_entries_round_trip_in_sorted_order() {
    let (_dir, path) = temp_path();
    let mut builder = SSTableBuilder::new(&path).unwrap();
    for i in 0..500 {
        let key = format!("key{:05}", i);
        let value = format!("value{}", i);
        builder.add(key.as_bytes(), value.as_bytes()).unwrap();
    }
    let meta = builder.finish().unwrap();
    assert_eq!(meta.entry_count(), 500);

    let reader = SSTableReader::open(&path).unwrap();
    for i in 0..500 {
        let key = format!("key{:05}", i);
        let expected = format!("value{}", i);
        assert_eq!(reader.lookup(key.as_bytes()).unwrap(), Lookup::Found(expected.into_bytes()));
    }
}

#[test]
fn key_length_one_byte_round_trips() {
    let (_dir, path) = temp_path();
    let mut builder = SSTableBuilder::new(&path).unwrap();
    builder.add(b"a", b"value").unwrap();
    builder.finish().unwrap();

    let reader = SSTableReader::open(&path).unwrap();
    assert_eq!(reader.lookup(b"a").unwrap(), Lookup::Found(b"value".to_vec()));
}

#[test]
fn very_large_key_and_value_round_trip() {
    let (_dir, path) = temp_path();
    let key = vec![b'k'; 2 * 1024 * 1024];
    let value = vec![0xAB; 4 * 1024 * 1024];

    let mut builder = SSTableBuilder::new(&path).unwrap();
    builder.add(&key, &value).unwrap();
    builder.finish().unwrap();

    let reader = SSTableReader::open(&path).unwrap();
    assert_eq!(reader.lookup(&key).unwrap(), Lookup::Found(value));
}

#[test]
fn zero_length_value_is_distinct_from_a_tombstone() {
    let (_dir, path) = temp_path();
    let mut builder = SSTableBuilder::new(&path).unwrap();
    builder.add(b"empty", b"").unwrap();
    builder.add_tombstone(b"deleted").unwrap();
    builder.finish().unwrap();

    let reader = SSTableReader::open(&path).unwrap();
    assert_eq!(reader.lookup(b"empty").unwrap(), Lookup::Found(vec![]));
    assert_eq!(reader.lookup(b"deleted").unwrap(), Lookup::Tombstone);
}

#[test]
fn value_containing_the_tombstone_sentinel_bytes_is_preserved() {
    // u32::MAX little-endian bytes embedded as a *value*, not as the vlen
    // field, must round-trip untouched — the sentinel only has meaning in
    // the length field, never inside user data.
    let (_dir, path) = temp_path();
    let sentinel_like = u32::MAX.to_le_bytes().to_vec();
    let mut builder = SSTableBuilder::new(&path).unwrap();
    builder.add(b"k", &sentinel_like).unwrap();
    builder.finish().unwrap();

    let reader = SSTableReader::open(&path).unwrap();
    assert_eq!(reader.lookup(b"k").unwrap(), Lookup::Found(sentinel_like));
}

#[test]
fn merge_of_three_tables_keeps_newest_and_drops_masked_tombstones() {
    let dir = TempDir::new().unwrap();

    let p1 = dir.path().join("1.sst");
    let mut b1 = SSTableBuilder::new(&p1).unwrap();
    b1.add(b"a", b"1").unwrap();
    b1.add(b"b", b"1").unwrap();
    b1.finish().unwrap();

    let p2 = dir.path().join("2.sst");
    let mut b2 = SSTableBuilder::new(&p2).unwrap();
    b2.add(b"b", b"2").unwrap();
    b2.add_tombstone(b"c").unwrap();
    b2.finish().unwrap();

    let p3 = dir.path().join("3.sst");
    let mut b3 = SSTableBuilder::new(&p3).unwrap();
    b3.add(b"a", b"3").unwrap();
    b3.finish().unwrap();

    let out = dir.path().join("merged.sst");
    let readers = vec![
        SSTableReader::open(&p1).unwrap(),
        SSTableReader::open(&p2).unwrap(),
        SSTableReader::open(&p3).unwrap(),
    ];
    merge(&out, &readers).unwrap();

    let merged = SSTableReader::open(&out).unwrap();
    assert_eq!(merged.lookup(b"a").unwrap(), Lookup::Found(b"3".to_vec()));
    assert_eq!(merged.lookup(b"b").unwrap(), Lookup::Found(b"2".to_vec()));
    assert_eq!(merged.lookup(b"c").unwrap(), Lookup::NotFound);
}

#[test]
fn duplicate_key_insertion_is_rejected() {
    let (_dir, path) = temp_path();
    let mut builder = SSTableBuilder::new(&path).unwrap();
    builder.add(b"k", b"1").unwrap();
    assert!(builder.add(b"k", b"2").is_err());
}
