//! `Db` router integration tests: routing, fan-out, and end-to-end
//! compaction across multiple shards.

use std::time::Duration;

use shardkv::config::Config;
use shardkv::Db;
use tempfile::TempDir;

fn test_config(flush_threshold: usize) -> Config {
    Config::builder()
        .flush_threshold(flush_threshold)
        .batch_size(8)
        .flush_interval(Duration::from_millis(5))
        .queue_capacity(256)
        .build()
}

#[test]
fn set_get_delete_across_many_shards() {
    let dir = TempDir::new().unwrap();
    let db = Db::open(dir.path(), 6, test_config(1024)).unwrap();

    for i in 0..150 {
        db.set(format!("key{i}").as_bytes(), format!("value{i}").as_bytes()).unwrap();
    }
    for i in 0..150 {
        let expected = format!("value{i}");
        assert_eq!(db.get(format!("key{i}").as_bytes()).unwrap(), Some(expected.into_bytes()));
    }

    db.delete(b"key42").unwrap();
    assert_eq!(db.get(b"key42").unwrap(), None);
}

#[test]
fn shard_count_is_preserved_across_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let db = Db::open(dir.path(), 5, test_config(1024)).unwrap();
        assert_eq!(db.shard_count(), 5);
        db.close().unwrap();
    }
    let db = Db::open(dir.path(), 5, test_config(1024)).unwrap();
    assert_eq!(db.shard_count(), 5);
}

#[test]
fn compact_runs_across_every_shard() {
    let dir = TempDir::new().unwrap();
    let db = Db::open(dir.path(), 4, test_config(1024)).unwrap();

    for i in 0..100 {
        db.set(format!("k{i}").as_bytes(), b"v").unwrap();
    }
    db.compact().unwrap();

    for i in 0..100 {
        assert_eq!(db.get(format!("k{i}").as_bytes()).unwrap(), Some(b"v".to_vec()));
    }
}

#[test]
fn close_is_ordered_and_data_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let db = Db::open(dir.path(), 3, test_config(1024)).unwrap();
        for i in 0..30 {
            db.set(format!("k{i}").as_bytes(), b"v").unwrap();
        }
        db.close().unwrap();
    }

    let db = Db::open(dir.path(), 3, test_config(1024)).unwrap();
    for i in 0..30 {
        assert_eq!(db.get(format!("k{i}").as_bytes()).unwrap(), Some(b"v".to_vec()));
    }
}

#[test]
fn repeated_empty_compaction_is_a_no_op() {
    let dir = TempDir::new().unwrap();
    let db = Db::open(dir.path(), 4, test_config(1024)).unwrap();
    db.compact().unwrap();
    db.compact().unwrap();
    db.compact().unwrap();
}
