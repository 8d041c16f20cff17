//! Shard-level integration tests.
//!
//! Drives `Shard` directly (bypassing the router) to pin down flush,
//! compaction, recovery, and concurrency behavior at the single-shard level.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use shardkv::config::Config;
use shardkv::shard::Shard;
use tempfile::TempDir;

fn open_shard(threshold: usize) -> (TempDir, Shard) {
    let dir = TempDir::new().unwrap();
    let config = Config::builder()
        .flush_threshold(threshold)
        .batch_size(16)
        .flush_interval(Duration::from_millis(5))
        .queue_capacity(256)
        .build();
    let shard = Shard::open(dir.path().join("shard-0"), config).unwrap();
    (dir, shard)
}

#[test]
fn put_get_delete_round_trip() {
    let (_dir, shard) = open_shard(1024);

    shard.set(b"key1", b"value1").unwrap();
    shard.set(b"key2", b"value2").unwrap();
    shard.set(b"key3", b"value3").unwrap();

    assert_eq!(shard.get(b"key1").unwrap(), Some(b"value1".to_vec()));
    assert_eq!(shard.get(b"key2").unwrap(), Some(b"value2".to_vec()));
    assert_eq!(shard.get(b"key3").unwrap(), Some(b"value3".to_vec()));

    shard.delete(b"key2").unwrap();
    assert_eq!(shard.get(b"key2").unwrap(), None);
}

#[test]
fn put_overwrite_keeps_latest_value() {
    let (_dir, shard) = open_shard(1024);

    shard.set(b"key", b"value1").unwrap();
    shard.set(b"key", b"value2").unwrap();
    assert_eq!(shard.get(b"key").unwrap(), Some(b"value2".to_vec()));
}

#[test]
fn manual_flush_moves_data_to_sstable_and_stays_readable() {
    let (_dir, shard) = open_shard(1024);

    shard.set(b"key", b"value").unwrap();
    assert_eq!(shard.sstable_count(), 0);

    shard.flush().unwrap();
    assert_eq!(shard.sstable_count(), 1);
    assert_eq!(shard.get(b"key").unwrap(), Some(b"value".to_vec()));
}

#[test]
fn flush_of_an_empty_memtable_is_a_no_op() {
    let (_dir, shard) = open_shard(1024);
    shard.flush().unwrap();
    assert_eq!(shard.sstable_count(), 0);
}

#[test]
fn auto_flush_triggers_once_the_threshold_is_reached() {
    let (_dir, shard) = open_shard(10);

    for i in 0..25 {
        let key = format!("key{:02}", i);
        let value = format!("value_for_{:02}", i);
        shard.set(key.as_bytes(), value.as_bytes()).unwrap();
    }

    assert!(shard.sstable_count() >= 1);
    for i in 0..25 {
        let key = format!("key{:02}", i);
        let value = format!("value_for_{:02}", i);
        assert_eq!(shard.get(key.as_bytes()).unwrap(), Some(value.into_bytes()));
    }
}

#[test]
fn recovery_replays_unflushed_writes_after_an_unclean_shutdown() {
    let dir = TempDir::new().unwrap();
    let shard_dir = dir.path().join("shard-0");
    let config = Config::builder().flush_threshold(1024 * 1024).build();

    {
        let shard = Shard::open(shard_dir.clone(), config.clone()).unwrap();
        shard.set(b"key1", b"value1").unwrap();
        shard.set(b"key2", b"value2").unwrap();
        shard.delete(b"key1").unwrap();
        shard.set(b"key3", b"value3").unwrap();
        // Dropped without calling close(): simulates a crash. The WAL
        // already has every record durably fsynced by the batcher.
    }

    let shard = Shard::open(shard_dir, config).unwrap();
    assert_eq!(shard.get(b"key1").unwrap(), None);
    assert_eq!(shard.get(b"key2").unwrap(), Some(b"value2".to_vec()));
    assert_eq!(shard.get(b"key3").unwrap(), Some(b"value3".to_vec()));
}

#[test]
fn close_then_reopen_preserves_data_in_an_sstable() {
    let dir = TempDir::new().unwrap();
    let shard_dir = dir.path().join("shard-0");
    let config = Config::builder().flush_threshold(1024).build();

    {
        let shard = Shard::open(shard_dir.clone(), config.clone()).unwrap();
        shard.set(b"key", b"value").unwrap();
        shard.close().unwrap();
    }

    let shard = Shard::open(shard_dir, config).unwrap();
    assert_eq!(shard.get(b"key").unwrap(), Some(b"value".to_vec()));
    assert_eq!(shard.sstable_count(), 1);
}

#[test]
fn concurrent_reads_observe_a_consistent_snapshot() {
    let (_dir, shard) = open_shard(1024 * 1024);
    let shard = Arc::new(shard);

    for i in 0..100 {
        shard.set(format!("key{i}").as_bytes(), format!("value{i}").as_bytes()).unwrap();
    }

    let mut handles = Vec::new();
    for _ in 0..4 {
        let shard = Arc::clone(&shard);
        handles.push(thread::spawn(move || {
            for i in 0..100 {
                let expected = format!("value{i}");
                assert_eq!(shard.get(format!("key{i}").as_bytes()).unwrap(), Some(expected.into_bytes()));
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn concurrent_writes_from_multiple_threads_all_land() {
    let (_dir, shard) = open_shard(1024 * 1024);
    let shard = Arc::new(shard);

    let mut handles = Vec::new();
    for t in 0..4 {
        let shard = Arc::clone(&shard);
        handles.push(thread::spawn(move || {
            for i in 0..25 {
                let key = format!("thread{t}_key{i}");
                let value = format!("thread{t}_value{i}");
                shard.set(key.as_bytes(), value.as_bytes()).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    for t in 0..4 {
        for i in 0..25 {
            let key = format!("thread{t}_key{i}");
            let expected = format!("thread{t}_value{i}");
            assert_eq!(shard.get(key.as_bytes()).unwrap(), Some(expected.into_bytes()));
        }
    }
}

#[test]
fn empty_key_and_empty_value_round_trip() {
    let (_dir, shard) = open_shard(1024);

    shard.set(b"", b"empty_key_value").unwrap();
    assert_eq!(shard.get(b"").unwrap(), Some(b"empty_key_value".to_vec()));

    shard.set(b"key", b"").unwrap();
    assert_eq!(shard.get(b"key").unwrap(), Some(Vec::new()));
}

#[test]
fn large_value_round_trips() {
    let (_dir, shard) = open_shard(1024);

    let large_value = vec![0xABu8; 200_000];
    shard.set(b"big", &large_value).unwrap();
    assert_eq!(shard.get(b"big").unwrap(), Some(large_value));
}

#[test]
fn binary_key_and_value_with_null_bytes_round_trip() {
    let (_dir, shard) = open_shard(1024);

    let key = b"\x00\x01\x02\xFF\xFE";
    let value = b"\xFF\x00\xAB\xCD\x00";
    shard.set(key, value).unwrap();
    assert_eq!(shard.get(key).unwrap(), Some(value.to_vec()));
}
