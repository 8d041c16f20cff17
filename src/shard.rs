//! Shard Engine
//!
//! The per-shard storage engine: a memtable backed by a write-ahead log
//! (fronted by a group-commit batcher) and an ordered stack of immutable
//! SSTables.
//!
//! ## Concurrency model
//!
//! - **Writes** (`set`/`delete`) install into the memtable under a brief
//!   exclusive lock, then enqueue a WAL record and wait for the batcher's
//!   durability ack. Memtable writes are visible to readers the instant the
//!   exclusive lock is released — before the record is durable.
//! - **Reads** (`get`) take only a shared lock on the memtable, then (on a
//!   miss) a shared lock on the SSTable list. `get` never blocks behind a
//!   writer's WAL wait.
//! - **Compaction** is serialized per shard by `compaction_lock`; it never
//!   blocks concurrent reads, and writes resume against the new batcher as
//!   soon as the pointer swap is visible.
//!
//! The active WAL is fronted by a [`crate::batcher::Batcher`] reached
//! through a `parking_lot::RwLock<Arc<Batcher>>` indirection, so compaction
//! can swap in a fresh batcher while in-flight writers still hold (and
//! finish using) a clone of the old one.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::batcher::Batcher;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::memtable::{MemTable, MemTableEntry};
use crate::sstable::{self, SSTableBuilder, SSTableReader};
use crate::wal::{self, WalWriter};

const ACTIVE_WAL_FILENAME: &str = "active.wal";

/// A single shard's storage engine: memtable, batched WAL, SSTable stack.
pub struct Shard {
    dir: PathBuf,
    config: Config,
    memtable: RwLock<MemTable>,
    batcher: RwLock<Arc<Batcher>>,
    /// Oldest first; reads scan in reverse (newest first).
    sstables: RwLock<Vec<Arc<SSTableReader>>>,
    compaction_lock: Mutex<()>,
    degraded: AtomicBool,
    next_file_id: AtomicU64,
}

impl Shard {
    /// Open (or create) the shard rooted at `dir`: discover existing
    /// SSTables, replay the active WAL into a fresh memtable, and spawn a
    /// batcher over it.
    pub fn open(dir: PathBuf, config: Config) -> Result<Self> {
        fs::create_dir_all(&dir)?;

        let mut sstable_files: Vec<(u64, PathBuf)> = Vec::new();
        let mut max_id = 0u64;
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else { continue };
            if let Some(id) = parse_id(name, "sst-", ".sst") {
                max_id = max_id.max(id);
                sstable_files.push((id, path));
            } else if let Some(id) = parse_id(name, "retired-", ".wal") {
                max_id = max_id.max(id);
                // Left over from a crash between compaction's rotation and
                // its cleanup unlink; its content is already covered by
                // whatever SSTable the crashed run managed to flush, or was
                // never acked. Either way it is safe to discard.
                let _ = fs::remove_file(&path);
            }
        }
        sstable_files.sort_by_key(|(id, _)| *id);

        let mut sstables = Vec::with_capacity(sstable_files.len());
        for (_, path) in sstable_files {
            match SSTableReader::open(&path) {
                Ok(reader) => sstables.push(Arc::new(reader)),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable sstable at open");
                }
            }
        }

        let active_wal_path = dir.join(ACTIVE_WAL_FILENAME);
        if !active_wal_path.exists() {
            WalWriter::create(&active_wal_path)?;
        }
        let mut memtable = MemTable::new();
        let replayed = wal::replay_into(&active_wal_path, &mut memtable)?;
        if replayed > 0 {
            tracing::info!(shard = %dir.display(), records = replayed, "replayed WAL into memtable");
        }

        let batcher = Batcher::spawn(
            active_wal_path,
            config.batch_size,
            config.flush_interval,
            config.queue_capacity,
        );

        Ok(Self {
            dir,
            config,
            memtable: RwLock::new(memtable),
            batcher: RwLock::new(Arc::new(batcher)),
            sstables: RwLock::new(sstables),
            compaction_lock: Mutex::new(()),
            degraded: AtomicBool::new(false),
            next_file_id: AtomicU64::new(max_id + 1),
        })
    }

    /// The shard's subdirectory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `true` once a durability failure has made this shard reject writes
    /// until the next successful compaction rotates the WAL.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    /// Number of SSTables currently in the shard's stack.
    pub fn sstable_count(&self) -> usize {
        self.sstables.read().len()
    }

    fn current_batcher(&self) -> Arc<Batcher> {
        self.batcher.read().clone()
    }

    fn next_id(&self) -> u64 {
        self.next_file_id.fetch_add(1, Ordering::Relaxed)
    }

    fn fresh_sstable_path(&self) -> PathBuf {
        self.dir.join(format!("sst-{:010}.sst", self.next_id()))
    }

    fn reject_if_degraded(&self) -> Result<()> {
        if self.degraded.load(Ordering::Acquire) {
            return Err(Error::BatcherStopped(
                "shard is degraded after a prior durability failure; writes are rejected \
                 until the next compaction rotates the WAL"
                    .into(),
            ));
        }
        Ok(())
    }

    fn mark_degraded(&self, err: Error) -> Error {
        if !self.degraded.swap(true, Ordering::AcqRel) {
            tracing::error!(shard = %self.dir.display(), error = %err, "batcher write failed, shard marked degraded");
        }
        err
    }

    /// Install `key := value`, then wait for the record to be durable.
    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.reject_if_degraded()?;

        {
            let mut memtable = self.memtable.write();
            memtable.put(key.to_vec(), value.to_vec());
            let len = memtable.len();
            drop(memtable);
            if len >= self.config.flush_threshold {
                self.flush()?;
            }
        }

        self.current_batcher()
            .enqueue_set(key.to_vec(), value.to_vec())
            .map_err(|e| self.mark_degraded(e))
    }

    /// Install a tombstone for `key`, then wait for the record to be
    /// durable. Deleting an absent key is not an error.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.reject_if_degraded()?;

        {
            let mut memtable = self.memtable.write();
            memtable.delete(key.to_vec());
            let len = memtable.len();
            drop(memtable);
            if len >= self.config.flush_threshold {
                self.flush()?;
            }
        }

        self.current_batcher()
            .enqueue_del(key.to_vec())
            .map_err(|e| self.mark_degraded(e))
    }

    /// Memtable first, then the SSTable stack newest to oldest. Never takes
    /// the memtable's exclusive lock.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        {
            let memtable = self.memtable.read();
            if let Some(entry) = memtable.get(key) {
                return Ok(entry.as_value().map(|v| v.to_vec()));
            }
        }

        let sstables = self.sstables.read();
        for reader in sstables.iter().rev() {
            match reader.lookup(key) {
                Ok(sstable::Lookup::Found(value)) => return Ok(Some(value)),
                Ok(sstable::Lookup::Tombstone) => return Ok(None),
                Ok(sstable::Lookup::NotFound) => continue,
                Err(e) => {
                    tracing::warn!(
                        table = %reader.path().display(),
                        error = %e,
                        "skipping sstable after read error"
                    );
                    continue;
                }
            }
        }
        Ok(None)
    }

    /// Snapshot the memtable into a fresh SSTable and drop the snapshotted
    /// entries from it. A no-op on an empty memtable (keeps repeated
    /// compaction/flush calls from littering the shard directory with empty
    /// tables).
    pub fn flush(&self) -> Result<()> {
        let snapshot: Vec<(Vec<u8>, MemTableEntry)> = {
            let memtable = self.memtable.read();
            if memtable.is_empty() {
                return Ok(());
            }
            memtable.iter().map(|(k, v)| (k.to_vec(), v.clone())).collect()
        };
        self.write_snapshot_and_install(snapshot)
    }

    fn write_snapshot_and_install(&self, snapshot: Vec<(Vec<u8>, MemTableEntry)>) -> Result<()> {
        if snapshot.is_empty() {
            return Ok(());
        }

        let path = self.fresh_sstable_path();
        let mut builder = SSTableBuilder::new(&path)?;
        for (key, entry) in &snapshot {
            match entry {
                MemTableEntry::Value(v) => builder.add(key, v)?,
                MemTableEntry::Tombstone => builder.add_tombstone(key)?,
            }
        }
        let meta = builder.finish()?;
        tracing::debug!(
            path = %path.display(),
            entries = meta.entry_count(),
            "flushed memtable to sstable"
        );

        let reader = Arc::new(SSTableReader::open(&path)?);
        self.sstables.write().push(reader);
        // Not a blanket `clear()`: a concurrent writer may have installed a
        // new entry (or overwritten this one) after the snapshot above was
        // taken but before we get the exclusive lock here. Only remove
        // entries whose current value still matches what was snapshotted.
        self.memtable.write().remove_if_unchanged(&snapshot);
        Ok(())
    }

    /// WAL rotation + memtable drain, then a merge of the two oldest
    /// SSTables if at least two exist. Serialized per shard.
    pub fn compact(&self) -> Result<()> {
        let _guard = self.compaction_lock.lock();
        self.rotate_wal_and_drain_memtable()?;
        self.merge_oldest_sstables()?;
        Ok(())
    }

    fn rotate_wal_and_drain_memtable(&self) -> Result<()> {
        let active_path = self.dir.join(ACTIVE_WAL_FILENAME);
        let retired_path = self.dir.join(format!("retired-{:010}.wal", self.next_id()));

        let old_batcher = {
            let mut current = self.batcher.write();
            let old = current.clone();
            // Reject new enqueues on the old batcher immediately; anything
            // already in flight is still allowed to finish and land in the
            // about-to-be-retired file before we drain it below.
            old.pause_for_maintenance();
            fs::rename(&active_path, &retired_path)?;
            let new_batcher = Batcher::spawn(
                active_path.clone(),
                self.config.batch_size,
                self.config.flush_interval,
                self.config.queue_capacity,
            );
            *current = Arc::new(new_batcher);
            old
        };

        // Drain and stop the old batcher before snapshotting the memtable:
        // every enqueue it still manages to ack happens-before this call
        // returns, and that caller's memtable write happens-before its own
        // enqueue call (program order) — so the snapshot below is
        // guaranteed to already reflect every write this retired WAL file
        // was allowed to durably record.
        old_batcher.stop();

        let snapshot: Vec<(Vec<u8>, MemTableEntry)> = {
            let memtable = self.memtable.read();
            memtable.iter().map(|(k, v)| (k.to_vec(), v.clone())).collect()
        };
        self.write_snapshot_and_install(snapshot)?;

        fs::remove_file(&retired_path)?;
        self.degraded.store(false, Ordering::Release);
        Ok(())
    }

    fn merge_oldest_sstables(&self) -> Result<()> {
        let (old_path, new_path) = {
            let sstables = self.sstables.read();
            if sstables.len() < 2 {
                return Ok(());
            }
            (sstables[0].path().to_path_buf(), sstables[1].path().to_path_buf())
        };

        // Build into a throwaway fresh-id path first, since `old_path` and
        // `new_path` are both still live. Once built, rename it into the
        // newer input's id slot rather than keeping a fresh, highest id:
        // `Shard::open` reconstructs stack order purely from ascending file
        // id, so the merged table must sort exactly where its newest input
        // used to sit, never after tables it was never merged with.
        let build_path = self.fresh_sstable_path();
        let inputs = [SSTableReader::open(&old_path)?, SSTableReader::open(&new_path)?];
        sstable::merge(&build_path, &inputs)?;

        let new_id = new_path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| parse_id(n, "sst-", ".sst"))
            .expect("sstable path always matches sst-<id>.sst");
        let merged_path = self.dir.join(format!("sst-{:010}.sst", new_id));

        fs::remove_file(&old_path)?;
        fs::remove_file(&new_path)?;
        fs::rename(&build_path, &merged_path)?;
        let merged_reader = Arc::new(SSTableReader::open(&merged_path)?);

        {
            let mut sstables = self.sstables.write();
            sstables.drain(0..2);
            sstables.insert(0, merged_reader);
        }

        Ok(())
    }

    /// Flush any remaining memtable entries, then stop the batcher (joining
    /// its background thread so no file handle is leaked).
    pub fn close(&self) -> Result<()> {
        self.flush()?;
        self.current_batcher().stop();
        Ok(())
    }
}

fn parse_id(name: &str, prefix: &str, suffix: &str) -> Option<u64> {
    name.strip_prefix(prefix)?.strip_suffix(suffix)?.parse().ok()
}
