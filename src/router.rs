//! Shard Router
//!
//! Partitions the keyspace across a fixed number of independent
//! [`Shard`]s by a stable FNV-1a hash, and fans `close`/`compact` out across
//! all of them.

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::Result;
use crate::shard::Shard;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// FNV-1a over `key`, stable across process restarts for a given key.
fn fnv1a(key: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for &byte in key {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// The top-level embedded database: a fixed set of shards, each owning its
/// own subdirectory under `base_dir`.
pub struct Db {
    base_dir: PathBuf,
    shards: Vec<Shard>,
}

impl Db {
    /// Open (or create) a database at `base_dir` with `shard_count` shards.
    /// `shard_count` and the hash function are part of the on-disk contract:
    /// changing `shard_count` across restarts invalidates routing.
    pub fn open(base_dir: impl Into<PathBuf>, shard_count: usize, config: Config) -> Result<Self> {
        let base_dir = base_dir.into();
        let mut shards = Vec::with_capacity(shard_count);
        for i in 0..shard_count {
            let shard_dir = base_dir.join(format!("shard-{i}"));
            shards.push(Shard::open(shard_dir, config.clone())?);
        }
        Ok(Self { base_dir, shards })
    }

    /// Base directory this database was opened with.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Number of shards.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn shard_for(&self, key: &[u8]) -> &Shard {
        let index = (fnv1a(key) as usize) % self.shards.len();
        &self.shards[index]
    }

    /// Install `key := value` into its owning shard, durably.
    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.shard_for(key).set(key, value)
    }

    /// Look up `key` in its owning shard.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.shard_for(key).get(key)
    }

    /// Tombstone `key` in its owning shard, durably.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.shard_for(key).delete(key)
    }

    /// Run compaction on every shard. Every shard is attempted regardless
    /// of earlier failures; the first error encountered is returned.
    pub fn compact(&self) -> Result<()> {
        let mut first_err = None;
        for shard in &self.shards {
            if let Err(e) = shard.compact() {
                tracing::error!(shard = %shard.dir().display(), error = %e, "compaction failed");
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Close every shard in order. Every shard is closed regardless of
    /// earlier failures; the first error encountered is returned.
    pub fn close(&self) -> Result<()> {
        let mut first_err = None;
        for shard in &self.shards {
            if let Err(e) = shard.close() {
                tracing::error!(shard = %shard.dir().display(), error = %e, "shard close failed");
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
