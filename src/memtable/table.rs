//! MemTable implementation
//!
//! Plain `BTreeMap`-backed memtable. This type carries no internal lock —
//! `crate::shard::Shard` holds the single `parking_lot::RwLock<MemTable>`
//! that serializes writers and admits concurrent readers, so double-locking
//! here would only add overhead without changing the concurrency story.

use std::collections::BTreeMap;

use super::MemTableEntry;

/// In-memory table for a shard's recent writes, in ascending key order.
#[derive(Debug, Default)]
pub struct MemTable {
    data: BTreeMap<Vec<u8>, MemTableEntry>,
    /// Approximate byte size of all keys and live values currently held.
    approx_size: usize,
}

impl MemTable {
    /// Create a new empty MemTable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an entry by key.
    pub fn get(&self, key: &[u8]) -> Option<&MemTableEntry> {
        self.data.get(key)
    }

    /// Install a live value for `key`.
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.adjust_for_replacement(&key, &Some(value.len()));
        self.data.insert(key, MemTableEntry::Value(value));
    }

    /// Install a tombstone for `key`.
    pub fn delete(&mut self, key: Vec<u8>) {
        self.adjust_for_replacement(&key, &None);
        self.data.insert(key, MemTableEntry::Tombstone);
    }

    /// Account for `approx_size` before overwriting (or freshly inserting)
    /// the entry at `key` with a value of length `new_len` (`None` for a
    /// tombstone).
    fn adjust_for_replacement(&mut self, key: &[u8], new_len: &Option<usize>) {
        match self.data.get(key) {
            Some(MemTableEntry::Value(old)) => {
                self.approx_size = self.approx_size.saturating_sub(old.len());
            }
            Some(MemTableEntry::Tombstone) => {}
            None => {
                self.approx_size = self.approx_size.saturating_add(key.len());
            }
        }
        if let Some(len) = new_len {
            self.approx_size = self.approx_size.saturating_add(*len);
        }
    }

    /// Approximate byte size of keys and live values held (used for the
    /// flush-threshold decision; entry *count* is used directly by the
    /// shard for the spec's `FLUSH_THRESHOLD`, this is exposed for callers
    /// that want a byte-based policy instead).
    pub fn approx_size(&self) -> usize {
        self.approx_size
    }

    /// Number of entries, including tombstones.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// `true` if the memtable holds no entries.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Iterate all entries in ascending key order, including tombstones.
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &MemTableEntry)> {
        self.data.iter().map(|(k, v)| (k.as_slice(), v))
    }

    /// Remove every entry (called after a successful flush snapshot).
    pub fn clear(&mut self) {
        self.data.clear();
        self.approx_size = 0;
    }

    /// Remove exactly the entries in `snapshot` whose current value is still
    /// the one that was snapshotted. Called after a flush instead of
    /// `clear()` so a write installed by a concurrent writer after the
    /// snapshot was taken (and thus not covered by it) survives.
    pub fn remove_if_unchanged(&mut self, snapshot: &[(Vec<u8>, MemTableEntry)]) {
        for (key, expected) in snapshot {
            if self.data.get(key.as_slice()) == Some(expected) {
                self.data.remove(key.as_slice());
                self.approx_size = self.approx_size.saturating_sub(key.len());
                if let MemTableEntry::Value(v) = expected {
                    self.approx_size = self.approx_size.saturating_sub(v.len());
                }
            }
        }
    }
}
