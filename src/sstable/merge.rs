//! SSTable merge — combine two or more immutable tables into one.
//!
//! Duplicate keys resolve to the entry from the newest input. A key whose
//! newest-within-`inputs` entry is a tombstone is dropped entirely from the
//! output. That is only sound when no table older than `inputs` can still
//! carry a live value for the dropped key — `Shard::compact` upholds this by
//! always merging the two *oldest* tables in a shard's list, never an
//! arbitrary pair.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::Result;

use super::builder::SSTableBuilder;
use super::reader::SSTableReader;
use super::SSTable;

/// Merge `inputs` (oldest first) into a single new SSTable at `out`.
pub fn merge(out: &Path, inputs: &[SSTableReader]) -> Result<SSTable> {
    let mut merged: BTreeMap<Vec<u8>, Option<Vec<u8>>> = BTreeMap::new();

    for reader in inputs {
        for entry in reader.iter()? {
            let (key, value) = entry?;
            merged.insert(key, value);
        }
    }

    let mut builder = SSTableBuilder::new(out)?;
    for (key, value) in &merged {
        if let Some(v) = value {
            builder.add(key, v)?;
        }
    }
    builder.finish()
}
