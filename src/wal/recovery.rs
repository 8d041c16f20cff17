//! WAL replay into a memtable on shard open.

use std::path::Path;

use crate::error::Result;
use crate::memtable::MemTable;
use super::reader::WalReader;
use super::record::Operation;

/// Replay every record in the WAL at `path` into `memtable`, in order.
///
/// A missing file replays as zero records (a shard's first open creates the
/// WAL afterward). A truncated trailing record silently ends replay; every
/// record before it has already been applied, per §4.2's truncation
/// tolerance.
pub fn replay_into(path: &Path, memtable: &mut MemTable) -> Result<usize> {
    if !path.exists() {
        return Ok(0);
    }
    let reader = WalReader::open(path)?;
    let mut applied = 0usize;
    for record in reader.records() {
        match record? {
            Operation::Set { key, value } => memtable.put(key, value),
            Operation::Del { key } => memtable.delete(key),
        }
        applied += 1;
    }
    Ok(applied)
}
