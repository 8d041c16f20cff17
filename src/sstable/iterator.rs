//! SSTable Iterator
//!
//! Sequential iteration over every entry in an SSTable, in ascending key
//! order. Used by merge and by tests; opens its own file handle so it never
//! competes with a reader's point lookups for a shared cursor.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::Result;

use super::{HEADER_SIZE, TOMBSTONE_MARKER};

/// Iterator over SSTable entries in sorted key order.
pub struct SSTableIterator {
    file: BufReader<File>,
    /// Stop reading at the start of the index block.
    end_offset: u64,
    current_offset: u64,
}

impl SSTableIterator {
    pub(super) fn open(path: &Path, end_offset: u64) -> Result<Self> {
        let mut file = File::open(path)?;
        file.seek(SeekFrom::Start(HEADER_SIZE))?;
        Ok(Self { file: BufReader::new(file), end_offset, current_offset: HEADER_SIZE })
    }
}

impl Iterator for SSTableIterator {
    /// `(key, Some(value))` for a live entry, `(key, None)` for a tombstone.
    type Item = Result<(Vec<u8>, Option<Vec<u8>>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_offset >= self.end_offset {
            return None;
        }

        let mut header = [0u8; 8];
        if let Err(e) = self.file.read_exact(&mut header) {
            return Some(Err(e.into()));
        }

        let key_len = u32::from_le_bytes(header[0..4].try_into().unwrap()) as usize;
        let val_len = u32::from_le_bytes(header[4..8].try_into().unwrap());

        let mut key = vec![0u8; key_len];
        if let Err(e) = self.file.read_exact(&mut key) {
            return Some(Err(e.into()));
        }

        let mut entry_size = 8 + key_len as u64;

        let value = if val_len == TOMBSTONE_MARKER {
            None
        } else {
            let mut v = vec![0u8; val_len as usize];
            if let Err(e) = self.file.read_exact(&mut v) {
                return Some(Err(e.into()));
            }
            entry_size += val_len as u64;
            Some(v)
        };

        self.current_offset += entry_size;

        Some(Ok((key, value)))
    }
}
