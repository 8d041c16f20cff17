//! SSTable Reader
//!
//! Opens an SSTable file, validates its header/footer, and loads the index
//! block into memory for direct-offset point lookups. A reader is stateless
//! per lookup — it opens a fresh file handle per call rather than holding a
//! cursor — so one `SSTableReader` can be shared (e.g. via `Arc`) across
//! concurrent readers without a lock.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

use super::iterator::SSTableIterator;
use super::{FOOTER_SIZE, HEADER_SIZE, MAGIC, TOMBSTONE_MARKER, VERSION};

/// Outcome of a point lookup against one SSTable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The key is present with a live value.
    Found(Vec<u8>),
    /// The key is present in this table but tombstoned.
    Tombstone,
    /// The key does not appear in this table.
    NotFound,
}

/// Reader for one SSTable file, with its index loaded into memory.
pub struct SSTableReader {
    path: PathBuf,
    index: BTreeMap<Vec<u8>, u64>,
    entry_count: u64,
    index_offset: u64,
}

impl SSTableReader {
    /// Open an SSTable for reading. Validates the magic, version, and data
    /// block checksum; a failure here is corruption, not a missing-table
    /// condition — callers should skip the table and keep scanning older
    /// ones per the multi-level read path.
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();

        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;
        if &header[0..4] != MAGIC {
            return Err(Error::Corruption(format!(
                "bad SSTable magic in {}: {:?}",
                path.display(),
                &header[0..4]
            )));
        }
        let version = u16::from_le_bytes(header[4..6].try_into().unwrap());
        if version != VERSION {
            return Err(Error::Corruption(format!(
                "unsupported SSTable version {} in {}",
                version,
                path.display()
            )));
        }
        let entry_count = u64::from_le_bytes(header[6..14].try_into().unwrap());

        file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.read_exact(&mut footer)?;
        let index_offset = u64::from_le_bytes(footer[0..8].try_into().unwrap());
        let expected_crc = u32::from_le_bytes(footer[8..12].try_into().unwrap());

        if index_offset < HEADER_SIZE || index_offset > file_size.saturating_sub(FOOTER_SIZE) {
            return Err(Error::Corruption(format!(
                "SSTable index offset out of range in {}",
                path.display()
            )));
        }

        let mut hasher = crc32fast::Hasher::new();
        file.seek(SeekFrom::Start(HEADER_SIZE))?;
        let mut remaining = index_offset - HEADER_SIZE;
        let mut chunk = [0u8; 8192];
        while remaining > 0 {
            let want = remaining.min(chunk.len() as u64) as usize;
            file.read_exact(&mut chunk[..want])?;
            hasher.update(&chunk[..want]);
            remaining -= want as u64;
        }
        if hasher.finalize() != expected_crc {
            return Err(Error::Corruption(format!(
                "SSTable data block checksum mismatch in {}",
                path.display()
            )));
        }

        let index_block_size = file_size - FOOTER_SIZE - index_offset;
        let mut index_data = vec![0u8; index_block_size as usize];
        file.seek(SeekFrom::Start(index_offset))?;
        file.read_exact(&mut index_data)?;

        let mut index = BTreeMap::new();
        let mut pos = 0;
        while pos < index_data.len() {
            if pos + 4 > index_data.len() {
                break;
            }
            let key_len = u32::from_le_bytes(index_data[pos..pos + 4].try_into().unwrap()) as usize;
            pos += 4;
            if pos + 8 > index_data.len() {
                break;
            }
            let offset = u64::from_le_bytes(index_data[pos..pos + 8].try_into().unwrap());
            pos += 8;
            if pos + key_len > index_data.len() {
                break;
            }
            let key = index_data[pos..pos + key_len].to_vec();
            pos += key_len;
            index.insert(key, offset);
        }

        Ok(Self { path: path.to_path_buf(), index, entry_count, index_offset })
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Point lookup via the in-memory index, O(log n) plus one seek.
    pub fn lookup(&self, key: &[u8]) -> Result<Lookup> {
        let offset = match self.index.get(key) {
            Some(&off) => off,
            None => return Ok(Lookup::NotFound),
        };

        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;

        let mut header = [0u8; 8];
        file.read_exact(&mut header)?;
        let key_len = u32::from_le_bytes(header[0..4].try_into().unwrap()) as usize;
        let val_len = u32::from_le_bytes(header[4..8].try_into().unwrap());

        file.seek(SeekFrom::Current(key_len as i64))?;

        if val_len == TOMBSTONE_MARKER {
            return Ok(Lookup::Tombstone);
        }

        let mut value = vec![0u8; val_len as usize];
        file.read_exact(&mut value)?;
        Ok(Lookup::Found(value))
    }

    /// Number of entries (including tombstones).
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Smallest key in this table.
    pub fn min_key(&self) -> Option<&[u8]> {
        self.index.keys().next().map(|k| k.as_slice())
    }

    /// Largest key in this table.
    pub fn max_key(&self) -> Option<&[u8]> {
        self.index.keys().next_back().map(|k| k.as_slice())
    }

    /// `false` only if `key` is definitely outside `[min_key, max_key]`.
    pub fn might_contain(&self, key: &[u8]) -> bool {
        match (self.min_key(), self.max_key()) {
            (Some(min), Some(max)) => key >= min && key <= max,
            _ => false,
        }
    }

    /// Iterate every entry in ascending key order (used by merge).
    pub fn iter(&self) -> Result<SSTableIterator> {
        SSTableIterator::open(&self.path, self.index_offset)
    }
}
