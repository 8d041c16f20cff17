//! SSTable Builder
//!
//! Writes sorted key-value entries to a new SSTable file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::{Error, Result};

use super::{SSTable, HEADER_SIZE, MAGIC, MAX_VALUE_LEN, TOMBSTONE_MARKER, VERSION};

/// Builder for creating new SSTables from sorted entries.
pub struct SSTableBuilder {
    path: std::path::PathBuf,
    writer: BufWriter<File>,
    entry_count: u64,
    current_offset: u64,
    index: Vec<(Vec<u8>, u64)>,
    data_hasher: crc32fast::Hasher,
    last_key: Option<Vec<u8>>,
}

impl SSTableBuilder {
    /// Create a new SSTable builder, writing the header immediately. Call
    /// `add`/`add_tombstone` in strictly ascending key order, then `finish`.
    pub fn new(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut writer = BufWriter::new(file);

        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&0u64.to_le_bytes())?; // entry count, patched in finish()

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            entry_count: 0,
            current_offset: HEADER_SIZE,
            index: Vec::new(),
            data_hasher: crc32fast::Hasher::new(),
            last_key: None,
        })
    }

    /// Add a live key-value pair.
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.write_entry(key, Some(value))
    }

    /// Add a tombstone.
    pub fn add_tombstone(&mut self, key: &[u8]) -> Result<()> {
        self.write_entry(key, None)
    }

    fn write_entry(&mut self, key: &[u8], value: Option<&[u8]>) -> Result<()> {
        if let Some(last) = &self.last_key {
            if key <= last.as_slice() {
                return Err(Error::InvalidArgument(format!(
                    "SSTable entries must be strictly ascending: {:?} after {:?}",
                    key, last
                )));
            }
        }
        self.last_key = Some(key.to_vec());

        self.index.push((key.to_vec(), self.current_offset));

        let key_len = key.len() as u32;
        let val_len = match value {
            Some(v) => {
                if v.len() as u64 > MAX_VALUE_LEN as u64 {
                    return Err(Error::InvalidArgument(format!(
                        "value too large for an SSTable entry: {} bytes (max {})",
                        v.len(),
                        MAX_VALUE_LEN
                    )));
                }
                v.len() as u32
            }
            None => TOMBSTONE_MARKER,
        };

        let key_len_bytes = key_len.to_le_bytes();
        let val_len_bytes = val_len.to_le_bytes();

        self.writer.write_all(&key_len_bytes)?;
        self.writer.write_all(&val_len_bytes)?;
        self.writer.write_all(key)?;

        self.data_hasher.update(&key_len_bytes);
        self.data_hasher.update(&val_len_bytes);
        self.data_hasher.update(key);

        let mut entry_size: u64 = 8 + key.len() as u64;

        if let Some(v) = value {
            self.writer.write_all(v)?;
            self.data_hasher.update(v);
            entry_size += v.len() as u64;
        }

        self.current_offset += entry_size;
        self.entry_count += 1;

        Ok(())
    }

    /// Write the index block and footer, fsync, and return the table's
    /// metadata.
    pub fn finish(mut self) -> Result<SSTable> {
        let index_offset = self.current_offset;

        for (key, offset) in &self.index {
            let key_len = key.len() as u32;
            self.writer.write_all(&key_len.to_le_bytes())?;
            self.writer.write_all(&offset.to_le_bytes())?;
            self.writer.write_all(key)?;
        }

        let data_crc = self.data_hasher.finalize();

        self.writer.write_all(&index_offset.to_le_bytes())?;
        self.writer.write_all(&data_crc.to_le_bytes())?;
        self.writer.write_all(&[0u8; 4])?;

        self.writer.flush()?;

        let mut file = self
            .writer
            .into_inner()
            .map_err(|e| Error::Corruption(format!("failed to flush SSTable: {}", e)))?;
        file.seek(SeekFrom::Start(6))?; // after magic + version
        file.write_all(&self.entry_count.to_le_bytes())?;
        file.sync_all()?;

        Ok(SSTable { path: self.path, entry_count: self.entry_count })
    }
}
