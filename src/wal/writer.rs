//! WAL writer — a thin append-only codec over a file handle.
//!
//! Carries no batching policy of its own: `crate::batcher::Batcher` owns
//! the producer queue, the batch-size/flush-interval decision, and the
//! fsync cadence, and calls straight through to [`WalWriter::append`] and
//! [`WalWriter::sync_all`].

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use super::Operation;

/// Append-only writer for one WAL file.
pub struct WalWriter {
    file: BufWriter<File>,
    path: PathBuf,
}

impl WalWriter {
    /// Create a fresh, empty WAL file at `path` (truncates if one exists).
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(Self { file: BufWriter::new(file), path: path.to_path_buf() })
    }

    /// Open an existing WAL file for append, preserving whatever records
    /// replay already recovered from it.
    pub fn open_append(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file: BufWriter::new(file), path: path.to_path_buf() })
    }

    /// Path of the underlying WAL file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Buffer one record's encoded bytes. Does not flush or fsync.
    pub fn append(&mut self, op: &Operation) -> Result<()> {
        self.file.write_all(&op.encode())?;
        Ok(())
    }

    /// Flush the in-process buffer to the OS. No durability guarantee.
    pub fn flush(&mut self) -> Result<()> {
        self.file.flush()?;
        Ok(())
    }

    /// Flush the buffer and fsync the file — the durable point for every
    /// record appended so far.
    pub fn sync_all(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.get_ref().sync_all()?;
        Ok(())
    }
}
