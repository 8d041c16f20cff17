//! Write Batcher (group commit)
//!
//! Fronts a single WAL file with a bounded producer queue. A dedicated
//! background thread owns the write buffer and file handle, coalescing
//! concurrent enqueues into batches that share one fsync, then acks each
//! caller in enqueue order only after its record is durable.
//!
//! Grounded on the group-commit pattern of a bounded-channel WAL writer with
//! a background flush thread driven by a batch-size-or-deadline race; this
//! version adds `pause_for_maintenance`/`resume_after_maintenance` (used by
//! `crate::shard` to take a WAL offline during compaction's rotation) and a
//! `stop()` that drains and flushes whatever is still queued before
//! rejecting further enqueues.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::wal::{Operation, WalWriter};

enum Pending {
    Set { key: Vec<u8>, value: Vec<u8> },
    Del { key: Vec<u8> },
}

enum Cmd {
    Enqueue(Pending, Sender<Result<()>>),
    Stop(Sender<()>),
}

/// Group-commit layer in front of one WAL file.
pub struct Batcher {
    tx: Sender<Cmd>,
    paused: AtomicBool,
    stopped: AtomicBool,
    join_handle: Mutex<Option<JoinHandle<()>>>,
    wal_path: PathBuf,
}

impl Batcher {
    /// Open `wal_path` for append and spawn the background flusher.
    ///
    /// The WAL file is expected to already exist with whatever content
    /// recovery replayed; this only ever appends.
    pub fn spawn(
        wal_path: PathBuf,
        batch_size: usize,
        flush_interval: Duration,
        queue_capacity: usize,
    ) -> Self {
        let (tx, rx) = bounded(queue_capacity.max(1));
        let thread_path = wal_path.clone();
        let handle = thread::spawn(move || Self::run(thread_path, rx, batch_size, flush_interval));

        Self {
            tx,
            paused: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            join_handle: Mutex::new(Some(handle)),
            wal_path,
        }
    }

    /// Path of the WAL file this batcher writes to.
    pub fn wal_path(&self) -> &Path {
        &self.wal_path
    }

    /// `true` once this batcher has been stopped (terminally — unlike
    /// pause, this never accepts writes again).
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Enqueue a `SET` record; blocks until flushed and fsynced, or the
    /// batcher rejects it.
    pub fn enqueue_set(&self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        self.enqueue(Pending::Set { key, value })
    }

    /// Enqueue a `DEL` record; blocks until flushed and fsynced, or the
    /// batcher rejects it.
    pub fn enqueue_del(&self, key: Vec<u8>) -> Result<()> {
        self.enqueue(Pending::Del { key })
    }

    fn enqueue(&self, pending: Pending) -> Result<()> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(Error::BatcherStopped("batcher has been stopped".into()));
        }
        if self.paused.load(Ordering::Acquire) {
            return Err(Error::BatcherStopped("batcher is paused for maintenance".into()));
        }

        let (ack_tx, ack_rx) = bounded(1);
        self.tx
            .send(Cmd::Enqueue(pending, ack_tx))
            .map_err(|_| Error::BatcherStopped("batcher flusher thread has exited".into()))?;

        ack_rx
            .recv()
            .map_err(|_| Error::BatcherStopped("batcher flusher thread exited before acking".into()))?
    }

    /// Reject new enqueues immediately; in-flight batches keep running.
    /// Used while the caller takes this WAL offline (e.g. compaction's
    /// rotation step, before the old batcher is fully drained and stopped).
    pub fn pause_for_maintenance(&self) {
        self.paused.store(true, Ordering::Release);
    }

    /// Undo [`Batcher::pause_for_maintenance`].
    pub fn resume_after_maintenance(&self) {
        self.paused.store(false, Ordering::Release);
    }

    /// Flush whatever is currently queued, ack it, then terminate the
    /// background flusher. Idempotent. Subsequent enqueues fail.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        let (done_tx, done_rx) = bounded(1);
        if self.tx.send(Cmd::Stop(done_tx)).is_ok() {
            let _ = done_rx.recv();
        }
        if let Some(handle) = self.join_handle.lock().take() {
            let _ = handle.join();
        }
    }

    fn run(wal_path: PathBuf, rx: Receiver<Cmd>, batch_size: usize, flush_interval: Duration) {
        let mut writer = match WalWriter::open_append(&wal_path) {
            Ok(w) => w,
            Err(e) => {
                tracing::error!(error = %e, path = %wal_path.display(), "batcher failed to open WAL for append");
                Self::drain_with_error(&rx, &e);
                return;
            }
        };

        let mut batch: Vec<(Pending, Sender<Result<()>>)> = Vec::with_capacity(batch_size);
        let mut deadline = Instant::now() + flush_interval;

        loop {
            let timeout = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(timeout) {
                Ok(Cmd::Enqueue(pending, ack)) => {
                    if batch.is_empty() {
                        deadline = Instant::now() + flush_interval;
                    }
                    batch.push((pending, ack));
                    if batch.len() >= batch_size {
                        Self::flush_batch(&mut writer, std::mem::take(&mut batch));
                        deadline = Instant::now() + flush_interval;
                    }
                }
                Ok(Cmd::Stop(done)) => {
                    if !batch.is_empty() {
                        Self::flush_batch(&mut writer, std::mem::take(&mut batch));
                    }
                    let _ = done.send(());
                    return;
                }
                Err(RecvTimeoutError::Timeout) => {
                    if !batch.is_empty() {
                        Self::flush_batch(&mut writer, std::mem::take(&mut batch));
                    }
                    deadline = Instant::now() + flush_interval;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    if !batch.is_empty() {
                        Self::flush_batch(&mut writer, std::mem::take(&mut batch));
                    }
                    return;
                }
            }
        }
    }

    fn flush_batch(writer: &mut WalWriter, batch: Vec<(Pending, Sender<Result<()>>)>) {
        let mut first_err: Option<Error> = None;

        for (pending, _) in &batch {
            let op = match pending {
                Pending::Set { key, value } => Operation::Set { key: key.clone(), value: value.clone() },
                Pending::Del { key } => Operation::Del { key: key.clone() },
            };
            if let Err(e) = writer.append(&op) {
                first_err = Some(e);
                break;
            }
        }

        if first_err.is_none() {
            if let Err(e) = writer.sync_all() {
                first_err = Some(e);
            }
        }

        match first_err {
            None => {
                for (_, ack) in batch {
                    let _ = ack.send(Ok(()));
                }
            }
            Some(e) => {
                tracing::error!(error = %e, "WAL batch flush failed");
                for (_, ack) in batch {
                    let _ = ack.send(Err(duplicate(&e)));
                }
            }
        }
    }

    fn drain_with_error(rx: &Receiver<Cmd>, err: &Error) {
        while let Ok(cmd) = rx.recv() {
            match cmd {
                Cmd::Enqueue(_, ack) => {
                    let _ = ack.send(Err(duplicate(err)));
                }
                Cmd::Stop(done) => {
                    let _ = done.send(());
                    return;
                }
            }
        }
    }
}

impl Drop for Batcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// `Error` has no `Clone` impl (it wraps `std::io::Error`), but a failed
/// batch must hand an independent error to every waiting caller.
fn duplicate(err: &Error) -> Error {
    match err {
        Error::Io(e) => Error::Io(std::io::Error::new(e.kind(), e.to_string())),
        Error::Corruption(m) => Error::Corruption(m.clone()),
        Error::InvalidArgument(m) => Error::InvalidArgument(m.clone()),
        Error::BatcherStopped(m) => Error::BatcherStopped(m.clone()),
        Error::Closed => Error::Closed,
    }
}
