//! Batched, serialized appends to one output file.
//!
//! Each output file is owned by a single dedicated writer thread fed
//! through a bounded channel. The classifier hands over full batches and
//! never touches the file itself, so rows land in the file in exactly
//! the order they were enqueued and no two flushes of the same file can
//! ever run concurrently.

use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use std::thread::{self, JoinHandle};

use log::debug;

use crate::error::SnapshotError;

/// Rows accumulated per record kind before a batch is handed to its
/// writer thread.
pub const BATCH_SIZE: usize = 50_000;

/// Batches a writer thread may hold queued before `submit` blocks.
const FLUSH_QUEUE_DEPTH: usize = 4;

/// Output buffer size of each writer thread.
const FLUSH_BUFFER_SIZE: usize = 4 * 1024 * 1024;

/// Asynchronous, order-preserving writer for one output file.
///
/// `spawn` starts the worker; `submit` enqueues a batch of rows,
/// blocking only when the queue is full; `finish` closes the queue,
/// waits for every outstanding flush, and reports how many rows were
/// written. Any I/O failure inside the worker surfaces from `submit` or
/// `finish` with its underlying cause.
pub struct BatchWriter {
    tx: Option<SyncSender<Vec<String>>>,
    worker: Option<JoinHandle<io::Result<usize>>>,
    path: PathBuf,
}

impl BatchWriter {
    /// Start a writer thread appending to `path`.
    ///
    /// The file is created if absent. The worker writes `header` as the
    /// first line only if the file is empty when opened, so initializing
    /// twice against a fresh file still yields exactly one header.
    pub fn spawn(path: PathBuf, header: &'static str) -> Self {
        let (tx, rx) = sync_channel(FLUSH_QUEUE_DEPTH);
        let worker_path = path.clone();
        let worker = thread::spawn(move || write_batches(worker_path, header, rx));
        Self {
            tx: Some(tx),
            worker: Some(worker),
            path,
        }
    }

    /// Enqueue a batch for writing.
    ///
    /// Fails with the worker's error if the worker has already stopped.
    pub fn submit(&mut self, batch: Vec<String>) -> Result<(), SnapshotError> {
        let sent = match &self.tx {
            Some(tx) => tx.send(batch).is_ok(),
            None => false,
        };
        if sent { Ok(()) } else { Err(self.failure()) }
    }

    /// Close the queue, wait for all outstanding flushes, and return the
    /// number of rows written.
    pub fn finish(mut self) -> Result<usize, SnapshotError> {
        drop(self.tx.take());
        self.join()
    }

    /// Recover the error that stopped the worker.
    fn failure(&mut self) -> SnapshotError {
        drop(self.tx.take());
        match self.join() {
            Err(err) => err,
            // Worker exited cleanly yet refused a send: only reachable
            // through a panic that unwound past the receive loop.
            Ok(_) => SnapshotError::FlushWorker {
                path: self.path.clone(),
            },
        }
    }

    fn join(&mut self) -> Result<usize, SnapshotError> {
        match self.worker.take() {
            Some(worker) => match worker.join() {
                Ok(result) => result.map_err(SnapshotError::from),
                Err(_) => Err(SnapshotError::FlushWorker {
                    path: self.path.clone(),
                }),
            },
            None => Err(SnapshotError::FlushWorker {
                path: self.path.clone(),
            }),
        }
    }
}

/// Worker loop: drain batches in enqueue order, flushing after each.
fn write_batches(
    path: PathBuf,
    header: &str,
    rx: Receiver<Vec<String>>,
) -> io::Result<usize> {
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    let is_empty = file.metadata()?.len() == 0;
    let mut out = BufWriter::with_capacity(FLUSH_BUFFER_SIZE, file);
    if is_empty {
        out.write_all(header.as_bytes())?;
        out.write_all(b"\n")?;
    }

    let mut rows_written = 0usize;
    while let Ok(batch) = rx.recv() {
        for row in &batch {
            out.write_all(row.as_bytes())?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
        rows_written += batch.len();
        debug!("flushed {} rows to {}", batch.len(), path.display());
    }
    out.flush()?;
    Ok(rows_written)
}
