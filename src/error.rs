//! Error type for snapshot decoding.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal conditions a decode run can end with.
///
/// Tolerated anomalies (garbage bytes in numeric fields, short lines,
/// unknown discriminators) never reach this type; they are normalized
/// away during decoding.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The first line did not carry the snapshot header magic.
    #[error("unsupported file type from header: '{0}'")]
    UnsupportedHeader(String),

    /// The stream ended without a trailer line.
    #[error("no trailer record found")]
    MissingTrailer,

    /// Decoded record total disagrees with the trailer's declared count.
    #[error("record count mismatch: trailer declared {declared}, decoded {decoded}")]
    CountMismatch { declared: usize, decoded: usize },

    /// A flush worker thread died without reporting an I/O error.
    #[error("flush worker for '{}' terminated unexpectedly", .path.display())]
    FlushWorker { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
