//! # snapshots-rs
//!
//! A decoder for fixed-width corporate-registry snapshot extracts.
//!
//! Bulk registry snapshots arrive as large fixed-width, position-addressed
//! text files: a header line carrying a magic identifier, body lines
//! holding company and person appointment records selected by a
//! discriminator byte, and a trailer line declaring the authoritative
//! record count. This library decodes such a stream into two normalized
//! CSV files, one per record kind, preserving input order and verifying
//! the decoded total against the trailer count.
//!
//! ## Overview
//!
//! Decoding a snapshot involves:
//! - **Positional fields**: every field lives at a fixed byte offset
//! - **Lenient numerics**: filler and garbage bytes inside numeric
//!   fields are skipped, not rejected
//! - **Batched output**: rows accumulate into 50,000-row batches flushed
//!   by a dedicated writer thread per output file
//! - **Integrity check**: the trailer's declared count must match the
//!   rows written, or the run fails
//!
//! ## Example
//!
//! ```
//! use snapshots_rs::decode_company;
//!
//! // Layout: Number(8) Kind(1) Status(1) ... Officers(4) NameLen(4) Name
//! let line = "SC1234561A                      00030012ACME WIDGETS";
//! assert_eq!(decode_company(line), "SC123456,A,3,ACME WIDGETS");
//! ```

pub mod error;
pub mod field;
pub mod flush;
pub mod record;
pub mod snapshot;

pub use error::SnapshotError;
pub use field::{decimal, escape, slice};
pub use flush::{BATCH_SIZE, BatchWriter};
pub use record::{COMPANIES_HEADER, PERSONS_HEADER, decode_company, decode_person};
pub use snapshot::{
    DecodeSummary, SNAPSHOT_HEADER_MAGIC, TRAILER_SENTINEL, decode_snapshot_file, decode_stream,
};
