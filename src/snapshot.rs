//! Snapshot stream decoding.
//!
//! A snapshot stream has three sections:
//!
//! ```text
//! DDDDSNAP0123 20240101...      header: magic, run number, production date
//! AB1234561...                  body:   discriminator '1' = company record
//! AB1234562...                  body:   discriminator '2' = person record
//! 9999999900000002              trailer: sentinel, declared record count
//! ```
//!
//! [`decode_stream`] walks the stream line by line, routing each body
//! line to its record decoder and accumulating rows into per-kind
//! batches that are flushed off the decoding path. The trailer's
//! declared count is the end-to-end integrity check: it must equal the
//! number of rows written or the whole run fails.

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::mem;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::SnapshotError;
use crate::field::{decimal, slice};
use crate::flush::{BATCH_SIZE, BatchWriter};
use crate::record::{COMPANIES_HEADER, PERSONS_HEADER, decode_company, decode_person};

/// Magic identifier opening a snapshot header line.
pub const SNAPSHOT_HEADER_MAGIC: &str = "DDDDSNAP";

/// Sentinel opening the trailer line.
pub const TRAILER_SENTINEL: &str = "99999999";

/// Discriminator byte of a company record.
const COMPANY_RECORD_TYPE: u8 = b'1';

/// Discriminator byte of a person record.
const PERSON_RECORD_TYPE: u8 = b'2';

/// Input read buffer size. Snapshot extracts run to gigabytes.
const READ_BUFFER_SIZE: usize = 16 * 1024 * 1024;

/// Outcome of a successful decode run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeSummary {
    /// Company rows written.
    pub companies: usize,
    /// Person rows written.
    pub persons: usize,
    /// Body lines dropped as noise (too short or unknown discriminator).
    pub skipped: usize,
    /// Record count declared by the trailer.
    pub declared: usize,
}

impl DecodeSummary {
    /// Total records written across both output files.
    pub fn total(&self) -> usize {
        self.companies + self.persons
    }
}

/// One record kind's active batch and its writer.
///
/// The classifier owns exactly one `RecordSink` per record kind; a full
/// batch moves into the writer's queue by value and a fresh batch takes
/// its place, so decoding never waits on file I/O.
struct RecordSink {
    batch: Vec<String>,
    writer: BatchWriter,
}

impl RecordSink {
    fn new(writer: BatchWriter) -> Self {
        Self {
            batch: Vec::with_capacity(BATCH_SIZE),
            writer,
        }
    }

    fn push(&mut self, row: String) -> Result<(), SnapshotError> {
        self.batch.push(row);
        if self.batch.len() >= BATCH_SIZE {
            let full = mem::replace(&mut self.batch, Vec::with_capacity(BATCH_SIZE));
            self.writer.submit(full)?;
        }
        Ok(())
    }

    /// Flush the trailing partial batch and wait for every outstanding
    /// write. Returns the rows actually written to the file.
    fn finish(mut self) -> Result<usize, SnapshotError> {
        if !self.batch.is_empty() {
            let rest = mem::take(&mut self.batch);
            self.writer.submit(rest)?;
        }
        self.writer.finish()
    }
}

/// Validate the header line and extract its run number and production
/// date (opaque strings, reported for observability only).
fn parse_header(line: &str) -> Result<(&str, &str), SnapshotError> {
    if !line.starts_with(SNAPSHOT_HEADER_MAGIC) {
        return Err(SnapshotError::UnsupportedHeader(
            slice(line, 0, 8).to_string(),
        ));
    }
    Ok((slice(line, 8, 12), slice(line, 12, 20)))
}

/// Decode a snapshot stream into the two writers.
///
/// The first line must be a valid header; body lines are routed by
/// discriminator until the trailer line, after which nothing more is
/// read. Reaching end of input without a trailer is fatal, as is a
/// mismatch between the trailer's declared count and the rows written.
pub fn decode_stream<R: BufRead>(
    input: R,
    companies: BatchWriter,
    persons: BatchWriter,
) -> Result<DecodeSummary, SnapshotError> {
    let mut lines = input.lines();

    let header = match lines.next() {
        Some(line) => line?,
        None => return Err(SnapshotError::MissingTrailer),
    };
    let (run_number, production_date) = parse_header(&header)?;
    info!("processing snapshot run {run_number} from date {production_date}");

    let mut companies = RecordSink::new(companies);
    let mut persons = RecordSink::new(persons);
    let mut skipped = 0usize;

    for line in lines {
        let line = line?;

        if line.starts_with(TRAILER_SENTINEL) {
            let declared = decimal(slice(&line, 8, 16));
            let companies_written = companies.finish()?;
            let persons_written = persons.finish()?;

            let decoded = companies_written + persons_written;
            if decoded != declared {
                return Err(SnapshotError::CountMismatch { declared, decoded });
            }
            if skipped > 0 {
                debug!("dropped {skipped} unrecognized body lines");
            }
            return Ok(DecodeSummary {
                companies: companies_written,
                persons: persons_written,
                skipped,
                declared,
            });
        }

        if line.len() > 8 {
            match line.as_bytes()[8] {
                COMPANY_RECORD_TYPE => companies.push(decode_company(&line))?,
                PERSON_RECORD_TYPE => persons.push(decode_person(&line))?,
                _ => skipped += 1,
            }
        } else {
            skipped += 1;
        }
    }

    Err(SnapshotError::MissingTrailer)
}

/// Derive the two output file paths from the input file's base name.
fn output_paths(input: &Path, output_dir: &Path) -> (PathBuf, PathBuf) {
    let base = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    (
        output_dir.join(format!("companies_data_{base}.csv")),
        output_dir.join(format!("persons_data_{base}.csv")),
    )
}

/// Decode a snapshot file into `<output_dir>/companies_data_<base>.csv`
/// and `<output_dir>/persons_data_<base>.csv`.
///
/// The output directory is created if absent and both output files are
/// reset, so a rerun replaces a previous run's artifacts.
pub fn decode_snapshot_file(
    input: &Path,
    output_dir: &Path,
) -> Result<DecodeSummary, SnapshotError> {
    fs::create_dir_all(output_dir)?;
    let (companies_path, persons_path) = output_paths(input, output_dir);
    info!("saving companies data to {}", companies_path.display());
    info!("saving persons data to {}", persons_path.display());
    fs::write(&companies_path, "")?;
    fs::write(&persons_path, "")?;

    let reader = BufReader::with_capacity(READ_BUFFER_SIZE, File::open(input)?);
    decode_stream(
        reader,
        BatchWriter::spawn(companies_path, COMPANIES_HEADER),
        BatchWriter::spawn(persons_path, PERSONS_HEADER),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Cursor;
    use tempfile::tempdir;

    const HEADER: &str = "DDDDSNAP012320240101";

    fn company(number: &str, name: &str) -> String {
        format!(
            "{number}1A{:22}0001{:04}{name}",
            "",
            name.len(),
        )
    }

    fn person(number: &str, block: &str) -> String {
        let mut line = format!("{number}2.01000000000001N202301010000000.EC1A 1BB");
        while line.len() < 65 {
            line.push(' ');
        }
        line.push_str(&format!("{:04}{block}", block.len()));
        line
    }

    fn trailer(count: usize) -> String {
        format!("{TRAILER_SENTINEL}{count:08}")
    }

    fn stream(lines: &[String]) -> Cursor<String> {
        Cursor::new(lines.join("\n"))
    }

    fn writers(dir: &Path) -> (BatchWriter, BatchWriter, PathBuf, PathBuf) {
        let companies_path = dir.join("companies.csv");
        let persons_path = dir.join("persons.csv");
        (
            BatchWriter::spawn(companies_path.clone(), COMPANIES_HEADER),
            BatchWriter::spawn(persons_path.clone(), PERSONS_HEADER),
            companies_path,
            persons_path,
        )
    }

    #[test]
    fn test_end_to_end_two_records() {
        let dir = tempdir().unwrap();
        let (companies, persons, companies_path, persons_path) = writers(dir.path());

        let input = stream(&[
            HEADER.to_string(),
            company("AB123456", "ACME LTD"),
            person("AB123456", "MR<JOHN<SMITH"),
            trailer(2),
        ]);
        let summary = decode_stream(input, companies, persons).unwrap();

        assert_eq!(summary.companies, 1);
        assert_eq!(summary.persons, 1);
        assert_eq!(summary.total(), 2);
        assert_eq!(summary.declared, 2);

        let companies_csv = fs::read_to_string(&companies_path).unwrap();
        let mut lines = companies_csv.lines();
        assert_eq!(lines.next(), Some(COMPANIES_HEADER));
        assert_eq!(lines.next(), Some("AB123456,A,1,ACME LTD"));
        assert_eq!(lines.next(), None);

        let persons_csv = fs::read_to_string(&persons_path).unwrap();
        let mut lines = persons_csv.lines();
        assert_eq!(lines.next(), Some(PERSONS_HEADER));
        let row = lines.next().unwrap();
        assert!(row.starts_with("AB123456,"));
        assert_eq!(row.split(',').count(), 24);
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_count_mismatch_is_fatal() {
        let dir = tempdir().unwrap();
        let (companies, persons, _, _) = writers(dir.path());

        let input = stream(&[
            HEADER.to_string(),
            company("AB123456", "ACME LTD"),
            person("AB123456", "MR<JOHN<SMITH"),
            trailer(3),
        ]);
        let result = decode_stream(input, companies, persons);

        match result {
            Err(SnapshotError::CountMismatch { declared, decoded }) => {
                assert_eq!(declared, 3);
                assert_eq!(decoded, 2);
            }
            other => panic!("expected CountMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_trailer_is_fatal() {
        let dir = tempdir().unwrap();
        let (companies, persons, _, _) = writers(dir.path());

        let input = stream(&[HEADER.to_string(), company("AB123456", "ACME LTD")]);
        let result = decode_stream(input, companies, persons);
        assert!(matches!(result, Err(SnapshotError::MissingTrailer)));
    }

    #[test]
    fn test_empty_input_is_missing_trailer() {
        let dir = tempdir().unwrap();
        let (companies, persons, _, _) = writers(dir.path());

        let result = decode_stream(Cursor::new(String::new()), companies, persons);
        assert!(matches!(result, Err(SnapshotError::MissingTrailer)));
    }

    #[test]
    fn test_bad_header_is_fatal() {
        let dir = tempdir().unwrap();
        let (companies, persons, _, _) = writers(dir.path());

        let input = stream(&["XXXXSNAP012320240101".to_string(), trailer(0)]);
        let result = decode_stream(input, companies, persons);

        match result {
            Err(SnapshotError::UnsupportedHeader(prefix)) => assert_eq!(prefix, "XXXXSNAP"),
            other => panic!("expected UnsupportedHeader, got {other:?}"),
        }
    }

    #[test]
    fn test_noise_lines_skipped_without_count_impact() {
        let dir = tempdir().unwrap();
        let (companies, persons, _, _) = writers(dir.path());

        let input = stream(&[
            HEADER.to_string(),
            "short".to_string(),
            company("AB123456", "ACME LTD"),
            "AB1234569unknown discriminator".to_string(),
            trailer(1),
        ]);
        let summary = decode_stream(input, companies, persons).unwrap();

        assert_eq!(summary.companies, 1);
        assert_eq!(summary.persons, 0);
        assert_eq!(summary.skipped, 2);
    }

    #[test]
    fn test_no_body_lines_after_trailer() {
        let dir = tempdir().unwrap();
        let (companies, persons, companies_path, _) = writers(dir.path());

        let input = stream(&[
            HEADER.to_string(),
            company("AB123456", "ACME LTD"),
            trailer(1),
            company("ZZ999999", "IGNORED LTD"),
        ]);
        let summary = decode_stream(input, companies, persons).unwrap();

        assert_eq!(summary.companies, 1);
        let csv = fs::read_to_string(&companies_path).unwrap();
        assert!(!csv.contains("ZZ999999"));
    }

    #[test]
    fn test_rows_cross_batches_in_input_order() {
        let dir = tempdir().unwrap();
        let (companies, persons, companies_path, _) = writers(dir.path());

        let total = BATCH_SIZE * 2 + 3;
        let mut lines = vec![HEADER.to_string()];
        for i in 0..total {
            lines.push(company(&format!("{i:08}"), "ACME LTD"));
        }
        lines.push(trailer(total));

        let summary = decode_stream(stream(&lines), companies, persons).unwrap();
        assert_eq!(summary.companies, total);

        let csv = fs::read_to_string(&companies_path).unwrap();
        let mut rows = csv.lines().skip(1);
        for i in 0..total {
            let row = rows.next().unwrap();
            assert!(row.starts_with(&format!("{i:08},")), "row {i} out of order");
        }
        assert_eq!(rows.next(), None);
    }

    #[test]
    fn test_decode_snapshot_file_derives_names_and_reruns_clean() {
        let dir = tempdir().unwrap();
        let input_path = dir.path().join("snapshot_0123.dat");
        let output_dir = dir.path().join("out");

        let lines = [
            HEADER.to_string(),
            company("AB123456", "ACME LTD"),
            person("AB123456", "MR<JOHN<SMITH"),
            trailer(2),
        ];
        fs::write(&input_path, lines.join("\n")).unwrap();

        let summary = decode_snapshot_file(&input_path, &output_dir).unwrap();
        assert_eq!(summary.total(), 2);

        let companies_path = output_dir.join("companies_data_snapshot_0123.csv");
        let persons_path = output_dir.join("persons_data_snapshot_0123.csv");
        let first = fs::read_to_string(&companies_path).unwrap();
        assert!(persons_path.exists());

        // A rerun replaces, not appends
        let summary = decode_snapshot_file(&input_path, &output_dir).unwrap();
        assert_eq!(summary.total(), 2);
        assert_eq!(fs::read_to_string(&companies_path).unwrap(), first);
        assert_eq!(first.lines().count(), 2);
    }

    #[test]
    fn test_decode_snapshot_file_missing_input() {
        let dir = tempdir().unwrap();
        let result = decode_snapshot_file(&dir.path().join("absent.dat"), dir.path());
        assert!(matches!(result, Err(SnapshotError::Io(_))));
    }

    #[test]
    fn test_parse_header_extracts_run_and_date() {
        let (run, date) = parse_header(HEADER).unwrap();
        assert_eq!(run, "0123");
        assert_eq!(date, "20240101");
    }
}
