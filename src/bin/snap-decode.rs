//! CLI tool to decode a registry snapshot file into CSV outputs.

use clap::Parser;
use env_logger::Env;
use snapshots_rs::decode_snapshot_file;
use std::path::PathBuf;
use std::process;

/// Decode a fixed-width registry snapshot into per-kind CSV files.
///
/// Writes companies_data_<basename>.csv and persons_data_<basename>.csv
/// into the output directory, creating it if needed.
#[derive(Parser)]
#[command(name = "snap-decode")]
struct Cli {
    /// Snapshot input file (fixed-width records)
    input: PathBuf,

    /// Directory for the CSV output files
    output_dir: PathBuf,
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match decode_snapshot_file(&cli.input, &cli.output_dir) {
        Ok(summary) => {
            println!(
                "Processed {} records: {} companies, {} persons.",
                summary.total(),
                summary.companies,
                summary.persons
            );
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
