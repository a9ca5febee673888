//! Loads a dataset file the way the desktop upload does and dumps what it
//! parsed, optionally filtered through the row search.

use accident_intake_lib::search::{self, QueryKind};
use accident_intake_lib::{dataset, logging};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "dump_dataset", version, about = "Parse an accident dataset and print its records as JSON")]
struct Cli {
    /// CSV, TXT or XLSX file
    input: PathBuf,
    /// Only print records matching this search term
    #[arg(short, long)]
    query: Option<String>,
    #[arg(long)]
    pretty: bool,
    /// Debug-level logs on stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    logging::init(if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    });

    let store = match dataset::load_path(&cli.input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}: {}", cli.input.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let records = match cli.query.as_deref() {
        Some(q) => {
            if !search::is_searchable(q) {
                eprintln!("query \"{}\" is too short; {}", q, QueryKind::Empty.hint());
                return ExitCode::FAILURE;
            }
            eprintln!("{}", QueryKind::classify(q).hint());
            store.search(q)
        }
        None => store.records().to_vec(),
    };

    let out = if cli.pretty {
        serde_json::to_string_pretty(&records)
    } else {
        serde_json::to_string(&records)
    };
    match out {
        Ok(json) => {
            println!("{}", json);
            eprintln!("{} of {} records", records.len(), store.len());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("could not encode records: {}", e);
            ExitCode::FAILURE
        }
    }
}
