//! Series Store CLI
//!
//! Runs a single catalog request against a CSV data file and prints the JSON
//! response body.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- --data data/series.csv list 10
//! cargo run -- filter '{"rating": 18}'
//! cargo run -- update 3 '{"episodes": 12}'
//! ```
//!
//! # Environment Variables
//!
//! - `SERIES_DATA_PATH`: Data file used when `--data` is not given
//! - `RUST_LOG`: Set to `debug` or `info` to control logging verbosity

use series_store::config::{Command, DATA_PATH_ENV};
use series_store::{ApiResponse, Config, Result, SeriesApi, SeriesStore};
use std::env;
use std::io::{self, Write};
use std::process;
use std::sync::Arc;

fn main() {
    env_logger::init();

    match run() {
        Ok(response) if response.is_success() => {}
        Ok(_) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn run() -> Result<ApiResponse> {
    let config = Config::from_args(env::args().skip(1), env::var(DATA_PATH_ENV).ok())?;

    let store = SeriesStore::load(&config.data_path)?;
    let api = SeriesApi::new(Arc::new(store));

    let response = match &config.command {
        Command::List { limit } => api.list(*limit),
        Command::Get { id } => api.get(*id),
        Command::Filter { criteria } => api.filter(criteria),
        Command::Create { fields } => api.create(fields),
        Command::Update { id, fields } => api.update(*id, fields),
        Command::Delete { id } => api.delete(*id),
    };

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    serde_json::to_writer_pretty(&mut handle, &response.body)?;
    writeln!(handle)?;

    Ok(response)
}
