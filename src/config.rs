//! Command-line and environment configuration.

use crate::error::{Result, StoreError};
use serde_json::Value;
use std::path::PathBuf;

/// Environment variable naming the backing CSV file.
pub const DATA_PATH_ENV: &str = "SERIES_DATA_PATH";

/// Backing file used when neither `--data` nor the environment names one.
pub const DEFAULT_DATA_PATH: &str = "data/series.csv";

/// A single request issued from the command line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    List { limit: i64 },
    Get { id: u64 },
    Filter { criteria: Value },
    Create { fields: Value },
    Update { id: u64, fields: Value },
    Delete { id: u64 },
}

/// Parsed invocation: where the data lives and what to do with it.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_path: PathBuf,
    pub command: Command,
}

impl Config {
    /// Parses arguments (without the program name).
    ///
    /// The data path is taken from `--data <path>`, then from
    /// `SERIES_DATA_PATH`, then [`DEFAULT_DATA_PATH`].
    pub fn from_args<I>(args: I, env_path: Option<String>) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut data_path = env_path.map(PathBuf::from);
        let mut positional = Vec::new();

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--data" | "-d" => {
                    let path = args.next().ok_or(StoreError::MissingArgument("data path"))?;
                    data_path = Some(PathBuf::from(path));
                }
                _ => positional.push(arg),
            }
        }

        let command = parse_command(&positional)?;
        Ok(Config {
            data_path: data_path.unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_PATH)),
            command,
        })
    }
}

fn parse_command(args: &[String]) -> Result<Command> {
    let (name, rest) = args
        .split_first()
        .ok_or(StoreError::MissingArgument("command"))?;

    let command = match name.as_str() {
        "list" => Command::List {
            limit: parse_number(arg(rest, 0, "limit")?)?,
        },
        "get" => Command::Get {
            id: parse_number(arg(rest, 0, "id")?)?,
        },
        "filter" => Command::Filter {
            criteria: serde_json::from_str(arg(rest, 0, "filter JSON")?)?,
        },
        "create" => Command::Create {
            fields: serde_json::from_str(arg(rest, 0, "fields JSON")?)?,
        },
        "update" => Command::Update {
            id: parse_number(arg(rest, 0, "id")?)?,
            fields: serde_json::from_str(arg(rest, 1, "fields JSON")?)?,
        },
        "delete" => Command::Delete {
            id: parse_number(arg(rest, 0, "id")?)?,
        },
        other => {
            return Err(StoreError::InvalidArgument {
                value: other.to_string(),
                message: "expected one of list, get, filter, create, update, delete".to_string(),
            })
        }
    };

    Ok(command)
}

fn arg<'a>(args: &'a [String], index: usize, name: &'static str) -> Result<&'a str> {
    args.get(index)
        .map(String::as_str)
        .ok_or(StoreError::MissingArgument(name))
}

fn parse_number<T: std::str::FromStr>(value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| StoreError::InvalidArgument {
        value: value.to_string(),
        message: "expected an integer".to_string(),
    })
}
