use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use serde::Deserialize;

use crate::domain::location::Location;
use crate::domain::model::{Credentials, DateRange};
use crate::utils::error::{KartenError, Result};

#[derive(Debug, Parser)]
#[command(name = "kartenservice", version)]
#[command(about = "Query balance and transactions of a canteen card (TL1 KartenService portals)")]
pub struct Cli {
    /// Institution, e.g. "Dresden" (see --help for the supported set)
    #[arg(long, short = 'l')]
    pub location: Option<String>,

    /// Number of the payment card (doubles as the user id)
    #[arg(long, short = 'n')]
    pub card_number: Option<String>,

    /// Password belonging to the card. Prefer --config over putting this
    /// in your shell history.
    #[arg(long, short = 'p')]
    pub password: Option<String>,

    /// TOML file with `location`, `card_number` and `password`; flags win
    /// over file values
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Timeout per HTTP call, in seconds
    #[arg(long, default_value = "15")]
    pub timeout: u64,

    /// Enable verbose output
    #[arg(long, short = 'v')]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the current balance and card status
    Balance,
    /// List transactions, newest first
    Transactions {
        /// Start date, dd.mm.yyyy (default: the portal's retention window)
        #[arg(long, value_parser = parse_cli_date)]
        from: Option<NaiveDate>,
        /// End date, dd.mm.yyyy (default: today)
        #[arg(long, value_parser = parse_cli_date)]
        to: Option<NaiveDate>,
        /// Write the transactions to this CSV file instead of stdout
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// List the line items behind the transactions
    Positions {
        #[arg(long, value_parser = parse_cli_date)]
        from: Option<NaiveDate>,
        #[arg(long, value_parser = parse_cli_date)]
        to: Option<NaiveDate>,
    },
    /// Dump the portal's UI text resources
    Texts {
        #[arg(long, default_value = "de")]
        lang: String,
    },
}

/// Connection values from a `--config` TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub location: Option<String>,
    pub card_number: Option<String>,
    pub password: Option<String>,
}

impl FileConfig {
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw)
            .map_err(|e| KartenError::config(format!("{}: {e}", path.display())))
    }
}

impl Cli {
    /// Merge flags over the optional config file into the connection
    /// parameters. Flags win; anything still missing is a config error.
    pub fn resolve_connection(&self) -> Result<(Location, Credentials)> {
        let file = match &self.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        let location = self
            .location
            .as_deref()
            .or(file.location.as_deref())
            .ok_or_else(|| KartenError::config("no location given (flag --location or config file)"))?
            .parse::<Location>()?;
        let card_number = self
            .card_number
            .clone()
            .or(file.card_number)
            .ok_or_else(|| KartenError::config("no card number given"))?;
        let password = self
            .password
            .clone()
            .or(file.password)
            .ok_or_else(|| KartenError::config("no password given"))?;
        Ok((location, Credentials::new(card_number, password)))
    }
}

/// Turn `--from`/`--to` into the range passed to the portal. An open end
/// means today; a `--to` without `--from` is ambiguous and rejected.
pub fn date_range(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<Option<DateRange>> {
    match (from, to) {
        (None, None) => Ok(None),
        (Some(from), to) => {
            let to = to.unwrap_or_else(|| Local::now().date_naive());
            if from > to {
                return Err(KartenError::config(format!(
                    "--from {from} lies after --to {to}"
                )));
            }
            Ok(Some(DateRange::new(from, to)))
        }
        (None, Some(_)) => Err(KartenError::config("--to given without --from")),
    }
}

fn parse_cli_date(raw: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%d.%m.%Y")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .map_err(|_| format!("{raw:?} is not a date (expected dd.mm.yyyy)"))
}
