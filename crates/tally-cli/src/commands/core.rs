//! Core commands (init) and shared utilities

use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;

use tally_core::{Database, DateRange, Provider};

/// Open the database at the given path
pub fn open_db(db_path: &Path) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path is not valid UTF-8")?;
    Database::new(path_str).with_context(|| format!("Failed to open {}", db_path.display()))
}

/// Parse a provider name from the command line
pub fn parse_provider(s: &str) -> Result<Provider> {
    s.parse::<Provider>()
        .map_err(|e| anyhow::anyhow!("{} (expected books or payments)", e))
}

/// Parse a YYYY-MM-DD date from the command line
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}' (use YYYY-MM-DD)", s))
}

/// Parse an inclusive date range from the command line
pub fn parse_range(from: &str, to: &str) -> Result<DateRange> {
    let start = parse_date(from)?;
    let end = parse_date(to)?;
    DateRange::new(start, end).map_err(Into::into)
}

pub fn cmd_init(db_path: &Path) -> Result<()> {
    let db = open_db(db_path)?;
    println!("✅ Database initialized at {}", db.path());
    Ok(())
}
