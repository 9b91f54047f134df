//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI
//! arguments. The actual command implementations are in the `commands`
//! module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Tally - Transaction cache for financial dashboards
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Cache admin tool for provider transaction data", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "tally.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Show database status and cache counters
    Status,

    /// Show detailed per-provider cache statistics
    Stats {
        /// Emit the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Plan a query: is this range cached, and what is missing?
    Plan {
        /// Provider: books or payments
        #[arg(short, long)]
        provider: String,

        /// Range start (YYYY-MM-DD)
        #[arg(long)]
        from: String,

        /// Range end (YYYY-MM-DD)
        #[arg(long)]
        to: String,
    },

    /// List cached transactions in a range
    Transactions {
        /// Provider: books or payments
        #[arg(short, long)]
        provider: String,

        /// Range start (YYYY-MM-DD)
        #[arg(long)]
        from: String,

        /// Range end (YYYY-MM-DD)
        #[arg(long)]
        to: String,

        /// Maximum rows to print
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// Cache maintenance (verify, repair, diagnose, sync, clear, segments)
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// Compare segment claims against actual rows in a range
    Verify {
        /// Provider: books or payments
        #[arg(short, long)]
        provider: String,

        /// Range start (YYYY-MM-DD)
        #[arg(long)]
        from: String,

        /// Range end (YYYY-MM-DD)
        #[arg(long)]
        to: String,

        /// Emit the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Rewrite segment coverage in a range from the rows actually present
    Repair {
        /// Provider: books or payments
        #[arg(short, long)]
        provider: String,

        /// Range start (YYYY-MM-DD)
        #[arg(long)]
        from: String,

        /// Range end (YYYY-MM-DD)
        #[arg(long)]
        to: String,
    },

    /// Read-only scan for monthly index drift (writes nothing)
    Diagnose {
        /// Emit the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Reconcile the monthly index against stored rows
    Sync,

    /// Delete cached rows and segment claims
    Clear {
        /// Provider: books or payments (all providers when omitted)
        #[arg(short, long)]
        provider: Option<String>,

        /// Range start (YYYY-MM-DD); clears everything when omitted
        #[arg(long, requires = "to")]
        from: Option<String>,

        /// Range end (YYYY-MM-DD)
        #[arg(long, requires = "from")]
        to: Option<String>,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// List stored cache segments for a provider
    Segments {
        /// Provider: books or payments
        #[arg(short, long)]
        provider: String,
    },
}
