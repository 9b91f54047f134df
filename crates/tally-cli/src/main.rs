//! Tally CLI - Transaction cache admin tool
//!
//! Usage:
//!   tally init                         Initialize database
//!   tally plan -p books --from ... --to ...
//!                                      Check cache coverage for a range
//!   tally cache diagnose               Scan for index drift (read-only)
//!   tally cache sync                   Reconcile the monthly index

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db),
        Commands::Status => commands::cmd_status(&cli.db),
        Commands::Stats { json } => commands::cmd_stats(&cli.db, json),
        Commands::Plan { provider, from, to } => {
            commands::cmd_plan(&cli.db, &provider, &from, &to)
        }
        Commands::Transactions {
            provider,
            from,
            to,
            limit,
        } => commands::cmd_transactions_list(&cli.db, &provider, &from, &to, limit),
        Commands::Cache { action } => match action {
            CacheAction::Verify {
                provider,
                from,
                to,
                json,
            } => commands::cmd_cache_verify(&cli.db, &provider, &from, &to, json),
            CacheAction::Repair { provider, from, to } => {
                commands::cmd_cache_repair(&cli.db, &provider, &from, &to)
            }
            CacheAction::Diagnose { json } => commands::cmd_cache_diagnose(&cli.db, json),
            CacheAction::Sync => commands::cmd_cache_sync(&cli.db),
            CacheAction::Clear {
                provider,
                from,
                to,
                yes,
            } => commands::cmd_cache_clear(
                &cli.db,
                provider.as_deref(),
                from.as_deref(),
                to.as_deref(),
                yes,
            ),
            CacheAction::Segments { provider } => {
                commands::cmd_cache_segments(&cli.db, &provider)
            }
        },
    }
}
