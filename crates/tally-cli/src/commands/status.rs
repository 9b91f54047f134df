//! Status and statistics commands

use std::path::Path;

use anyhow::Result;

use super::open_db;

pub fn cmd_status(db_path: &Path) -> Result<()> {
    use std::fs;

    println!();
    println!("📊 Tally Status");
    println!("   ─────────────────────────────────────────────────────────────");
    println!("   Database: {}", db_path.display());

    // Check if database file exists and get size
    if db_path.exists() {
        if let Ok(metadata) = fs::metadata(db_path) {
            let size_kb = metadata.len() as f64 / 1024.0;
            if size_kb < 1024.0 {
                println!("   Size: {:.1} KB", size_kb);
            } else {
                println!("   Size: {:.1} MB", size_kb / 1024.0);
            }
        }
    } else {
        println!("   Size: (database not initialized)");
    }

    if db_path.exists() {
        match open_db(db_path) {
            Ok(db) => {
                if let Ok(stats) = db.get_detailed_stats() {
                    println!();
                    println!("   Transactions: {}", stats.total_transactions);
                    println!("   Segments: {}", stats.total_segments);
                    for p in &stats.providers {
                        println!(
                            "     {} — {} transactions, {} segments, {} indexed months",
                            p.provider, p.transaction_count, p.segment_count, p.monthly_entries
                        );
                    }
                }
            }
            Err(e) => {
                println!();
                println!("   ❌ Error opening database: {}", e);
            }
        }
    }

    println!();
    Ok(())
}

pub fn cmd_stats(db_path: &Path, json: bool) -> Result<()> {
    let db = open_db(db_path)?;
    let stats = db.get_detailed_stats()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!();
    println!("📈 Cache Statistics");
    println!("   ─────────────────────────────────────────────────────────────");
    for p in &stats.providers {
        println!("   {}", p.provider);
        println!("     Transactions: {}", p.transaction_count);
        println!("     Segments: {}", p.segment_count);
        println!("     Indexed months: {}", p.monthly_entries);
        match (p.earliest, p.latest) {
            (Some(min), Some(max)) => println!("     Date range: {} → {}", min, max),
            _ => println!("     Date range: (empty)"),
        }
        println!();
    }
    println!(
        "   Total: {} transactions across {} segments",
        stats.total_transactions, stats.total_segments
    );
    println!();

    Ok(())
}
