//! Cache maintenance commands (verify, repair, diagnose, sync, clear, segments)

use std::path::Path;

use anyhow::Result;

use super::{open_db, parse_provider, parse_range};

pub fn cmd_cache_verify(
    db_path: &Path,
    provider: &str,
    from: &str,
    to: &str,
    json: bool,
) -> Result<()> {
    let db = open_db(db_path)?;
    let provider = parse_provider(provider)?;
    let range = parse_range(from, to)?;

    let report = db.verify_cache_integrity(provider, range)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    if report.is_consistent {
        println!("✅ {} {} looks consistent", provider, range);
    } else {
        println!("⚠️  {} {} is inconsistent", provider, range);
    }
    println!("   Segments intersecting range: {}", report.segment_count);
    println!("   Transactions in range: {}", report.transaction_count);
    if !report.is_consistent {
        println!();
        println!("   Run 'tally cache repair' to rebuild coverage from stored rows.");
    }
    println!();
    Ok(())
}

pub fn cmd_cache_repair(db_path: &Path, provider: &str, from: &str, to: &str) -> Result<()> {
    let db = open_db(db_path)?;
    let provider = parse_provider(provider)?;
    let range = parse_range(from, to)?;

    db.repair_cache_segments(provider, range)?;
    let coverage = db.coverage(provider)?;

    println!("✅ Rebuilt segment coverage for {} {}", provider, range);
    if coverage.is_empty() {
        println!("   No rows in range; all claims cleared.");
    } else {
        for c in coverage {
            println!("   {}", c);
        }
    }
    Ok(())
}

pub fn cmd_cache_diagnose(db_path: &Path, json: bool) -> Result<()> {
    let db = open_db(db_path)?;
    let report = db.diagnose_missing_entries()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    if report.total_missing == 0 && report.stale_entries.is_empty() {
        println!("✅ Monthly cache index matches the transaction store.");
        println!();
        return Ok(());
    }

    println!("⚠️  Monthly cache index drift");
    println!("   ─────────────────────────────────────────────────────────────");
    for m in &report.missing_entries {
        println!(
            "   missing  {} {}-{:02} ({} transactions)",
            m.provider, m.year, m.month, m.transaction_count
        );
    }
    for m in &report.stale_entries {
        println!(
            "   stale    {} {}-{:02} (now {} transactions)",
            m.provider, m.year, m.month, m.transaction_count
        );
    }
    for e in &report.errors {
        println!("   error    {}", e);
    }
    println!();
    println!("   Run 'tally cache sync' to reconcile. Nothing was modified.");
    println!();
    Ok(())
}

pub fn cmd_cache_sync(db_path: &Path) -> Result<()> {
    let db = open_db(db_path)?;
    let report = db.sync_all_missing_entries()?;

    println!("✅ Monthly index sync complete: {} entries updated", report.synced);
    for e in &report.errors {
        println!("   ⚠️  {}", e);
    }
    Ok(())
}

pub fn cmd_cache_clear(
    db_path: &Path,
    provider: Option<&str>,
    from: Option<&str>,
    to: Option<&str>,
    yes: bool,
) -> Result<()> {
    use std::io::{self, Write};

    let db = open_db(db_path)?;
    let provider = provider.map(parse_provider).transpose()?;
    let range = match (from, to) {
        (Some(f), Some(t)) => Some(parse_range(f, t)?),
        _ => None,
    };

    if !yes {
        let scope = match (provider, range) {
            (Some(p), Some(r)) => format!("{} transactions in {}", p, r),
            (Some(p), None) => format!("ALL {} transactions", p),
            (None, Some(r)) => format!("all providers' transactions in {}", r),
            (None, None) => "ALL cached transactions".to_string(),
        };
        print!("⚠️  This will delete {} and their coverage claims.\n", scope);
        print!("   The monthly index is left as-is; run 'tally cache sync' after.\n\n");
        print!("Are you sure? [y/N] ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let report = db.clear_cache(provider, range)?;
    println!(
        "✅ Cleared {} transactions and {} segments.",
        report.transactions_deleted, report.segments_cleared
    );
    Ok(())
}

pub fn cmd_cache_segments(db_path: &Path, provider: &str) -> Result<()> {
    let db = open_db(db_path)?;
    let provider = parse_provider(provider)?;
    let segments = db.list_segments(provider)?;

    if segments.is_empty() {
        println!("No cache segments recorded for {}.", provider);
        return Ok(());
    }

    println!();
    println!("📦 Cache segments — {}", provider);
    println!("   ─────────────────────────────");
    for s in &segments {
        println!("   {}..{}", s.start_date, s.end_date);
    }
    println!();
    Ok(())
}
