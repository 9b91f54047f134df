//! Transaction commands (plan, list)

use std::path::Path;

use anyhow::Result;

use tally_core::CacheVerdict;

use super::{open_db, parse_provider, parse_range, truncate};

pub fn cmd_plan(db_path: &Path, provider: &str, from: &str, to: &str) -> Result<()> {
    let db = open_db(db_path)?;
    let provider = parse_provider(provider)?;
    let range = parse_range(from, to)?;

    let plan = db.plan_query(provider, range)?;

    println!();
    match plan.status {
        CacheVerdict::FullHit => println!("✅ {} {} — full hit", provider, range),
        CacheVerdict::PartialHit => println!("🔶 {} {} — partial hit", provider, range),
        CacheVerdict::Miss => println!("❌ {} {} — miss", provider, range),
    }
    if !plan.cached_ranges.is_empty() {
        println!("   Cached:");
        for r in &plan.cached_ranges {
            println!("     {}", r);
        }
    }
    if !plan.missing_ranges.is_empty() {
        println!("   Missing (must be fetched):");
        for r in &plan.missing_ranges {
            println!("     {}", r);
        }
    }
    println!();
    Ok(())
}

pub fn cmd_transactions_list(
    db_path: &Path,
    provider: &str,
    from: &str,
    to: &str,
    limit: usize,
) -> Result<()> {
    let db = open_db(db_path)?;
    let provider = parse_provider(provider)?;
    let range = parse_range(from, to)?;

    let transactions = db.read_transactions(provider, range)?;

    if transactions.is_empty() {
        println!("No cached transactions for {} in {}.", provider, range);
        return Ok(());
    }

    println!();
    println!("💳 Transactions — {} {}", provider, range);
    println!("   ─────────────────────────────────────────────────────────────");
    for t in transactions.iter().take(limit) {
        let category = t.category.as_deref().unwrap_or("-");
        println!(
            "   {}  {:>10.2}  {:<8}  {:<20}  {}",
            t.date,
            t.amount,
            t.kind,
            truncate(category, 20),
            truncate(t.description.as_deref().unwrap_or(""), 30),
        );
    }
    if transactions.len() > limit {
        println!("   ... and {} more", transactions.len() - limit);
    }
    println!();
    Ok(())
}
