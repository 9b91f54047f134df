//! Cache admin and integrity operations
//!
//! The segment store and the monthly index are both derived views over the
//! transaction rows, maintained independently, so they can drift from the
//! rows and from each other. Drift is an expected transient condition:
//! these operations detect it (as data, never as errors) and repair it on
//! request. `diagnose_missing_entries` is strictly read-only so it can run
//! in deployments where sync operations are opt-in.

use serde::Serialize;
use tracing::{info, warn};

use super::Database;
use crate::error::Result;
use crate::models::{DateRange, Provider};

/// Drift check result for one provider and range
#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    pub provider: Provider,
    pub range: DateRange,
    /// Heuristic: segments and rows agree on whether the range holds data
    pub is_consistent: bool,
    /// Stored segments intersecting the range
    pub segment_count: i64,
    /// Actual rows in the range
    pub transaction_count: i64,
}

/// A month present in the transaction store but unindexed (or stale)
#[derive(Debug, Clone, Serialize)]
pub struct MissingMonth {
    pub provider: Provider,
    pub year: i32,
    pub month: u32,
    /// Actual row count in the transaction store
    pub transaction_count: i64,
}

/// Read-only index drift scan result
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiagnoseReport {
    /// Months with rows but no index entry
    pub missing_entries: Vec<MissingMonth>,
    pub total_missing: usize,
    /// Indexed months whose stored count no longer matches the rows
    pub stale_entries: Vec<MissingMonth>,
    pub errors: Vec<String>,
}

/// Result of a cache clear
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClearReport {
    pub transactions_deleted: usize,
    pub segments_cleared: usize,
}

/// Per-provider cache counters for reporting
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStats {
    pub provider: Provider,
    pub transaction_count: i64,
    pub segment_count: i64,
    pub monthly_entries: i64,
    pub earliest: Option<chrono::NaiveDate>,
    pub latest: Option<chrono::NaiveDate>,
}

/// Aggregate cache statistics across all providers
#[derive(Debug, Clone, Serialize)]
pub struct DetailedStats {
    pub providers: Vec<ProviderStats>,
    pub total_transactions: i64,
    pub total_segments: i64,
}

impl Database {
    /// Compare segment claims against actual rows for a range
    ///
    /// Flags drift for follow-up; it cannot prove correctness. Both-empty
    /// and both-populated are treated as consistent; a claim without rows
    /// (or rows without a claim) is not.
    pub fn verify_cache_integrity(
        &self,
        provider: Provider,
        range: DateRange,
    ) -> Result<IntegrityReport> {
        let segment_count = self.count_segments_intersecting(provider, range)?;
        let transaction_count = self.count_transactions_in_range(provider, range)?;

        let is_consistent = (segment_count == 0) == (transaction_count == 0);
        if !is_consistent {
            warn!(
                provider = %provider,
                range = %range,
                segment_count,
                transaction_count,
                "cache integrity mismatch"
            );
        }

        Ok(IntegrityReport {
            provider,
            range,
            is_consistent,
            segment_count,
            transaction_count,
        })
    }

    /// Rewrite segment coverage in a range from the rows actually present
    ///
    /// Trusts the transaction store as ground truth: existing claims in the
    /// range are dropped and replaced with one segment per contiguous run
    /// of dates that have rows. A range with no rows ends up with no
    /// coverage, which clears false claims.
    pub fn repair_cache_segments(&self, provider: Provider, range: DateRange) -> Result<bool> {
        let transactions = self.read_transactions(provider, range)?;

        self.clear_segments(provider, Some(range))?;

        let mut rebuilt = 0usize;
        let mut run: Option<DateRange> = None;
        for t in &transactions {
            run = Some(match run {
                None => DateRange::single(t.date),
                Some(current) => {
                    if current.touches(&DateRange::single(t.date)) {
                        current.union_span(&DateRange::single(t.date))
                    } else {
                        self.record_segment(provider, current)?;
                        rebuilt += 1;
                        DateRange::single(t.date)
                    }
                }
            });
        }
        if let Some(current) = run {
            self.record_segment(provider, current)?;
            rebuilt += 1;
        }

        info!(
            provider = %provider,
            range = %range,
            rows = transactions.len(),
            rebuilt,
            "repaired cache segments from transaction rows"
        );
        Ok(true)
    }

    /// Read-only scan for index drift
    ///
    /// Compares the transaction store against the monthly index without
    /// writing anything and without touching the external providers. Use
    /// `sync_all_missing_entries` to actually heal what this reports.
    pub fn diagnose_missing_entries(&self) -> Result<DiagnoseReport> {
        let months = self.distinct_months()?;
        let mut report = DiagnoseReport::default();

        for (provider, year, month, actual_count) in months {
            match self.get_monthly_entry(provider, year, month) {
                Ok(None) => report.missing_entries.push(MissingMonth {
                    provider,
                    year,
                    month,
                    transaction_count: actual_count,
                }),
                Ok(Some(entry)) => {
                    if entry.transaction_count != actual_count {
                        report.stale_entries.push(MissingMonth {
                            provider,
                            year,
                            month,
                            transaction_count: actual_count,
                        });
                    }
                }
                Err(e) => report
                    .errors
                    .push(format!("{}/{}-{:02}: {}", provider, year, month, e)),
            }
        }

        report.total_missing = report.missing_entries.len();
        if report.total_missing > 0 || !report.stale_entries.is_empty() {
            warn!(
                missing = report.total_missing,
                stale = report.stale_entries.len(),
                "monthly cache index drift detected"
            );
        }
        Ok(report)
    }

    /// Delete cached rows and their segment claims
    ///
    /// Scoped to one provider or all, optionally to a date range. The
    /// monthly index is deliberately left untouched: clearing makes index
    /// drift visible instead of silently healing it, and a follow-up
    /// `sync_all_missing_entries` reconciles when wanted.
    pub fn clear_cache(
        &self,
        provider: Option<Provider>,
        range: Option<DateRange>,
    ) -> Result<ClearReport> {
        let providers: Vec<Provider> = match provider {
            Some(p) => vec![p],
            None => Provider::all().to_vec(),
        };

        let mut report = ClearReport::default();
        for p in providers {
            report.transactions_deleted += self.delete_transactions(p, range)?;
            report.segments_cleared += self.clear_segments(p, range)?;
        }

        info!(
            transactions = report.transactions_deleted,
            segments = report.segments_cleared,
            "cache cleared"
        );
        Ok(report)
    }

    /// Aggregate per-provider counters for status displays
    pub fn get_detailed_stats(&self) -> Result<DetailedStats> {
        let mut providers = Vec::new();
        let mut total_transactions = 0;
        let mut total_segments = 0;

        for p in Provider::all() {
            let transaction_count = self.count_transactions(p)?;
            let segment_count = self.count_segments(p)?;
            let monthly_entries = self.count_monthly_entries(p)?;
            let extent = self.transaction_date_extent(p)?;

            total_transactions += transaction_count;
            total_segments += segment_count;
            providers.push(ProviderStats {
                provider: p,
                transaction_count,
                segment_count,
                monthly_entries,
                earliest: extent.map(|(min, _)| min),
                latest: extent.map(|(_, max)| max),
            });
        }

        Ok(DetailedStats {
            providers,
            total_transactions,
            total_segments,
        })
    }
}
