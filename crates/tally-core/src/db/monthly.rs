//! Monthly cache index operations
//!
//! A denormalized month-granular index over the transaction store, used
//! for fast existence checks. It is maintained independently of the
//! segment store and is allowed to drift until a sync recomputes it from
//! the rows; `integrity` surfaces the drift.

use rusqlite::{params, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::{MonthStatus, MonthlyCacheEntry, Provider};
use crate::planner;

/// Outcome of a full index reconciliation
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    /// Number of `(provider, year, month)` keys created or refreshed
    pub synced: usize,
    /// Keys that failed to sync, with the error text
    pub errors: Vec<String>,
}

impl Database {
    /// Set-or-create an index entry keyed by `(provider, year, month)`
    pub fn upsert_monthly_entry(
        &self,
        provider: Provider,
        year: i32,
        month: u32,
        transaction_count: i64,
        status: MonthStatus,
    ) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO monthly_cache (provider, year, month, transaction_count, status)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(provider, year, month) DO UPDATE SET
                transaction_count = excluded.transaction_count,
                status = excluded.status,
                updated_at = CURRENT_TIMESTAMP
            "#,
            params![
                provider.as_str(),
                year,
                month,
                transaction_count,
                status.as_str()
            ],
        )?;
        Ok(())
    }

    /// Look up an index entry
    pub fn get_monthly_entry(
        &self,
        provider: Provider,
        year: i32,
        month: u32,
    ) -> Result<Option<MonthlyCacheEntry>> {
        let conn = self.conn()?;
        let entry = conn
            .query_row(
                r#"
                SELECT provider, year, month, transaction_count, status, updated_at
                FROM monthly_cache
                WHERE provider = ? AND year = ? AND month = ?
                "#,
                params![provider.as_str(), year, month],
                |row| Self::row_to_monthly_entry(row),
            )
            .optional()?;
        Ok(entry)
    }

    /// All index entries, optionally scoped to one provider
    pub fn list_monthly_entries(
        &self,
        provider: Option<Provider>,
    ) -> Result<Vec<MonthlyCacheEntry>> {
        let conn = self.conn()?;
        let mut entries = Vec::new();

        match provider {
            Some(p) => {
                let mut stmt = conn.prepare(
                    "SELECT provider, year, month, transaction_count, status, updated_at
                     FROM monthly_cache WHERE provider = ? ORDER BY year, month",
                )?;
                let rows = stmt.query_map(params![p.as_str()], |row| {
                    Self::row_to_monthly_entry(row)
                })?;
                for row in rows {
                    entries.push(row?);
                }
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT provider, year, month, transaction_count, status, updated_at
                     FROM monthly_cache ORDER BY provider, year, month",
                )?;
                let rows = stmt.query_map([], |row| Self::row_to_monthly_entry(row))?;
                for row in rows {
                    entries.push(row?);
                }
            }
        }
        Ok(entries)
    }

    /// Count all index entries
    pub fn count_monthly_entries(&self, provider: Provider) -> Result<i64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM monthly_cache WHERE provider = ?",
            params![provider.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Recompute one month's entry from the transaction store
    ///
    /// Returns false without creating an entry when zero rows exist for
    /// the key, so the index never asserts coverage that does not exist.
    /// Status is derived from segment coverage: `Complete` when the whole
    /// calendar month is covered, `Partial` otherwise.
    pub fn sync_month(&self, provider: Provider, year: i32, month: u32) -> Result<bool> {
        let count = self.count_transactions_for_month(provider, year, month)?;
        if count == 0 {
            debug!(provider = %provider, year, month, "no rows for month, skipping sync");
            return Ok(false);
        }

        let coverage = self.coverage(provider)?;
        let status = if planner::month_fully_covered(&coverage, year, month) {
            MonthStatus::Complete
        } else {
            MonthStatus::Partial
        };

        self.upsert_monthly_entry(provider, year, month, count, status)?;
        debug!(
            provider = %provider,
            year,
            month,
            count,
            status = %status,
            "synced monthly cache entry"
        );
        Ok(true)
    }

    /// Reconcile the whole index against the transaction store
    ///
    /// Scans every `(provider, year, month)` with at least one row and
    /// re-syncs each key that is unindexed or carries a stale count.
    /// Purely local: never touches the external providers, and safe to
    /// re-run.
    pub fn sync_all_missing_entries(&self) -> Result<SyncReport> {
        let months = self.distinct_months()?;
        let mut report = SyncReport::default();

        for (provider, year, month, actual_count) in months {
            let indexed = self.get_monthly_entry(provider, year, month)?;
            let needs_sync = match indexed {
                Some(ref entry) => entry.transaction_count != actual_count,
                None => true,
            };
            if !needs_sync {
                continue;
            }

            match self.sync_month(provider, year, month) {
                Ok(true) => report.synced += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(provider = %provider, year, month, error = %e, "monthly sync failed");
                    report
                        .errors
                        .push(format!("{}/{}-{:02}: {}", provider, year, month, e));
                }
            }
        }

        info!(
            synced = report.synced,
            errors = report.errors.len(),
            "monthly cache index reconciled"
        );
        Ok(report)
    }

    /// Helper to convert a row to MonthlyCacheEntry
    /// Column order: provider, year, month, transaction_count, status, updated_at
    fn row_to_monthly_entry(row: &rusqlite::Row) -> rusqlite::Result<MonthlyCacheEntry> {
        let provider_str: String = row.get(0)?;
        let status_str: String = row.get(4)?;
        let updated_at_str: String = row.get(5)?;
        Ok(MonthlyCacheEntry {
            provider: provider_str.parse().unwrap_or(Provider::Books),
            year: row.get(1)?,
            month: row.get::<_, i64>(2)? as u32,
            transaction_count: row.get(3)?,
            status: status_str.parse().unwrap_or(MonthStatus::Unknown),
            updated_at: parse_datetime(&updated_at_str),
        })
    }
}
