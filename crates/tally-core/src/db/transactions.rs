//! Transaction store operations

use chrono::Datelike;
use rusqlite::{params, OptionalExtension};
use tracing::{debug, info};

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::{DateRange, NewTransaction, Provider, Transaction};

impl Database {
    /// Persist fetched transactions and record the covered range as cached
    ///
    /// Rows are upserted keyed by `(provider, id)` inside one SQL
    /// transaction; the cache segment is recorded strictly after the rows
    /// commit. A crash between the two leaves the rows present but the
    /// range unclaimed, which simply reads as a cache miss next time.
    /// Returns the number of rows written.
    pub fn store_transactions(
        &self,
        provider: Provider,
        transactions: &[NewTransaction],
        covered_range: DateRange,
    ) -> Result<usize> {
        let conn = self.conn()?;

        let tx = conn.unchecked_transaction()?;
        for t in transactions {
            tx.execute(
                r#"
                INSERT INTO transactions (id, provider, date, year, month, amount, kind, category, description)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(provider, id) DO UPDATE SET
                    date = excluded.date,
                    year = excluded.year,
                    month = excluded.month,
                    amount = excluded.amount,
                    kind = excluded.kind,
                    category = excluded.category,
                    description = excluded.description
                "#,
                params![
                    t.id,
                    provider.as_str(),
                    t.date.to_string(),
                    t.date.year(),
                    t.date.month(),
                    t.amount,
                    t.kind.as_str(),
                    t.category,
                    t.description,
                ],
            )?;
        }
        tx.commit()?;

        // Rows are durable; now claim the coverage.
        self.record_segment_on(&conn, provider, covered_range)?;

        info!(
            provider = %provider,
            rows = transactions.len(),
            range = %covered_range,
            "stored transactions and recorded coverage"
        );
        Ok(transactions.len())
    }

    /// Read cached transactions in range, ordered by date
    ///
    /// Pure read: returns whatever rows exist regardless of segment
    /// bookkeeping, so integrity checks can compare the two views.
    pub fn read_transactions(
        &self,
        provider: Provider,
        range: DateRange,
    ) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, provider, date, year, month, amount, kind, category, description, created_at
            FROM transactions
            WHERE provider = ? AND date >= ? AND date <= ?
            ORDER BY date, id
            "#,
        )?;

        let transactions = stmt
            .query_map(
                params![
                    provider.as_str(),
                    range.start.to_string(),
                    range.end.to_string()
                ],
                |row| Self::row_to_transaction(row),
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        debug!(
            provider = %provider,
            range = %range,
            rows = transactions.len(),
            "read cached transactions"
        );
        Ok(transactions)
    }

    /// Get a single cached transaction by provider and id
    pub fn get_transaction(&self, provider: Provider, id: &str) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, provider, date, year, month, amount, kind, category, description, created_at
             FROM transactions WHERE provider = ? AND id = ?",
        )?;

        let transaction = stmt
            .query_row(params![provider.as_str(), id], |row| {
                Self::row_to_transaction(row)
            })
            .optional()?;

        Ok(transaction)
    }

    /// Count cached rows in a date range
    pub fn count_transactions_in_range(&self, provider: Provider, range: DateRange) -> Result<i64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE provider = ? AND date >= ? AND date <= ?",
            params![
                provider.as_str(),
                range.start.to_string(),
                range.end.to_string()
            ],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Count cached rows for one calendar month
    pub fn count_transactions_for_month(
        &self,
        provider: Provider,
        year: i32,
        month: u32,
    ) -> Result<i64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE provider = ? AND year = ? AND month = ?",
            params![provider.as_str(), year, month],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Count all cached rows for a provider
    pub fn count_transactions(&self, provider: Provider) -> Result<i64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE provider = ?",
            params![provider.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Every distinct `(provider, year, month)` present in the store,
    /// with its current row count
    pub fn distinct_months(&self) -> Result<Vec<(Provider, i32, u32, i64)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT provider, year, month, COUNT(*)
            FROM transactions
            GROUP BY provider, year, month
            ORDER BY provider, year, month
            "#,
        )?;

        let mut months = Vec::new();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let provider_str: String = row.get(0)?;
            let provider: Provider = match provider_str.parse() {
                Ok(p) => p,
                // A row with an unrecognized provider tag is drift, not a
                // crash; integrity reporting surfaces it elsewhere.
                Err(_) => continue,
            };
            months.push((provider, row.get(1)?, row.get::<_, i64>(2)? as u32, row.get(3)?));
        }
        Ok(months)
    }

    /// Earliest and latest cached dates for a provider
    pub fn transaction_date_extent(
        &self,
        provider: Provider,
    ) -> Result<Option<(chrono::NaiveDate, chrono::NaiveDate)>> {
        let conn = self.conn()?;
        let extent: Option<(String, String)> = conn
            .query_row(
                "SELECT MIN(date), MAX(date) FROM transactions WHERE provider = ?",
                params![provider.as_str()],
                |row| {
                    let min: Option<String> = row.get(0)?;
                    let max: Option<String> = row.get(1)?;
                    Ok(min.zip(max))
                },
            )
            .optional()?
            .flatten();

        Ok(extent.and_then(|(min, max)| {
            let min = chrono::NaiveDate::parse_from_str(&min, "%Y-%m-%d").ok()?;
            let max = chrono::NaiveDate::parse_from_str(&max, "%Y-%m-%d").ok()?;
            Some((min, max))
        }))
    }

    /// Delete cached rows for a provider, optionally scoped to a range
    ///
    /// Returns the number of rows deleted. Segment bookkeeping is the
    /// caller's concern (`clear_cache` pairs the two).
    pub fn delete_transactions(
        &self,
        provider: Provider,
        range: Option<DateRange>,
    ) -> Result<usize> {
        let conn = self.conn()?;
        let deleted = match range {
            Some(r) => conn.execute(
                "DELETE FROM transactions WHERE provider = ? AND date >= ? AND date <= ?",
                params![provider.as_str(), r.start.to_string(), r.end.to_string()],
            )?,
            None => conn.execute(
                "DELETE FROM transactions WHERE provider = ?",
                params![provider.as_str()],
            )?,
        };
        Ok(deleted)
    }

    /// Helper to convert a row to Transaction
    /// Column order: id, provider, date, year, month, amount, kind, category, description, created_at
    pub(crate) fn row_to_transaction(row: &rusqlite::Row) -> rusqlite::Result<Transaction> {
        let provider_str: String = row.get(1)?;
        let date_str: String = row.get(2)?;
        let kind_str: String = row.get(6)?;
        let created_at_str: String = row.get(9)?;
        Ok(Transaction {
            id: row.get(0)?,
            provider: provider_str.parse().unwrap_or(Provider::Books),
            date: chrono::NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").unwrap_or_default(),
            year: row.get(3)?,
            month: row.get::<_, i64>(4)? as u32,
            amount: row.get(5)?,
            kind: kind_str.parse().unwrap_or(crate::models::TransactionKind::Expense),
            category: row.get(7)?,
            description: row.get(8)?,
            created_at: parse_datetime(&created_at_str),
        })
    }
}
