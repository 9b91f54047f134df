//! Cache segment store operations
//!
//! Segments record which date intervals have been confirmed fully fetched
//! for a provider. Rows are kept disjoint: recording a range that overlaps
//! or touches existing segments collapses them into one, so stored rows are
//! directly usable as the coverage union the planner reasons over.

use rusqlite::params;
use tracing::{debug, info};

use super::{parse_datetime, Database, DbConn};
use crate::error::Result;
use crate::models::{CacheSegment, DateRange, Provider, QueryPlan};
use crate::planner;

impl Database {
    /// Register that `range` is now fully cached for `provider`
    ///
    /// Idempotent with respect to resulting coverage: recording the same
    /// or an overlapping range twice yields the same stored segments.
    pub fn record_segment(&self, provider: Provider, range: DateRange) -> Result<()> {
        let conn = self.conn()?;
        self.record_segment_on(&conn, provider, range)
    }

    /// Record a segment on an already-acquired connection
    ///
    /// Used by `store_transactions` so the segment write follows the row
    /// commit on the same connection.
    pub(crate) fn record_segment_on(
        &self,
        conn: &DbConn,
        provider: Provider,
        range: DateRange,
    ) -> Result<()> {
        let existing = Self::segments_on(conn, provider)?;

        // Collapse the new range with everything it overlaps or touches.
        let mut span = range;
        let mut absorbed: Vec<i64> = Vec::new();
        for seg in &existing {
            if span.touches(&seg.range()) {
                span = span.union_span(&seg.range());
                absorbed.push(seg.id);
            }
        }

        let tx = conn.unchecked_transaction()?;
        for id in &absorbed {
            tx.execute("DELETE FROM cache_segments WHERE id = ?", params![id])?;
        }
        tx.execute(
            "INSERT INTO cache_segments (provider, start_date, end_date) VALUES (?, ?, ?)",
            params![
                provider.as_str(),
                span.start.to_string(),
                span.end.to_string()
            ],
        )?;
        tx.commit()?;

        debug!(
            provider = %provider,
            range = %range,
            merged = absorbed.len(),
            span = %span,
            "recorded cache segment"
        );
        Ok(())
    }

    /// The merged, disjoint coverage currently recorded for a provider
    pub fn coverage(&self, provider: Provider) -> Result<Vec<DateRange>> {
        let segments = self.list_segments(provider)?;
        // Stored rows are kept disjoint, but merge defensively so coverage
        // is correct even if rows were written out-of-band.
        Ok(planner::merge_ranges(
            segments.iter().map(|s| s.range()).collect(),
        ))
    }

    /// All stored segments for a provider, ordered by start date
    pub fn list_segments(&self, provider: Provider) -> Result<Vec<CacheSegment>> {
        let conn = self.conn()?;
        Self::segments_on(&conn, provider)
    }

    fn segments_on(conn: &DbConn, provider: Provider) -> Result<Vec<CacheSegment>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT id, provider, start_date, end_date, created_at
            FROM cache_segments
            WHERE provider = ?
            ORDER BY start_date
            "#,
        )?;

        let segments = stmt
            .query_map(params![provider.as_str()], |row| {
                Self::row_to_segment(row)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(segments)
    }

    /// Remove coverage for a provider
    ///
    /// With a range, removes only the intersecting portion, splitting any
    /// segment the cleared range cuts through the middle of. Without a
    /// range, drops every segment for the provider. Returns the number of
    /// stored segments affected.
    pub fn clear_segments(&self, provider: Provider, range: Option<DateRange>) -> Result<usize> {
        let conn = self.conn()?;

        let Some(cleared) = range else {
            let removed = conn.execute(
                "DELETE FROM cache_segments WHERE provider = ?",
                params![provider.as_str()],
            )?;
            info!(provider = %provider, removed, "cleared all cache segments");
            return Ok(removed);
        };

        let existing = Self::segments_on(&conn, provider)?;
        let mut affected = 0;

        let tx = conn.unchecked_transaction()?;
        for seg in &existing {
            let seg_range = seg.range();
            if !seg_range.intersects(&cleared) {
                continue;
            }
            affected += 1;
            tx.execute("DELETE FROM cache_segments WHERE id = ?", params![seg.id])?;

            // Keep the part before the cleared range, if any.
            if seg_range.start < cleared.start {
                if let Some(left_end) = cleared.start.pred_opt() {
                    tx.execute(
                        "INSERT INTO cache_segments (provider, start_date, end_date) VALUES (?, ?, ?)",
                        params![
                            provider.as_str(),
                            seg_range.start.to_string(),
                            left_end.to_string()
                        ],
                    )?;
                }
            }
            // And the part after it.
            if seg_range.end > cleared.end {
                if let Some(right_start) = cleared.end.succ_opt() {
                    tx.execute(
                        "INSERT INTO cache_segments (provider, start_date, end_date) VALUES (?, ?, ?)",
                        params![
                            provider.as_str(),
                            right_start.to_string(),
                            seg_range.end.to_string()
                        ],
                    )?;
                }
            }
        }
        tx.commit()?;

        info!(provider = %provider, range = %cleared, affected, "cleared cache segments in range");
        Ok(affected)
    }

    /// Count stored segments intersecting a range
    pub fn count_segments_intersecting(
        &self,
        provider: Provider,
        range: DateRange,
    ) -> Result<i64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM cache_segments WHERE provider = ? AND start_date <= ? AND end_date >= ?",
            params![
                provider.as_str(),
                range.end.to_string(),
                range.start.to_string()
            ],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Count all stored segments for a provider
    pub fn count_segments(&self, provider: Provider) -> Result<i64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM cache_segments WHERE provider = ?",
            params![provider.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Plan a query for `range` against this provider's recorded coverage
    ///
    /// Reads the segment store, then delegates to the pure planner.
    pub fn plan_query(&self, provider: Provider, range: DateRange) -> Result<QueryPlan> {
        let coverage = self.coverage(provider)?;
        let plan = planner::plan(range, &coverage);
        debug!(
            provider = %provider,
            range = %range,
            status = %plan.status,
            missing = plan.missing_ranges.len(),
            "planned cache query"
        );
        Ok(plan)
    }

    /// Helper to convert a row to CacheSegment
    /// Column order: id, provider, start_date, end_date, created_at
    fn row_to_segment(row: &rusqlite::Row) -> rusqlite::Result<CacheSegment> {
        let provider_str: String = row.get(1)?;
        let start_str: String = row.get(2)?;
        let end_str: String = row.get(3)?;
        let created_at_str: String = row.get(4)?;
        Ok(CacheSegment {
            id: row.get(0)?,
            provider: provider_str.parse().unwrap_or(Provider::Books),
            start_date: chrono::NaiveDate::parse_from_str(&start_str, "%Y-%m-%d")
                .unwrap_or_default(),
            end_date: chrono::NaiveDate::parse_from_str(&end_str, "%Y-%m-%d").unwrap_or_default(),
            created_at: parse_datetime(&created_at_str),
        })
    }
}
