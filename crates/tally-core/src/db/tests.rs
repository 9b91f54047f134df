//! Database tests

use super::*;
use crate::models::*;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn r(y: i32, m: u32, day: u32, y2: i32, m2: u32, day2: u32) -> DateRange {
        DateRange::new(d(y, m, day), d(y2, m2, day2)).unwrap()
    }

    fn tx(id: &str, date: NaiveDate, amount: f64) -> NewTransaction {
        NewTransaction::new(id, date, amount, TransactionKind::Expense)
    }

    #[test]
    fn test_in_memory_db() {
        let db = Database::in_memory().unwrap();
        let stats = db.get_detailed_stats().unwrap();
        assert_eq!(stats.total_transactions, 0);
        assert_eq!(stats.total_segments, 0);
    }

    #[test]
    fn test_record_segment_is_idempotent() {
        let db = Database::in_memory().unwrap();
        let range = r(2025, 1, 1, 2025, 1, 10);

        db.record_segment(Provider::Books, range).unwrap();
        db.record_segment(Provider::Books, range).unwrap();

        let coverage = db.coverage(Provider::Books).unwrap();
        assert_eq!(coverage, vec![range]);
        assert_eq!(db.count_segments(Provider::Books).unwrap(), 1);
    }

    #[test]
    fn test_overlapping_and_adjacent_segments_merge_in_store() {
        let db = Database::in_memory().unwrap();

        db.record_segment(Provider::Books, r(2025, 1, 1, 2025, 1, 10))
            .unwrap();
        db.record_segment(Provider::Books, r(2025, 1, 8, 2025, 1, 20))
            .unwrap();
        db.record_segment(Provider::Books, r(2025, 1, 21, 2025, 1, 25))
            .unwrap();

        assert_eq!(
            db.coverage(Provider::Books).unwrap(),
            vec![r(2025, 1, 1, 2025, 1, 25)]
        );
        assert_eq!(db.count_segments(Provider::Books).unwrap(), 1);
    }

    #[test]
    fn test_coverage_is_per_provider() {
        let db = Database::in_memory().unwrap();

        db.record_segment(Provider::Books, r(2025, 1, 1, 2025, 1, 10))
            .unwrap();

        assert!(db.coverage(Provider::Payments).unwrap().is_empty());
        let plan = db
            .plan_query(Provider::Payments, r(2025, 1, 1, 2025, 1, 10))
            .unwrap();
        assert_eq!(plan.status, CacheVerdict::Miss);
    }

    #[test]
    fn test_clear_segments_splits_on_sub_range() {
        let db = Database::in_memory().unwrap();
        db.record_segment(Provider::Books, r(2025, 1, 1, 2025, 1, 31))
            .unwrap();

        // Clearing the middle leaves the two edges.
        db.clear_segments(Provider::Books, Some(r(2025, 1, 10, 2025, 1, 20)))
            .unwrap();

        assert_eq!(
            db.coverage(Provider::Books).unwrap(),
            vec![r(2025, 1, 1, 2025, 1, 9), r(2025, 1, 21, 2025, 1, 31)]
        );
    }

    #[test]
    fn test_clear_segments_all() {
        let db = Database::in_memory().unwrap();
        db.record_segment(Provider::Books, r(2025, 1, 1, 2025, 1, 10))
            .unwrap();
        db.record_segment(Provider::Books, r(2025, 3, 1, 2025, 3, 10))
            .unwrap();

        let removed = db.clear_segments(Provider::Books, None).unwrap();
        assert_eq!(removed, 2);
        assert!(db.coverage(Provider::Books).unwrap().is_empty());
    }

    #[test]
    fn test_store_transactions_then_plan_reports_full_hit() {
        let db = Database::in_memory().unwrap();
        let range = r(2025, 5, 1, 2025, 5, 31);
        let rows = vec![
            tx("s-1", d(2025, 5, 2), 9.99),
            tx("s-2", d(2025, 5, 15), 100.0),
        ];

        db.store_transactions(Provider::Payments, &rows, range)
            .unwrap();

        let read = db.read_transactions(Provider::Payments, range).unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read[0].id, "s-1");
        assert_eq!(read[0].year, 2025);
        assert_eq!(read[0].month, 5);

        let plan = db.plan_query(Provider::Payments, range).unwrap();
        assert_eq!(plan.status, CacheVerdict::FullHit);
    }

    #[test]
    fn test_store_transactions_upsert_replaces_row() {
        let db = Database::in_memory().unwrap();
        let range = r(2025, 5, 1, 2025, 5, 10);

        db.store_transactions(Provider::Payments, &[tx("s-1", d(2025, 5, 2), 9.99)], range)
            .unwrap();
        // Re-fetch of the same range carries a corrected amount.
        db.store_transactions(
            Provider::Payments,
            &[tx("s-1", d(2025, 5, 2), 19.99)],
            range,
        )
        .unwrap();

        let read = db.read_transactions(Provider::Payments, range).unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].amount, 19.99);
    }

    #[test]
    fn test_same_id_different_providers_do_not_collide() {
        let db = Database::in_memory().unwrap();
        let range = r(2025, 4, 1, 2025, 4, 30);

        db.store_transactions(Provider::Books, &[tx("42", d(2025, 4, 5), 10.0)], range)
            .unwrap();
        db.store_transactions(Provider::Payments, &[tx("42", d(2025, 4, 6), 20.0)], range)
            .unwrap();

        assert_eq!(db.count_transactions(Provider::Books).unwrap(), 1);
        assert_eq!(db.count_transactions(Provider::Payments).unwrap(), 1);
    }

    #[test]
    fn test_sync_month_skips_empty_months() {
        let db = Database::in_memory().unwrap();
        assert!(!db.sync_month(Provider::Books, 2025, 7).unwrap());
        assert!(db.get_monthly_entry(Provider::Books, 2025, 7).unwrap().is_none());
    }

    #[test]
    fn test_sync_month_derives_status_from_coverage() {
        let db = Database::in_memory().unwrap();

        // Full month covered: status complete.
        db.store_transactions(
            Provider::Books,
            &[tx("b-1", d(2025, 2, 10), 5.0)],
            r(2025, 2, 1, 2025, 2, 28),
        )
        .unwrap();
        assert!(db.sync_month(Provider::Books, 2025, 2).unwrap());
        let entry = db.get_monthly_entry(Provider::Books, 2025, 2).unwrap().unwrap();
        assert_eq!(entry.transaction_count, 1);
        assert_eq!(entry.status, MonthStatus::Complete);

        // Half-covered month: status partial.
        db.store_transactions(
            Provider::Books,
            &[tx("b-2", d(2025, 3, 3), 5.0)],
            r(2025, 3, 1, 2025, 3, 15),
        )
        .unwrap();
        assert!(db.sync_month(Provider::Books, 2025, 3).unwrap());
        let entry = db.get_monthly_entry(Provider::Books, 2025, 3).unwrap().unwrap();
        assert_eq!(entry.status, MonthStatus::Partial);
    }

    #[test]
    fn test_diagnose_then_sync_missing_entries() {
        let db = Database::in_memory().unwrap();

        // Five payment rows in May, no index entry yet.
        let range = r(2025, 5, 1, 2025, 5, 31);
        let rows: Vec<NewTransaction> = (1..=5)
            .map(|i| tx(&format!("s-{}", i), d(2025, 5, i), 10.0 * i as f64))
            .collect();
        // Write rows without a monthly sync by going through the raw store.
        db.store_transactions(Provider::Payments, &rows, range)
            .unwrap();

        // Diagnose is read-only: reports the gap, creates nothing.
        let report = db.diagnose_missing_entries().unwrap();
        assert_eq!(report.total_missing, 1);
        assert_eq!(report.missing_entries[0].provider, Provider::Payments);
        assert_eq!(report.missing_entries[0].year, 2025);
        assert_eq!(report.missing_entries[0].month, 5);
        assert_eq!(report.missing_entries[0].transaction_count, 5);
        assert!(db.get_monthly_entry(Provider::Payments, 2025, 5).unwrap().is_none());

        // Sync heals it with the actual count.
        let sync = db.sync_all_missing_entries().unwrap();
        assert_eq!(sync.synced, 1);
        assert!(sync.errors.is_empty());
        let entry = db.get_monthly_entry(Provider::Payments, 2025, 5).unwrap().unwrap();
        assert_eq!(entry.transaction_count, 5);

        // Re-running is a no-op.
        let again = db.sync_all_missing_entries().unwrap();
        assert_eq!(again.synced, 0);
    }

    #[test]
    fn test_sync_all_refreshes_stale_counts() {
        let db = Database::in_memory().unwrap();
        let range = r(2025, 6, 1, 2025, 6, 30);

        db.store_transactions(Provider::Books, &[tx("b-1", d(2025, 6, 5), 1.0)], range)
            .unwrap();
        db.sync_month(Provider::Books, 2025, 6).unwrap();

        // More rows land for the same month; the entry count is now stale.
        db.store_transactions(Provider::Books, &[tx("b-2", d(2025, 6, 6), 2.0)], range)
            .unwrap();
        let stale = db.diagnose_missing_entries().unwrap();
        assert_eq!(stale.total_missing, 0);
        assert_eq!(stale.stale_entries.len(), 1);

        let sync = db.sync_all_missing_entries().unwrap();
        assert_eq!(sync.synced, 1);
        let entry = db.get_monthly_entry(Provider::Books, 2025, 6).unwrap().unwrap();
        assert_eq!(entry.transaction_count, 2);
    }

    #[test]
    fn test_clear_cache_is_scoped_and_leaves_index_alone() {
        let db = Database::in_memory().unwrap();

        db.store_transactions(
            Provider::Books,
            &[tx("b-1", d(2025, 1, 5), 1.0), tx("b-2", d(2025, 2, 5), 2.0)],
            r(2025, 1, 1, 2025, 2, 28),
        )
        .unwrap();
        db.store_transactions(
            Provider::Payments,
            &[tx("s-1", d(2025, 1, 5), 3.0)],
            r(2025, 1, 1, 2025, 1, 31),
        )
        .unwrap();
        db.sync_all_missing_entries().unwrap();

        // Clear only January for Books.
        let report = db
            .clear_cache(Some(Provider::Books), Some(r(2025, 1, 1, 2025, 1, 31)))
            .unwrap();
        assert_eq!(report.transactions_deleted, 1);

        // Cleared range is a miss; February coverage survives.
        let plan = db.plan_query(Provider::Books, r(2025, 1, 1, 2025, 1, 31)).unwrap();
        assert_eq!(plan.status, CacheVerdict::Miss);
        let plan = db.plan_query(Provider::Books, r(2025, 2, 1, 2025, 2, 28)).unwrap();
        assert_eq!(plan.status, CacheVerdict::FullHit);

        // Other provider untouched.
        assert_eq!(db.count_transactions(Provider::Payments).unwrap(), 1);

        // Clearing never touches the monthly index: the January entry stays
        // behind, still claiming one row, until a sync is requested.
        let entry = db.get_monthly_entry(Provider::Books, 2025, 1).unwrap().unwrap();
        assert_eq!(entry.transaction_count, 1);
        let report = db.diagnose_missing_entries().unwrap();
        assert_eq!(report.total_missing, 0);
    }

    #[test]
    fn test_clear_cache_all_providers() {
        let db = Database::in_memory().unwrap();
        db.store_transactions(
            Provider::Books,
            &[tx("b-1", d(2025, 1, 5), 1.0)],
            r(2025, 1, 1, 2025, 1, 31),
        )
        .unwrap();
        db.store_transactions(
            Provider::Payments,
            &[tx("s-1", d(2025, 1, 6), 2.0)],
            r(2025, 1, 1, 2025, 1, 31),
        )
        .unwrap();

        let report = db.clear_cache(None, None).unwrap();
        assert_eq!(report.transactions_deleted, 2);
        assert_eq!(report.segments_cleared, 2);

        let stats = db.get_detailed_stats().unwrap();
        assert_eq!(stats.total_transactions, 0);
        assert_eq!(stats.total_segments, 0);
    }

    #[test]
    fn test_integrity_flags_claim_without_rows_and_repair_clears_it() {
        let db = Database::in_memory().unwrap();
        let june = r(2025, 6, 1, 2025, 6, 30);

        // A segment claims June is cached, but no rows exist.
        db.record_segment(Provider::Books, june).unwrap();

        let report = db.verify_cache_integrity(Provider::Books, june).unwrap();
        assert!(!report.is_consistent);
        assert_eq!(report.segment_count, 1);
        assert_eq!(report.transaction_count, 0);

        // Repair trusts the rows: the false claim goes away.
        assert!(db.repair_cache_segments(Provider::Books, june).unwrap());
        assert!(db.coverage(Provider::Books).unwrap().is_empty());
        let report = db.verify_cache_integrity(Provider::Books, june).unwrap();
        assert!(report.is_consistent);
        assert_eq!(report.segment_count, 0);
    }

    #[test]
    fn test_integrity_consistent_when_both_empty_or_both_populated() {
        let db = Database::in_memory().unwrap();
        let range = r(2025, 8, 1, 2025, 8, 31);

        let report = db.verify_cache_integrity(Provider::Books, range).unwrap();
        assert!(report.is_consistent);

        db.store_transactions(Provider::Books, &[tx("b-1", d(2025, 8, 5), 4.0)], range)
            .unwrap();
        let report = db.verify_cache_integrity(Provider::Books, range).unwrap();
        assert!(report.is_consistent);
        assert_eq!(report.segment_count, 1);
        assert_eq!(report.transaction_count, 1);
    }

    #[test]
    fn test_repair_rebuilds_contiguous_runs_from_rows() {
        let db = Database::in_memory().unwrap();
        let range = r(2025, 9, 1, 2025, 9, 30);

        // Rows on Sep 1-3 and Sep 10, with a bogus claim over the month.
        db.store_transactions(
            Provider::Payments,
            &[
                tx("s-1", d(2025, 9, 1), 1.0),
                tx("s-2", d(2025, 9, 2), 1.0),
                tx("s-3", d(2025, 9, 3), 1.0),
                tx("s-4", d(2025, 9, 10), 1.0),
            ],
            range,
        )
        .unwrap();

        assert!(db.repair_cache_segments(Provider::Payments, range).unwrap());
        assert_eq!(
            db.coverage(Provider::Payments).unwrap(),
            vec![r(2025, 9, 1, 2025, 9, 3), r(2025, 9, 10, 2025, 9, 10)]
        );
    }

    #[test]
    fn test_detailed_stats_counts_per_provider() {
        let db = Database::in_memory().unwrap();
        db.store_transactions(
            Provider::Books,
            &[tx("b-1", d(2025, 1, 5), 1.0), tx("b-2", d(2025, 3, 5), 2.0)],
            r(2025, 1, 1, 2025, 3, 31),
        )
        .unwrap();
        db.sync_all_missing_entries().unwrap();

        let stats = db.get_detailed_stats().unwrap();
        assert_eq!(stats.total_transactions, 2);

        let books = stats
            .providers
            .iter()
            .find(|p| p.provider == Provider::Books)
            .unwrap();
        assert_eq!(books.transaction_count, 2);
        assert_eq!(books.segment_count, 1);
        assert_eq!(books.monthly_entries, 2);
        assert_eq!(books.earliest, Some(d(2025, 1, 5)));
        assert_eq!(books.latest, Some(d(2025, 3, 5)));

        let payments = stats
            .providers
            .iter()
            .find(|p| p.provider == Provider::Payments)
            .unwrap();
        assert_eq!(payments.transaction_count, 0);
        assert_eq!(payments.earliest, None);
    }
}
